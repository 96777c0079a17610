//! In-process [`GraphStore`], used by the CLI's offline mode and by tests.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use simgraph_core::{NodeUpsert, PostNode, PriorEdge, SimilarityEdge, UserNode, UserPair};

use crate::error::StoreError;
use crate::store::GraphStore;

/// Snapshot of everything a [`MemoryGraphStore`] holds.
///
/// Maps are ordered so two snapshots compare equal exactly when the stores
/// hold the same graph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryGraph {
    pub users: BTreeMap<String, UserNode>,
    pub posts: BTreeMap<String, PostNode>,
    pub edges: BTreeMap<UserPair, SimilarityEdge>,
}

impl MemoryGraph {
    /// Current edges in the shape the inference engine takes as prior state.
    #[must_use]
    pub fn prior_edges(&self) -> Vec<PriorEdge> {
        self.edges
            .values()
            .map(|edge| PriorEdge {
                pair: edge.pair.clone(),
                score: edge.score,
                label: edge.label,
            })
            .collect()
    }
}

/// Graph store backed by a mutex-guarded [`MemoryGraph`].
///
/// Enforces the same constraints as the Postgres schema: identifiers must be
/// non-empty, posts and edges must reference existing users, and edge scores
/// must lie in `[0, 1]`. Violations are [`StoreError::Permanent`].
#[derive(Debug, Default)]
pub struct MemoryGraphStore {
    graph: Mutex<MemoryGraph>,
}

impl MemoryGraphStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing graph, e.g. one loaded from a prior run.
    #[must_use]
    pub fn with_graph(graph: MemoryGraph) -> Self {
        Self {
            graph: Mutex::new(graph),
        }
    }

    /// # Errors
    ///
    /// Returns [`StoreError::Permanent`] if the lock was poisoned.
    pub fn snapshot(&self) -> Result<MemoryGraph, StoreError> {
        Ok(self.lock()?.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryGraph>, StoreError> {
        self.graph
            .lock()
            .map_err(|_| StoreError::Permanent("memory graph lock poisoned".to_owned()))
    }
}

fn require_id(kind: &str, id: &str) -> Result<(), StoreError> {
    if id.trim().is_empty() {
        return Err(StoreError::Permanent(format!("{kind} id must not be empty")));
    }
    Ok(())
}

fn require_user(graph: &MemoryGraph, id: &str) -> Result<(), StoreError> {
    if graph.users.contains_key(id) {
        Ok(())
    } else {
        Err(StoreError::Permanent(format!("unknown user {id}")))
    }
}

impl GraphStore for MemoryGraphStore {
    async fn upsert_node(&self, node: &NodeUpsert) -> Result<(), StoreError> {
        let mut graph = self.lock()?;
        match node {
            NodeUpsert::User(user) => {
                require_id("user", &user.id)?;
                graph.users.insert(user.id.clone(), user.clone());
            }
            NodeUpsert::Post(post) => {
                require_id("post", &post.id)?;
                require_user(&graph, &post.author_id)?;
                graph.posts.insert(post.id.clone(), post.clone());
            }
        }
        Ok(())
    }

    async fn upsert_edge(&self, edge: &SimilarityEdge) -> Result<(), StoreError> {
        let pair = &edge.pair;
        require_id("user", pair.user_a())?;
        require_id("user", pair.user_b())?;
        if pair.is_self_pair() {
            return Err(StoreError::Permanent(format!("self edge {pair}")));
        }
        if !(0.0..=1.0).contains(&edge.score) {
            return Err(StoreError::Permanent(format!(
                "edge {pair} score {} outside [0, 1]",
                edge.score
            )));
        }
        let mut graph = self.lock()?;
        require_user(&graph, pair.user_a())?;
        require_user(&graph, pair.user_b())?;
        graph.edges.insert(pair.clone(), edge.clone());
        Ok(())
    }

    async fn delete_edge(&self, pair: &UserPair) -> Result<(), StoreError> {
        require_id("user", pair.user_a())?;
        require_id("user", pair.user_b())?;
        self.lock()?.edges.remove(pair);
        Ok(())
    }
}
