use std::future::Future;

use simgraph_core::{NodeUpsert, SimilarityEdge, UserPair};

use crate::error::StoreError;

/// Idempotent write primitives over a graph-shaped store.
///
/// Implementations must make every call safe to repeat: nodes are upserted by
/// id, edges are upserted and deleted by their canonical [`UserPair`].
/// Deleting an edge that does not exist succeeds.
pub trait GraphStore: Send + Sync {
    fn upsert_node(
        &self,
        node: &NodeUpsert,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn upsert_edge(
        &self,
        edge: &SimilarityEdge,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn delete_edge(&self, pair: &UserPair) -> impl Future<Output = Result<(), StoreError>> + Send;
}
