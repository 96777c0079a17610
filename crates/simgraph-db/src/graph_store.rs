//! Postgres-backed [`GraphStore`].

use simgraph_core::{NodeUpsert, SimilarityEdge, UserPair};
use simgraph_reconcile::{GraphStore, StoreError};
use sqlx::PgPool;

use crate::{edges, posts, users, DbError};

/// SQLSTATE codes worth retrying: serialization failure, deadlock, admin
/// shutdown, and too many connections. Class `08` (connection exception) is
/// matched by prefix.
const TRANSIENT_SQLSTATES: &[&str] = &["40001", "40P01", "57P01", "53300"];

/// Returns `true` for sqlx errors that may succeed on a later attempt.
#[must_use]
pub fn is_transient_sqlx_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => true,
        sqlx::Error::Database(db) => db
            .code()
            .is_some_and(|code| code.starts_with("08") || TRANSIENT_SQLSTATES.contains(&&*code)),
        _ => false,
    }
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        let transient = matches!(&err, DbError::Sqlx(e) if is_transient_sqlx_error(e));
        if transient {
            StoreError::Transient(err.to_string())
        } else {
            StoreError::Permanent(err.to_string())
        }
    }
}

/// Applies plan operations to the relational schema: nodes go to `users` and
/// `posts`, edges to `similar_content_edges`.
#[derive(Debug, Clone)]
pub struct PgGraphStore {
    pool: PgPool,
}

impl PgGraphStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl GraphStore for PgGraphStore {
    async fn upsert_node(&self, node: &NodeUpsert) -> Result<(), StoreError> {
        tracing::debug!(id = node.id(), "upserting node");
        match node {
            NodeUpsert::User(user) => users::upsert_user_node(&self.pool, user).await?,
            NodeUpsert::Post(post) => posts::upsert_post_node(&self.pool, post).await?,
        }
        Ok(())
    }

    async fn upsert_edge(&self, edge: &SimilarityEdge) -> Result<(), StoreError> {
        tracing::debug!(pair = %edge.pair, score = edge.score, "upserting edge");
        edges::upsert_edge(&self.pool, edge).await?;
        Ok(())
    }

    async fn delete_edge(&self, pair: &UserPair) -> Result<(), StoreError> {
        let deleted = edges::delete_edge(&self.pool, pair).await?;
        tracing::debug!(%pair, deleted, "retracted edge");
        Ok(())
    }
}
