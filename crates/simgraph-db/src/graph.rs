//! Whole-graph reads for visualization and export.

use sqlx::PgPool;

use crate::{edges::EdgeRow, users::UserRow, DbError};

/// Every user node and `SIMILAR_CONTENT` edge, read in one snapshot.
#[derive(Debug, Clone)]
pub struct GraphSnapshot {
    pub users: Vec<UserRow>,
    pub edges: Vec<EdgeRow>,
}

/// Read users and edges inside a single `REPEATABLE READ` transaction so the
/// edge list never references a user missing from the node list.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any query fails.
pub async fn graph_snapshot(pool: &PgPool) -> Result<GraphSnapshot, DbError> {
    let mut tx = pool.begin().await?;
    sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
        .execute(&mut *tx)
        .await?;

    let users = sqlx::query_as::<_, UserRow>(
        "SELECT user_id, name, sentiment, post_count, created_at, updated_at \
         FROM users \
         ORDER BY name, user_id",
    )
    .fetch_all(&mut *tx)
    .await?;

    let edges = sqlx::query_as::<_, EdgeRow>(
        "SELECT user_a, user_b, score, label, post_a, post_b, created_at, updated_at \
         FROM similar_content_edges \
         ORDER BY score DESC, user_a, user_b",
    )
    .fetch_all(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(GraphSnapshot { users, edges })
}
