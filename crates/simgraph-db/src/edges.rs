//! Database operations for the `similar_content_edges` table.
//!
//! The table enforces `CHECK (user_a < user_b)` so each unordered pair of
//! users has one row. [`UserPair`] is already canonical, so its accessors
//! bind straight into the key columns.

use chrono::{DateTime, Utc};
use simgraph_core::{PriorEdge, SentimentLabel, SimilarityEdge, UserPair};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `similar_content_edges` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EdgeRow {
    pub user_a: String,
    pub user_b: String,
    pub score: f64,
    pub label: String,
    pub post_a: String,
    pub post_b: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EdgeRow {
    /// Convert to the engine's prior-state shape.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidColumn`] if `label` is not a known sentiment.
    pub fn to_prior_edge(&self) -> Result<PriorEdge, DbError> {
        let label = self
            .label
            .parse::<SentimentLabel>()
            .map_err(|_| DbError::InvalidColumn {
                column: "label",
                value: self.label.clone(),
            })?;
        Ok(PriorEdge {
            pair: UserPair::new(self.user_a.as_str(), self.user_b.as_str()),
            score: self.score,
            label,
        })
    }
}

/// Insert or refresh the edge for `edge.pair`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails, including foreign-key
/// violations for unknown users and the `CHECK` violation for a self pair.
pub async fn upsert_edge(pool: &PgPool, edge: &SimilarityEdge) -> Result<(), DbError> {
    let (post_a, post_b) = &edge.justification_posts;
    sqlx::query(
        "INSERT INTO similar_content_edges (user_a, user_b, score, label, post_a, post_b) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         ON CONFLICT (user_a, user_b) DO UPDATE SET \
             score = EXCLUDED.score, \
             label = EXCLUDED.label, \
             post_a = EXCLUDED.post_a, \
             post_b = EXCLUDED.post_b, \
             updated_at = NOW()",
    )
    .bind(edge.pair.user_a())
    .bind(edge.pair.user_b())
    .bind(edge.score)
    .bind(edge.label.as_str())
    .bind(post_a)
    .bind(post_b)
    .execute(pool)
    .await?;

    Ok(())
}

/// Remove the edge for `pair`. Returns `true` if a row was deleted; a missing
/// edge is not an error.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn delete_edge(pool: &PgPool, pair: &UserPair) -> Result<bool, DbError> {
    let result =
        sqlx::query("DELETE FROM similar_content_edges WHERE user_a = $1 AND user_b = $2")
            .bind(pair.user_a())
            .bind(pair.user_b())
            .execute(pool)
            .await?;

    Ok(result.rows_affected() > 0)
}

/// All edges, strongest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_edges(pool: &PgPool) -> Result<Vec<EdgeRow>, DbError> {
    let rows = sqlx::query_as::<_, EdgeRow>(
        "SELECT user_a, user_b, score, label, post_a, post_b, created_at, updated_at \
         FROM similar_content_edges \
         ORDER BY score DESC, user_a, user_b",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Edges touching `user_id` on either side of the pair, strongest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_user_edges(pool: &PgPool, user_id: &str) -> Result<Vec<EdgeRow>, DbError> {
    let rows = sqlx::query_as::<_, EdgeRow>(
        "SELECT user_a, user_b, score, label, post_a, post_b, created_at, updated_at \
         FROM similar_content_edges \
         WHERE user_a = $1 OR user_b = $1 \
         ORDER BY score DESC, user_a, user_b",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Current edges in the shape inference takes as prior state.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails, or
/// [`DbError::InvalidColumn`] for a row with an unknown label.
pub async fn list_prior_edges(pool: &PgPool) -> Result<Vec<PriorEdge>, DbError> {
    list_edges(pool)
        .await?
        .iter()
        .map(EdgeRow::to_prior_edge)
        .collect()
}
