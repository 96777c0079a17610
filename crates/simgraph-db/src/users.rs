//! Database operations for the `users` table.

use chrono::{DateTime, Utc};
use simgraph_core::UserNode;
use sqlx::PgPool;

use crate::DbError;

/// A row from the `users` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub user_id: String,
    pub name: String,
    pub sentiment: String,
    pub post_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create a user or rename an existing one.
///
/// Sentiment and post count are left alone on conflict; they are owned by
/// graph recomputation.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails, including the `CHECK`
/// violation for a blank `user_id`.
pub async fn upsert_user(pool: &PgPool, user_id: &str, name: &str) -> Result<UserRow, DbError> {
    let row = sqlx::query_as::<_, UserRow>(
        "INSERT INTO users (user_id, name) \
         VALUES ($1, $2) \
         ON CONFLICT (user_id) DO UPDATE SET \
             name = EXCLUDED.name, \
             updated_at = NOW() \
         RETURNING user_id, name, sentiment, post_count, created_at, updated_at",
    )
    .bind(user_id)
    .bind(name)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Write an inferred user node: majority sentiment and post count.
/// Idempotent by `user_id`.
///
/// The display name is only written when the row is created. An existing
/// name belongs to [`upsert_user`], so a rename committed after the posts
/// were read is never overwritten with the older name.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn upsert_user_node(pool: &PgPool, user: &UserNode) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO users (user_id, name, sentiment, post_count) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (user_id) DO UPDATE SET \
             sentiment = EXCLUDED.sentiment, \
             post_count = EXCLUDED.post_count, \
             updated_at = NOW()",
    )
    .bind(&user.id)
    .bind(&user.name)
    .bind(user.sentiment.as_str())
    .bind(i32::try_from(user.post_count).unwrap_or(i32::MAX))
    .execute(pool)
    .await?;

    Ok(())
}

/// Returns a single user by id, or `None` if not found.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_user(pool: &PgPool, user_id: &str) -> Result<Option<UserRow>, DbError> {
    let row = sqlx::query_as::<_, UserRow>(
        "SELECT user_id, name, sentiment, post_count, created_at, updated_at \
         FROM users \
         WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Returns all users ordered by name, then id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_users(pool: &PgPool) -> Result<Vec<UserRow>, DbError> {
    let rows = sqlx::query_as::<_, UserRow>(
        "SELECT user_id, name, sentiment, post_count, created_at, updated_at \
         FROM users \
         ORDER BY name, user_id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
