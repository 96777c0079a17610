//! Database operations for the `posts` table.
//!
//! Every read joins the author's display name so callers never need a second
//! round trip to `users`.

use chrono::{DateTime, Utc};
use simgraph_core::{Post, PostNode, SentimentLabel};
use sqlx::PgPool;

use crate::DbError;

/// A row from `posts`, joined with its author's name.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PostRow {
    pub post_id: String,
    pub user_id: String,
    pub user_name: String,
    pub content: String,
    pub sentiment: String,
    pub sentiment_score: f64,
    pub created_at: DateTime<Utc>,
}

/// Fields required to insert a new post.
#[derive(Debug)]
pub struct NewPost<'a> {
    pub post_id: &'a str,
    pub user_id: &'a str,
    pub content: &'a str,
    pub sentiment: SentimentLabel,
    pub sentiment_score: f64,
}

const POST_COLUMNS: &str = "p.post_id, p.user_id, u.name AS user_name, p.content, \
                            p.sentiment, p.sentiment_score, p.created_at";

/// Insert a post with its sentiment already computed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails, including the foreign-key
/// violation when `user_id` does not exist.
pub async fn insert_post(pool: &PgPool, post: &NewPost<'_>) -> Result<PostRow, DbError> {
    let row = sqlx::query_as::<_, PostRow>(&format!(
        "WITH p AS ( \
             INSERT INTO posts (post_id, user_id, content, sentiment, sentiment_score) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING post_id, user_id, content, sentiment, sentiment_score, created_at \
         ) \
         SELECT {POST_COLUMNS} FROM p JOIN users u ON u.user_id = p.user_id"
    ))
    .bind(post.post_id)
    .bind(post.user_id)
    .bind(post.content)
    .bind(post.sentiment.as_str())
    .bind(post.sentiment_score)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Write an inferred post node. Idempotent by `post_id`; an existing row keeps
/// its `created_at`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn upsert_post_node(pool: &PgPool, post: &PostNode) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO posts (post_id, user_id, content, sentiment, sentiment_score) \
         VALUES ($1, $2, $3, $4, $5) \
         ON CONFLICT (post_id) DO UPDATE SET \
             user_id = EXCLUDED.user_id, \
             content = EXCLUDED.content, \
             sentiment = EXCLUDED.sentiment, \
             sentiment_score = EXCLUDED.sentiment_score, \
             updated_at = NOW()",
    )
    .bind(&post.id)
    .bind(&post.author_id)
    .bind(&post.text)
    .bind(post.sentiment.as_str())
    .bind(post.score)
    .execute(pool)
    .await?;

    Ok(())
}

/// Posts by one user, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_user_posts(pool: &PgPool, user_id: &str) -> Result<Vec<PostRow>, DbError> {
    let rows = sqlx::query_as::<_, PostRow>(&format!(
        "SELECT {POST_COLUMNS} \
         FROM posts p JOIN users u ON u.user_id = p.user_id \
         WHERE p.user_id = $1 \
         ORDER BY p.created_at DESC, p.post_id DESC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// The `limit` most recent posts across all users.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_recent_posts(pool: &PgPool, limit: i64) -> Result<Vec<PostRow>, DbError> {
    let rows = sqlx::query_as::<_, PostRow>(&format!(
        "SELECT {POST_COLUMNS} \
         FROM posts p JOIN users u ON u.user_id = p.user_id \
         ORDER BY p.created_at DESC, p.post_id DESC \
         LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Every stored post in the shape the inference engine consumes, oldest
/// first. The author's stored name is carried as the display name.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_posts_for_inference(pool: &PgPool) -> Result<Vec<Post>, DbError> {
    let rows = sqlx::query_as::<_, PostRow>(&format!(
        "SELECT {POST_COLUMNS} \
         FROM posts p JOIN users u ON u.user_id = p.user_id \
         ORDER BY p.created_at, p.post_id"
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(PostRow::into_post).collect())
}

impl PostRow {
    /// Drop storage metadata, keeping what inference needs.
    #[must_use]
    pub fn into_post(self) -> Post {
        Post::new(self.post_id, self.user_id, self.content).with_author_name(self.user_name)
    }
}
