//! Post handlers. Creating a post classifies it immediately and, when
//! `SIMGRAPH_RECOMPUTE_ON_WRITE` is on, rebuilds relationships afterwards.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;
use crate::recompute;

use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState, ResponseMeta};

const MAX_CONTENT_LEN: usize = 10_000;

#[derive(Debug, Deserialize)]
pub(super) struct CreatePostRequest {
    pub user_id: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct RecentPostsQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct PostItem {
    pub post_id: String,
    pub user_id: String,
    pub user_name: String,
    pub content: String,
    pub sentiment: String,
    pub sentiment_score: f64,
    pub created_at: DateTime<Utc>,
}

impl From<simgraph_db::PostRow> for PostItem {
    fn from(row: simgraph_db::PostRow) -> Self {
        Self {
            post_id: row.post_id,
            user_id: row.user_id,
            user_name: row.user_name,
            content: row.content,
            sentiment: row.sentiment,
            sentiment_score: row.sentiment_score,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct CreatePostResponse {
    pub post: PostItem,
    /// `false` when recompute-on-write is off or the recompute failed. The
    /// post is stored either way.
    pub relationships_updated: bool,
}

/// POST /api/v1/posts: store a post with its sentiment.
pub(super) async fn create_post(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CreatePostResponse>>), ApiError> {
    let rid = &req_id.0;

    if body.content.trim().is_empty() || body.content.chars().count() > MAX_CONTENT_LEN {
        return Err(ApiError::new(
            rid,
            "validation_error",
            format!("content must be 1-{MAX_CONTENT_LEN} characters"),
        ));
    }
    let user = simgraph_db::get_user(&state.pool, &body.user_id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    if user.is_none() {
        return Err(ApiError::new(
            rid,
            "not_found",
            format!("user '{}' not found", body.user_id),
        ));
    }

    let sentiment = state.engine.classify(&body.content);
    let post_id = Uuid::new_v4().to_string();
    let row = simgraph_db::insert_post(
        &state.pool,
        &simgraph_db::NewPost {
            post_id: &post_id,
            user_id: &body.user_id,
            content: &body.content,
            sentiment: sentiment.label,
            sentiment_score: sentiment.score,
        },
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;
    tracing::info!(
        post_id = %row.post_id,
        user_id = %row.user_id,
        sentiment = %sentiment.label,
        "post created"
    );

    let relationships_updated = if state.config.recompute_on_write {
        match recompute::recompute(&state).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e, post_id = %row.post_id, "recompute after post failed");
                false
            }
        }
    } else {
        false
    };

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse {
            data: CreatePostResponse {
                post: PostItem::from(row),
                relationships_updated,
            },
            meta: ResponseMeta::new(req_id.0),
        }),
    ))
}

/// GET /api/v1/posts/recent: newest posts across all users.
pub(super) async fn list_recent_posts(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<RecentPostsQuery>,
) -> Result<Json<ApiResponse<Vec<PostItem>>>, ApiError> {
    let rows = simgraph_db::list_recent_posts(&state.pool, normalize_limit(query.limit))
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(PostItem::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}
