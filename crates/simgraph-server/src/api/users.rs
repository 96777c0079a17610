//! User handlers: create/rename, list, and per-user post history.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::posts::PostItem;
use super::{map_db_error, ApiError, ApiResponse, AppState, ResponseMeta};

const MAX_NAME_LEN: usize = 200;

#[derive(Debug, Deserialize)]
pub(super) struct CreateUserRequest {
    /// Generated when omitted.
    pub user_id: Option<String>,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub(super) struct UserItem {
    pub user_id: String,
    pub name: String,
    pub sentiment: String,
    pub post_count: i32,
    pub created_at: DateTime<Utc>,
}

impl From<simgraph_db::UserRow> for UserItem {
    fn from(row: simgraph_db::UserRow) -> Self {
        Self {
            user_id: row.user_id,
            name: row.name,
            sentiment: row.sentiment,
            post_count: row.post_count,
            created_at: row.created_at,
        }
    }
}

/// POST /api/v1/users: create a user, or rename an existing one.
pub(super) async fn create_user(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserItem>>), ApiError> {
    let rid = &req_id.0;

    let name = body.name.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
        return Err(ApiError::new(
            rid,
            "validation_error",
            format!("name must be 1-{MAX_NAME_LEN} characters"),
        ));
    }
    let user_id = match body.user_id.as_deref().map(str::trim) {
        Some("") => {
            return Err(ApiError::new(
                rid,
                "validation_error",
                "user_id must not be blank",
            ))
        }
        Some(id) => id.to_owned(),
        None => Uuid::new_v4().to_string(),
    };

    let row = simgraph_db::upsert_user(&state.pool, &user_id, name)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    tracing::info!(user_id = %row.user_id, "user upserted");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse {
            data: UserItem::from(row),
            meta: ResponseMeta::new(req_id.0),
        }),
    ))
}

/// GET /api/v1/users: all users ordered by name.
pub(super) async fn list_users(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<UserItem>>>, ApiError> {
    let rows = simgraph_db::list_users(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(UserItem::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// GET /api/v1/users/{user_id}/posts: a user's posts, newest first.
pub(super) async fn list_user_posts(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(user_id): Path<String>,
) -> Result<Json<ApiResponse<Vec<PostItem>>>, ApiError> {
    let rid = &req_id.0;
    let user = simgraph_db::get_user(&state.pool, &user_id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    if user.is_none() {
        return Err(ApiError::new(
            rid,
            "not_found",
            format!("user '{user_id}' not found"),
        ));
    }

    let rows = simgraph_db::list_user_posts(&state.pool, &user_id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(PostItem::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}
