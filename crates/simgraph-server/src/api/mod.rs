mod graph;
mod posts;
mod users;

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use simgraph_core::AppConfig;
use simgraph_db::PgGraphStore;
use simgraph_engine::InferenceEngine;
use simgraph_reconcile::{Reconciler, RetryPolicy, RetryingStore};
use sqlx::PgPool;
use tokio::sync::Mutex;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{request_id, RequestId};
use crate::recompute::RecomputeError;

pub type GraphReconciler = Reconciler<RetryingStore<PgGraphStore>>;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub engine: Arc<InferenceEngine>,
    pub reconciler: Arc<GraphReconciler>,
    pub(crate) recompute_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(pool: PgPool, config: Arc<AppConfig>, engine: InferenceEngine) -> Self {
        let reconciler = Reconciler::with_retry(
            PgGraphStore::new(pool.clone()),
            RetryPolicy::from_app_config(&config),
        );
        Self {
            pool,
            config,
            engine: Arc::new(engine),
            reconciler: Arc::new(reconciler),
            recompute_lock: Arc::new(Mutex::new(())),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "conflict" => StatusCode::CONFLICT,
            "store_unavailable" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

/// Clamp a `limit` query parameter. Defaults to 10, the size of the recent
/// posts feed.
pub(super) fn normalize_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(10).clamp(1, 100)
}

pub(super) fn map_db_error(request_id: String, error: &simgraph_db::DbError) -> ApiError {
    tracing::error!(error = %error, "database query failed");
    ApiError::new(request_id, "internal_error", "database query failed")
}

pub(super) fn map_recompute_error(request_id: String, error: &RecomputeError) -> ApiError {
    match error {
        RecomputeError::Inference(e) => {
            tracing::warn!(error = %e, "stored posts rejected by inference");
            ApiError::new(request_id, "validation_error", e.to_string())
        }
        e if e.is_retriable() => {
            tracing::warn!(error = %e, "graph recompute failed, retriable");
            ApiError::new(request_id, "store_unavailable", e.to_string())
        }
        e => {
            tracing::error!(error = %e, "graph recompute failed");
            ApiError::new(request_id, "internal_error", e.to_string())
        }
    }
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static("x-request-id")])
}

fn api_router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/users", get(users::list_users).post(users::create_user))
        .route(
            "/api/v1/users/{user_id}/posts",
            get(users::list_user_posts),
        )
        .route("/api/v1/posts", post(posts::create_post))
        .route("/api/v1/posts/recent", get(posts::list_recent_posts))
        .route("/api/v1/graph", get(graph::get_graph))
        .route("/api/v1/graph/recompute", post(graph::recompute_graph))
}

pub fn build_app(state: AppState) -> Router {
    let public_routes = Router::new().route("/api/v1/health", get(health));

    Router::new()
        .merge(public_routes)
        .merge(api_router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);

    match simgraph_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}


#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
