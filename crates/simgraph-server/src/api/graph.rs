//! Graph read and recompute handlers.

use axum::{extract::State, Extension, Json};
use serde::Serialize;

use crate::middleware::RequestId;
use crate::recompute::{self, RecomputeOutcome};

use super::{map_db_error, map_recompute_error, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Serialize)]
pub(super) struct GraphNode {
    pub id: String,
    pub name: String,
    pub sentiment: String,
    pub post_count: i32,
}

#[derive(Debug, Serialize)]
pub(super) struct GraphEdge {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub score: f64,
    pub label: String,
    pub justification_posts: [String; 2],
}

#[derive(Debug, Serialize)]
pub(super) struct GraphView {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl From<simgraph_db::GraphSnapshot> for GraphView {
    fn from(snapshot: simgraph_db::GraphSnapshot) -> Self {
        Self {
            nodes: snapshot
                .users
                .into_iter()
                .map(|u| GraphNode {
                    id: u.user_id,
                    name: u.name,
                    sentiment: u.sentiment,
                    post_count: u.post_count,
                })
                .collect(),
            edges: snapshot
                .edges
                .into_iter()
                .map(|e| GraphEdge {
                    source: e.user_a,
                    target: e.user_b,
                    kind: simgraph_core::graph::SIMILAR_CONTENT,
                    score: e.score,
                    label: e.label,
                    justification_posts: [e.post_a, e.post_b],
                })
                .collect(),
        }
    }
}

/// GET /api/v1/graph: users as nodes, `SIMILAR_CONTENT` relationships as
/// edges.
pub(super) async fn get_graph(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<GraphView>>, ApiError> {
    let snapshot = simgraph_db::graph_snapshot(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: GraphView::from(snapshot),
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// POST /api/v1/graph/recompute: rebuild relationships from stored posts.
pub(super) async fn recompute_graph(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<RecomputeOutcome>>, ApiError> {
    let outcome = recompute::recompute(&state)
        .await
        .map_err(|e| map_recompute_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: outcome,
        meta: ResponseMeta::new(req_id.0),
    }))
}
