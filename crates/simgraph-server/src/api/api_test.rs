use super::graph::{GraphEdge, GraphView};
use super::test_support::test_state;
use super::*;
use axum::body::{to_bytes, Body};
use axum::http::Request;
use simgraph_reconcile::ReconcileError;
use tower::ServiceExt;

async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.expect("response");
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    let json = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).expect("json parse")
    };
    (status, json)
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

fn post_json(uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

// -------------------------------------------------------------------------
// Envelope and error mapping (no DB)
// -------------------------------------------------------------------------

#[test]
fn normalize_limit_applies_defaults_and_bounds() {
    assert_eq!(normalize_limit(None), 10);
    assert_eq!(normalize_limit(Some(0)), 1);
    assert_eq!(normalize_limit(Some(1_000)), 100);
    assert_eq!(normalize_limit(Some(25)), 25);
}

#[test]
fn api_error_validation_error_maps_to_bad_request() {
    let response = ApiError::new("req-1", "validation_error", "invalid input").into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[test]
fn api_error_store_unavailable_maps_to_service_unavailable() {
    let response = ApiError::new("req-1", "store_unavailable", "try later").into_response();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[test]
fn api_error_unknown_code_maps_to_internal_error() {
    let response = ApiError::new("req-1", "internal_error", "boom").into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[test]
fn recompute_errors_map_to_codes() {
    let partial = RecomputeError::Reconcile(ReconcileError::Partial {
        index: 2,
        unapplied: vec![],
        source: simgraph_reconcile::StoreError::Transient("reset".to_string()),
    });
    assert_eq!(
        map_recompute_error("r".to_string(), &partial).error.code,
        "store_unavailable"
    );

    let permanent = RecomputeError::Reconcile(ReconcileError::Permanent {
        index: 0,
        operation: simgraph_reconcile::PlanOperation::DeleteEdge(simgraph_core::UserPair::new(
            "a", "b",
        )),
        unapplied: vec![],
        source: simgraph_reconcile::StoreError::Permanent("constraint".to_string()),
    });
    assert_eq!(
        map_recompute_error("r".to_string(), &permanent).error.code,
        "internal_error"
    );

    let timed_out = RecomputeError::Reconcile(ReconcileError::DeadlineExceeded {
        deadline: std::time::Duration::from_secs(30),
        unapplied: vec![],
    });
    assert_eq!(
        map_recompute_error("r".to_string(), &timed_out).error.code,
        "store_unavailable"
    );
}

#[test]
fn graph_view_is_serializable() {
    let view = GraphView {
        nodes: vec![],
        edges: vec![GraphEdge {
            source: "a".to_string(),
            target: "b".to_string(),
            kind: simgraph_core::graph::SIMILAR_CONTENT,
            score: 0.5,
            label: "positive".to_string(),
            justification_posts: ["1".to_string(), "2".to_string()],
        }],
    };
    let json = serde_json::to_value(&view).expect("serialize");
    assert_eq!(json["edges"][0]["type"], "SIMILAR_CONTENT");
    assert_eq!(json["edges"][0]["justification_posts"][1], "2");
}

// -------------------------------------------------------------------------
// Routes (with DB)
// -------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn health_returns_ok(pool: sqlx::PgPool) {
    let (status, json) = send(
        build_app(test_state(pool, false)),
        get_request("/api/v1/health"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["database"], "ok");
    assert!(json["meta"]["request_id"].is_string());
}

#[sqlx::test(migrations = "../../migrations")]
async fn create_and_list_users(pool: sqlx::PgPool) {
    let app = build_app(test_state(pool, false));

    let (status, json) = send(
        app.clone(),
        post_json("/api/v1/users", &serde_json::json!({"user_id": "u2", "name": "Bob"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["user_id"], "u2");
    assert_eq!(json["data"]["sentiment"], "neutral");

    let (status, json) = send(
        app.clone(),
        post_json("/api/v1/users", &serde_json::json!({"name": "Alice"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(!json["data"]["user_id"].as_str().unwrap_or_default().is_empty());

    let (status, json) = send(app, get_request("/api/v1/users")).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = json["data"]
        .as_array()
        .expect("data array")
        .iter()
        .filter_map(|u| u["name"].as_str())
        .collect();
    assert_eq!(names, vec!["Alice", "Bob"]);
}

#[sqlx::test(migrations = "../../migrations")]
async fn create_user_rejects_blank_name(pool: sqlx::PgPool) {
    let (status, json) = send(
        build_app(test_state(pool, false)),
        post_json("/api/v1/users", &serde_json::json!({"name": "   "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "validation_error");
}

#[sqlx::test(migrations = "../../migrations")]
async fn create_post_for_unknown_user_returns_404(pool: sqlx::PgPool) {
    let (status, _) = send(
        build_app(test_state(pool, false)),
        post_json(
            "/api/v1/posts",
            &serde_json::json!({"user_id": "ghost", "content": "hello"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../migrations")]
async fn user_posts_returns_404_for_unknown_user(pool: sqlx::PgPool) {
    let (status, _) = send(
        build_app(test_state(pool, false)),
        get_request("/api/v1/users/ghost/posts"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../migrations")]
async fn create_post_classifies_sentiment(pool: sqlx::PgPool) {
    simgraph_db::upsert_user(&pool, "u1", "Alice").await.unwrap();
    let app = build_app(test_state(pool, false));

    let (status, json) = send(
        app.clone(),
        post_json(
            "/api/v1/posts",
            &serde_json::json!({"user_id": "u1", "content": "terrible awful day"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["post"]["sentiment"], "negative");
    assert_eq!(json["data"]["post"]["user_name"], "Alice");
    assert_eq!(json["data"]["relationships_updated"], false);

    let (status, json) = send(app, get_request("/api/v1/posts/recent?limit=5")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"].as_array().map(Vec::len), Some(1));
}

#[sqlx::test(migrations = "../../migrations")]
async fn posting_with_recompute_on_write_builds_relationships(pool: sqlx::PgPool) {
    simgraph_db::upsert_user(&pool, "A", "Ann").await.unwrap();
    simgraph_db::upsert_user(&pool, "B", "Ben").await.unwrap();
    simgraph_db::upsert_user(&pool, "C", "Cat").await.unwrap();
    let app = build_app(test_state(pool, true));

    for (user, content) in [
        ("A", "I love this, it's great"),
        ("B", "I love this too, amazing"),
        ("C", "terrible awful day"),
    ] {
        let (status, json) = send(
            app.clone(),
            post_json(
                "/api/v1/posts",
                &serde_json::json!({"user_id": user, "content": content}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["data"]["relationships_updated"], true);
    }

    let (status, json) = send(app, get_request("/api/v1/graph")).await;
    assert_eq!(status, StatusCode::OK);
    let edges = json["data"]["edges"].as_array().expect("edges array");
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0]["source"], "A");
    assert_eq!(edges[0]["target"], "B");
    assert_eq!(edges[0]["label"], "positive");
    let cat = json["data"]["nodes"]
        .as_array()
        .expect("nodes array")
        .iter()
        .find(|n| n["id"] == "C")
        .expect("node C");
    assert_eq!(cat["sentiment"], "negative");
}

#[sqlx::test(migrations = "../../migrations")]
async fn recompute_retracts_unsupported_edges(pool: sqlx::PgPool) {
    simgraph_db::upsert_user(&pool, "a", "A").await.unwrap();
    simgraph_db::upsert_user(&pool, "b", "B").await.unwrap();
    simgraph_db::upsert_edge(
        &pool,
        &simgraph_core::SimilarityEdge {
            pair: simgraph_core::UserPair::new("a", "b"),
            score: 0.9,
            label: simgraph_core::SentimentLabel::Positive,
            justification_posts: ("gone-1".to_string(), "gone-2".to_string()),
        },
    )
    .await
    .unwrap();

    let app = build_app(test_state(pool, false));
    let (status, json) = send(
        app.clone(),
        post_json("/api/v1/graph/recompute", &serde_json::json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["plan"]["edges_retracted"], 1);
    assert_eq!(json["data"]["report"]["edges_retracted"], 1);

    let (_, json) = send(app, get_request("/api/v1/graph")).await;
    assert_eq!(json["data"]["edges"].as_array().map(Vec::len), Some(0));
}
