//! Integration Tests for API Endpoints
//!
//! Tests full request/response cycle for each endpoint.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use cache_shield::{
    cache::SqliteTier,
    clock::ManualClock,
    config::{Config, IN_MEMORY_DURABLE},
    create_router,
    limiter::{Category, Policy, PolicyTable},
    AppState, Services,
};
use serde_json::Value;
use tower::ServiceExt;

// == Helper Functions ==

fn test_config() -> Config {
    Config {
        durable_path: IN_MEMORY_DURABLE.to_string(),
        ..Config::default()
    }
}

fn start_services(policies: PolicyTable, clock: Arc<ManualClock>) -> Services {
    Services::start_with(
        &test_config(),
        Arc::new(SqliteTier::in_memory().unwrap()),
        policies,
        clock,
    )
}

fn create_test_app() -> Router {
    let services = start_services(PolicyTable::default(), Arc::new(ManualClock::new(1_000_000)));
    create_router(AppState::from_services(&services))
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn put_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn empty(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

// == Cache Endpoint Tests ==

#[tokio::test]
async fn test_set_endpoint_success() {
    let app = create_test_app();

    let response = app
        .oneshot(put_json("/cache", r#"{"key":"user:42","value":{"name":"Awa"}}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["key"], "user:42");
    assert!(json["message"].as_str().unwrap().contains("user:42"));
}

#[tokio::test]
async fn test_set_then_get_roundtrip() {
    let app = create_test_app();

    app.clone()
        .oneshot(put_json(
            "/cache",
            r#"{"key":"product:9","value":{"price":1500},"ttl":60}"#,
        ))
        .await
        .unwrap();

    let response = app.oneshot(empty("GET", "/cache/product:9")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["value"]["price"], 1500);
}

#[tokio::test]
async fn test_get_endpoint_not_found() {
    let app = create_test_app();

    let response = app.oneshot(empty("GET", "/cache/missing")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_to_json(response.into_body()).await;
    assert!(json["error"].as_str().unwrap().contains("missing"));
}

#[tokio::test]
async fn test_delete_endpoint() {
    let app = create_test_app();

    app.clone()
        .oneshot(put_json("/cache", r#"{"key":"gone","value":1}"#))
        .await
        .unwrap();
    let response = app.clone().oneshot(empty("DELETE", "/cache/gone")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(empty("GET", "/cache/gone")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalidate_endpoint_removes_prefix() {
    let app = create_test_app();

    for key in ["search:shoes", "search:bags", "product:1"] {
        app.clone()
            .oneshot(put_json("/cache", &format!(r#"{{"key":"{key}","value":[]}}"#)))
            .await
            .unwrap();
    }

    let response = app
        .clone()
        .oneshot(post_json("/cache/invalidate", r#"{"pattern":"search:*"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["removed"], 2);

    let response = app.oneshot(empty("GET", "/cache/product:1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_ttl_expiration_via_api() {
    let clock = Arc::new(ManualClock::new(1_000_000));
    let services = start_services(PolicyTable::default(), clock.clone());
    let app = create_router(AppState::from_services(&services));

    app.clone()
        .oneshot(put_json("/cache", r#"{"key":"otp","value":"1234","ttl":1}"#))
        .await
        .unwrap();
    clock.advance(1_000);

    let response = app.oneshot(empty("GET", "/cache/otp")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    services.shutdown().await;
}

#[tokio::test]
async fn test_stats_endpoint() {
    let app = create_test_app();

    app.clone()
        .oneshot(put_json("/cache", r#"{"key":"stats_key","value":"v"}"#))
        .await
        .unwrap();
    app.clone().oneshot(empty("GET", "/cache/stats_key")).await.unwrap();
    app.clone().oneshot(empty("GET", "/cache/nonexistent")).await.unwrap();

    let response = app.oneshot(empty("GET", "/stats")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["cache"]["hits"].as_u64().unwrap(), 1);
    assert_eq!(json["cache"]["misses"].as_u64().unwrap(), 1);
    assert_eq!(json["cache"]["size"].as_u64().unwrap(), 1);
    assert_eq!(json["cache"]["hit_rate"].as_f64().unwrap(), 0.5);
    assert_eq!(json["limiter"]["by_category"]["public"].as_u64().unwrap(), 1);
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app();

    let response = app.oneshot(empty("GET", "/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"].as_str().unwrap(), "healthy");
    assert!(json.get("timestamp").is_some());
}

// == Rate Limit Endpoint Tests ==

#[tokio::test]
async fn test_check_consumes_and_peek_does_not() {
    let app = create_test_app();

    let response = app
        .clone()
        .oneshot(empty("POST", "/limits/auth/+224620000001/check"))
        .await
        .unwrap();
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["allowed"], true);
    assert_eq!(json["remaining"], 4);

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(empty("GET", "/limits/auth/+224620000001"))
            .await
            .unwrap();
        let json = body_to_json(response.into_body()).await;
        assert_eq!(json["remaining"], 3);
    }
}

#[tokio::test]
async fn test_block_and_reset_endpoints() {
    let app = create_test_app();

    let response = app
        .clone()
        .oneshot(post_json(
            "/limits/financial/wallet-3/block",
            r#"{"duration_ms":120000}"#,
        ))
        .await
        .unwrap();
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["allowed"], false);
    assert_eq!(json["retry_after_secs"], 120);

    let response = app
        .clone()
        .oneshot(empty("DELETE", "/clients/wallet-3/limits"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(empty("GET", "/limits/financial/wallet-3"))
        .await
        .unwrap();
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["allowed"], true);
    // Peek reports the budget left after a request it does not make
    assert_eq!(json["remaining"], 9);
}

#[tokio::test]
async fn test_middleware_rejects_over_budget_client() {
    let clock = Arc::new(ManualClock::new(0));
    let policies = PolicyTable::with_overrides([(
        Category::Public,
        Policy::blocking(60_000, 2, 300_000),
    )]);
    let services = start_services(policies, clock);
    let app = create_router(AppState::from_services(&services));

    let request = || {
        Request::builder()
            .uri("/cache/anything")
            .header("x-client-id", "203.0.113.7")
            .body(Body::empty())
            .unwrap()
    };

    for _ in 0..2 {
        let response = app.clone().oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    // The request that crosses the ceiling is told to wait for the window
    let response = app.clone().oneshot(request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers().get("retry-after").unwrap(), "60");

    // Later ones see the block
    let response = app.clone().oneshot(request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers().get("retry-after").unwrap(), "300");
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["retry_after"], 300);

    // Other clients and unlimited routes are unaffected
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/cache/anything")
                .header("x-client-id", "198.51.100.1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let response = app.oneshot(empty("GET", "/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// == Error Response Tests ==

#[tokio::test]
async fn test_invalid_json_request() {
    let app = create_test_app();

    let response = app
        .oneshot(put_json("/cache", r#"{"invalid json"#))
        .await
        .unwrap();

    // Axum returns 422 for JSON parsing errors by default
    assert!(
        response.status() == StatusCode::BAD_REQUEST
            || response.status() == StatusCode::UNPROCESSABLE_ENTITY
    );
}

#[tokio::test]
async fn test_empty_key_request() {
    let app = create_test_app();

    let response = app
        .oneshot(put_json("/cache", r#"{"key":"","value":"v"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_category() {
    let app = create_test_app();

    let response = app
        .oneshot(empty("POST", "/limits/carrier-pigeon/x/check"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
