//! HTTP tests for the emotion server
//!
//! Drive the router directly with `oneshot`, backed by the keyword-counting test
//! service so no model weights are needed.

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use emotion_classifier::testing::{keyword_service, slow_service};
use emotion_server::{create_router, AppState, ServerConfig};
use metrics_exporter_prometheus::PrometheusBuilder;
use serde_json::Value;
use std::time::Duration;
use tower::ServiceExt;

fn app(dir: &std::path::Path) -> Router {
    let service = keyword_service(dir, 100).unwrap();
    let handle = PrometheusBuilder::new().build_recorder().handle();
    create_router(AppState::new(service, ServerConfig::default(), handle))
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_index() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path())
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "Hello World!");
}

#[tokio::test]
async fn test_health_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path())
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "OK");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path())
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_emotion_returns_label() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());

    let cases = [
        ("i am so scared", "FEAR"),
        ("i am furious", "ANGER"),
        ("i feel lonely", "SAD"),
        ("i am happy today", "JOY"),
    ];

    for (content, label) in cases {
        let body = serde_json::json!({ "content": content }).to_string();
        let response = app
            .clone()
            .oneshot(post_json("/emotion", &body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, label);
    }
}

#[tokio::test]
async fn test_scores_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path())
        .oneshot(post_json("/emotion/scores", r#"{"content": "glad and happy"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let value: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(value["label"], "JOY");

    let probabilities = value["probabilities"].as_object().unwrap();
    assert_eq!(probabilities.len(), 4);
    let total: f64 = probabilities.values().filter_map(Value::as_f64).sum();
    assert!((total - 100.0).abs() < 0.1);
    assert!(probabilities["JOY"].as_f64().unwrap() > probabilities["SAD"].as_f64().unwrap());
}

#[tokio::test]
async fn test_empty_content_is_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path())
        .oneshot(post_json("/emotion", r#"{"content": "   "}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let value: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(value["error"]["type"], "invalid_request");
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());

    let missing_field = app
        .clone()
        .oneshot(post_json("/emotion", r#"{"text": "happy"}"#))
        .await
        .unwrap();
    assert_eq!(missing_field.status(), StatusCode::BAD_REQUEST);

    let not_json = app
        .oneshot(post_json("/emotion", "happy"))
        .await
        .unwrap();
    assert_eq!(not_json.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_escaped_content_within_char_limit() {
    let dir = tempfile::tempdir().unwrap();
    // 900 characters, written as 5400 bytes of `\uXXXX` escapes.
    let body = format!(r#"{{"content": "{}"}}"#, "\\uae30".repeat(900));
    let response = app(dir.path())
        .oneshot(post_json("/emotion", &body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "FEAR");
}

#[tokio::test]
async fn test_escaped_content_over_char_limit() {
    let dir = tempfile::tempdir().unwrap();
    let body = format!(r#"{{"content": "{}"}}"#, "\\uae30".repeat(1100));
    let response = app(dir.path())
        .oneshot(post_json("/emotion/scores", &body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let value: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(value["error"]["type"], "invalid_request");
}

#[tokio::test]
async fn test_inference_past_deadline_is_gateway_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let service = slow_service(dir.path(), 100, Duration::from_millis(500)).unwrap();
    let config = ServerConfig {
        request_timeout_ms: 1,
        ..ServerConfig::default()
    };
    let handle = PrometheusBuilder::new().build_recorder().handle();
    let app = create_router(AppState::new(service, config, handle));

    let response = app
        .oneshot(post_json("/emotion", r#"{"content": "i am happy"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);

    let value: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(value["error"]["type"], "timeout");
}

#[tokio::test]
async fn test_unknown_route() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path())
        .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
