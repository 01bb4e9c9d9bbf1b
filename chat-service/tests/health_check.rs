//! Health, readiness and metrics endpoints.

mod common;

use axum::body::to_bytes;
use axum::http::StatusCode;
use chat_service::services::metrics::init_metrics;
use common::{body_json, get, post_json, spawn_app, RecordingStore, TestAppBuilder};
use tower::ServiceExt;

#[tokio::test]
async fn health_check_returns_ok() {
    let app = spawn_app();

    let response = app.router.clone().oneshot(get("/health", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "chat-service");
}

#[tokio::test]
async fn health_check_reports_store_outage() {
    let app = TestAppBuilder::new()
        .store(RecordingStore::failing())
        .build();

    let response = app.router.clone().oneshot(get("/health", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["status"], "unhealthy");
}

#[tokio::test]
async fn health_endpoints_ignore_authorization_header() {
    let app = spawn_app();

    for uri in ["/health", "/ready", "/metrics"] {
        let response = app
            .router
            .clone()
            .oneshot(get(uri, Some("not-a-jwt")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "uri: {uri}");
    }
}

#[tokio::test]
async fn readiness_follows_store() {
    let healthy = spawn_app();
    let response = healthy
        .router
        .clone()
        .oneshot(get("/ready", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let down = TestAppBuilder::new()
        .store(RecordingStore::failing())
        .build();
    let response = down.router.clone().oneshot(get("/ready", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn metrics_expose_prompt_counters() {
    init_metrics().unwrap();
    let app = spawn_app();

    let response = app
        .router
        .clone()
        .oneshot(post_json(
            "/prompt",
            r#"{"prompt":"hi","sessionId":"s-metrics"}"#,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.router.clone().oneshot(get("/metrics", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("chat_prompts_total"));
    assert!(text.contains("http_requests_total"));
}

#[tokio::test]
async fn responses_carry_request_id() {
    let app = spawn_app();

    let response = app.router.clone().oneshot(get("/health", None)).await.unwrap();

    assert!(response.headers().contains_key("x-request-id"));
}
