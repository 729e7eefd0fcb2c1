//! Health Check API Tests

use axum::http::StatusCode;
use chat_relay::infrastructure::broker::MessageBroker;
use serde_json::Value;

use crate::common::TestApp;

#[tokio::test]
async fn test_health_check_returns_ok() {
    let app = TestApp::spawn().await;

    let response = app.server.get("/health").await;

    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "healthy");
}

#[tokio::test]
async fn test_liveness_probe() {
    let app = TestApp::spawn().await;

    let response = app.server.get("/health/live").await;

    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "alive");
}

#[tokio::test]
async fn test_readiness_reports_broker_and_rooms() {
    let app = TestApp::spawn().await;

    let response = app.server.get("/health/ready").await;

    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["checks"]["broker"]["status"], "healthy");
    assert_eq!(body["checks"]["websocket"]["active_connections"], 0);
    assert_eq!(body["checks"]["websocket"]["active_rooms"], 0);
}

#[tokio::test]
async fn test_readiness_fails_when_broker_stopped() {
    let app = TestApp::spawn().await;
    app.broker.stop().await.unwrap();

    let response = app.server.get("/health/ready").await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.json::<Value>()["status"], "unhealthy");
}

#[tokio::test]
async fn test_metrics_endpoint_exposes_command_counters() {
    let app = TestApp::spawn().await;
    app.post_chat("Metrics").await;

    let response = app.server.get("/metrics").await;

    response.assert_status_ok();
    assert!(response.text().contains("chat_relay_commands_total"));
}
