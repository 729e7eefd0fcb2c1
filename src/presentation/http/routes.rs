//! Route Configuration
//!
//! Configures all HTTP routes for the API.

use axum::{
    response::IntoResponse,
    routing::get,
    Router,
};

use super::handlers;
use crate::infrastructure::metrics;
use crate::presentation::websocket::ws_handler;
use crate::startup::AppState;

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(chat_routes())
        // Health check endpoints
        .route("/health", get(handlers::health::health_check))
        .route("/health/live", get(handlers::health::liveness))
        .route("/health/ready", get(handlers::health::readiness))
        // Prometheus metrics endpoint
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Prometheus metrics endpoint handler
async fn metrics_handler() -> impl IntoResponse {
    let metrics = metrics::gather_metrics();
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        metrics,
    )
}

/// Chat routes, including the room socket
fn chat_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/chats",
            get(handlers::chat::list_chats).post(handlers::chat::create_chat),
        )
        .route(
            "/chats/{chat_oid}",
            get(handlers::chat::get_chat).delete(handlers::chat::delete_chat),
        )
        .route(
            "/chats/{chat_oid}/messages",
            get(handlers::message::get_messages).post(handlers::message::send_message),
        )
        .route(
            "/chats/{chat_oid}/listeners",
            get(handlers::chat::list_listeners).post(handlers::chat::add_listener),
        )
        .route("/chats/{chat_oid}/ws", get(ws_handler))
}
