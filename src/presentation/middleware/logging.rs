//! Request Logging
//!
//! One span per HTTP request, with the response status and latency logged
//! when it completes.

use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnResponse, TraceLayer};
use tracing::Level;

pub type HttpTraceLayer = TraceLayer<SharedClassifier<ServerErrorsAsFailures>>;

/// Create the request tracing layer
pub fn create_trace_layer() -> HttpTraceLayer {
    TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::DEBUG))
        .on_failure(DefaultOnFailure::new().level(Level::ERROR))
}
