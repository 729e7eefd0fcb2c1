//! CORS Middleware Configuration

use std::time::Duration;

use axum::http::{header, HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};

use crate::config::CorsSettings;

const PREFLIGHT_MAX_AGE: Duration = Duration::from_secs(3600);

/// Create CORS layer from settings
///
/// An empty or entirely unparsable origin list allows any origin.
pub fn create_cors_layer(settings: &CorsSettings) -> CorsLayer {
    let origins = parse_origins(&settings.allowed_origins);

    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(origins).max_age(PREFLIGHT_MAX_AGE)
    }
}

fn parse_origins(origins: &[String]) -> Vec<HeaderValue> {
    origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect()
}
