//! Telemetry and Observability
//!
//! Structured logging setup. `RUST_LOG` selects the filter; `LOG_FORMAT=json`
//! switches from human readable lines to one JSON object per event.

use tracing_subscriber::{
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Filter used when `RUST_LOG` is unset
const DEFAULT_FILTER: &str = "info,chat_relay=debug,tower_http=debug";

/// Initialize tracing subscriber
///
/// Calling it again keeps the subscriber installed first.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let json = std::env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);
    let installed = if json {
        registry
            .with(fmt::layer().json().with_current_span(true))
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init()
    };

    if installed.is_ok() {
        tracing::info!(json, "Tracing initialized");
    }
}
