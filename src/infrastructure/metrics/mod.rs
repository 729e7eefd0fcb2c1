//! Prometheus Metrics Module
//!
//! Provides application-wide metrics collection using Prometheus.
//!
//! # Metrics Collected
//! - Mediator command counts by kind and outcome
//! - Domain events dispatched and event handler failures
//! - Broker produce outcomes by topic class
//! - Room broadcast deliveries and dropped connections
//! - Active WebSocket connections and running room bridges
//! - Bridge consumers lost to persistent broker failures

use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Commands handled by the mediator, by kind and outcome ("ok", "error")
pub static COMMANDS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("commands_total", "Commands handled by the mediator").namespace("chat_relay"),
        &["kind", "outcome"],
    )
    .expect("Failed to create COMMANDS_TOTAL metric")
});

/// Domain events dispatched to handlers, by event kind
pub static EVENTS_DISPATCHED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("events_dispatched_total", "Domain events dispatched").namespace("chat_relay"),
        &["kind"],
    )
    .expect("Failed to create EVENTS_DISPATCHED_TOTAL metric")
});

/// Event handler failures, by event kind and handler name
pub static EVENT_HANDLER_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("event_handler_failures_total", "Event handler failures")
            .namespace("chat_relay"),
        &["kind", "handler"],
    )
    .expect("Failed to create EVENT_HANDLER_FAILURES_TOTAL metric")
});

/// Broker produce outcomes, by event kind and outcome ("ok", "failed")
pub static BROKER_PRODUCE_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("broker_produce_total", "Records produced to the broker")
            .namespace("chat_relay"),
        &["kind", "outcome"],
    )
    .expect("Failed to create BROKER_PRODUCE_TOTAL metric")
});

/// Room broadcast results ("delivered", "dropped")
pub static BROADCAST_DELIVERIES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("broadcast_deliveries_total", "Room broadcast deliveries")
            .namespace("chat_relay"),
        &["result"],
    )
    .expect("Failed to create BROADCAST_DELIVERIES_TOTAL metric")
});

/// Active WebSocket connections
pub static WEBSOCKET_CONNECTIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::with_opts(
        Opts::new(
            "websocket_connections_active",
            "Number of active WebSocket connections",
        )
        .namespace("chat_relay"),
    )
    .expect("Failed to create WEBSOCKET_CONNECTIONS_ACTIVE metric")
});

/// Rooms with a running bridge consumer
pub static ROOM_BRIDGES_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::with_opts(
        Opts::new("room_bridges_active", "Rooms with a running bridge consumer")
            .namespace("chat_relay"),
    )
    .expect("Failed to create ROOM_BRIDGES_ACTIVE metric")
});

/// Bridge consumers that reached their failure threshold
pub static BRIDGE_CONSUMER_LOST_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::with_opts(
        Opts::new(
            "bridge_consumer_lost_total",
            "Bridge consumers that kept failing to read their room topic",
        )
        .namespace("chat_relay"),
    )
    .expect("Failed to create BRIDGE_CONSUMER_LOST_TOTAL metric")
});

/// Register all metrics with the registry
fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(COMMANDS_TOTAL.clone()))
        .expect("Failed to register COMMANDS_TOTAL");
    registry
        .register(Box::new(EVENTS_DISPATCHED_TOTAL.clone()))
        .expect("Failed to register EVENTS_DISPATCHED_TOTAL");
    registry
        .register(Box::new(EVENT_HANDLER_FAILURES_TOTAL.clone()))
        .expect("Failed to register EVENT_HANDLER_FAILURES_TOTAL");
    registry
        .register(Box::new(BROKER_PRODUCE_TOTAL.clone()))
        .expect("Failed to register BROKER_PRODUCE_TOTAL");
    registry
        .register(Box::new(BROADCAST_DELIVERIES_TOTAL.clone()))
        .expect("Failed to register BROADCAST_DELIVERIES_TOTAL");
    registry
        .register(Box::new(WEBSOCKET_CONNECTIONS_ACTIVE.clone()))
        .expect("Failed to register WEBSOCKET_CONNECTIONS_ACTIVE");
    registry
        .register(Box::new(ROOM_BRIDGES_ACTIVE.clone()))
        .expect("Failed to register ROOM_BRIDGES_ACTIVE");
    registry
        .register(Box::new(BRIDGE_CONSUMER_LOST_TOTAL.clone()))
        .expect("Failed to register BRIDGE_CONSUMER_LOST_TOTAL");
}

/// Collect and encode all metrics as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Record the outcome of a mediator command
pub fn record_command(kind: &str, ok: bool) {
    COMMANDS_TOTAL
        .with_label_values(&[kind, if ok { "ok" } else { "error" }])
        .inc();
}

/// Record one event dispatch and its handler failures
pub fn record_event_dispatch(kind: &str, failed_handlers: &[&str]) {
    EVENTS_DISPATCHED_TOTAL.with_label_values(&[kind]).inc();
    for handler in failed_handlers {
        EVENT_HANDLER_FAILURES_TOTAL
            .with_label_values(&[kind, handler])
            .inc();
    }
}

/// Record a broker produce outcome
pub fn record_produce(kind: &str, ok: bool) {
    BROKER_PRODUCE_TOTAL
        .with_label_values(&[kind, if ok { "ok" } else { "failed" }])
        .inc();
}

/// Record the result of one room broadcast
pub fn record_broadcast(delivered: usize, dropped: usize) {
    BROADCAST_DELIVERIES_TOTAL
        .with_label_values(&["delivered"])
        .inc_by(delivered as u64);
    BROADCAST_DELIVERIES_TOTAL
        .with_label_values(&["dropped"])
        .inc_by(dropped as u64);
}

/// Helper to update WebSocket connection count
pub fn set_websocket_connections(connected: usize) {
    WEBSOCKET_CONNECTIONS_ACTIVE.set(connected as i64);
}

/// Helper to update the running bridge count
pub fn set_room_bridges(active: usize) {
    ROOM_BRIDGES_ACTIVE.set(active as i64);
}

/// Record a bridge consumer reaching its failure threshold
pub fn record_consumer_lost() {
    BRIDGE_CONSUMER_LOST_TOTAL.inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        // Force lazy initialization
        let _ = &*REGISTRY;
        let _ = &*COMMANDS_TOTAL;
        let _ = &*ROOM_BRIDGES_ACTIVE;
    }

    #[test]
    fn test_record_command() {
        record_command("create_chat", true);
        let metrics = gather_metrics();
        assert!(metrics.contains("chat_relay_commands_total"));
    }

    #[test]
    fn test_record_event_dispatch() {
        record_event_dispatch("chat_deleted", &["publish_chat_deleted"]);
        let metrics = gather_metrics();
        assert!(metrics.contains("chat_relay_event_handler_failures_total"));
    }
}
