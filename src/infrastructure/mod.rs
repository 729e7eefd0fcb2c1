//! Infrastructure Layer
//!
//! Contains implementations for external services including:
//! - Message broker adapters (Redis streams, in-memory)
//! - Repository implementations
//! - Prometheus metrics

pub mod broker;
pub mod metrics;
pub mod repositories;
