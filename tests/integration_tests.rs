//! Integration Tests Entry Point
//!
//! This file serves as the entry point for integration tests.
//! Tests are organized by module:
//! - `api/` - REST API endpoint tests
//! - `messaging/` - Mediator to broker to WebSocket room flows
//! - `common/` - Shared test utilities

mod api;
mod common;
mod messaging;

// Re-export common utilities for tests
pub use common::*;
