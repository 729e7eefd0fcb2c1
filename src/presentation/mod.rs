//! Presentation Layer
//!
//! HTTP routes and WebSocket room connections.

pub mod http;
pub mod middleware;
pub mod websocket;
