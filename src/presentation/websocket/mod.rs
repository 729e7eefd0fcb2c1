//! WebSocket Fan-out
//!
//! Live room connections fed from the message broker.

pub mod bridge;
pub mod handler;
pub mod registry;

pub use bridge::BridgeConsumer;
pub use handler::ws_handler;
pub use registry::{
    BroadcastReport, ConnectionHandle, ConnectionId, ConnectionRegistry, JoinOutcome,
    RegistryError,
};
