//! Message Broker Module
//!
//! Topic-based publish/subscribe used to carry domain events between server
//! instances.
//!
//! This module provides:
//! - A `MessageBroker` trait with an explicit start/stop lifecycle
//! - A `RedisStreamBroker` built on Redis streams (shared between instances)
//! - An `InMemoryBroker` built on tokio broadcast channels (single process, tests)
//! - A `RetryPolicy` with exponential backoff for producers
//!
//! # Architecture
//!
//! ```text
//! +-------------------+        +-------------------+
//! |  Event handlers   |        |  Bridge consumers |
//! +-------------------+        +-------------------+
//!          | produce                    ^ consume
//!          v                            |
//! +--------------------------------------------------+
//! |              MessageBroker trait                 |
//! +--------------------------------------------------+
//!          |                            |
//!          v                            v
//! +-------------------+        +-------------------+
//! | RedisStreamBroker |        |  InMemoryBroker   |
//! +-------------------+        +-------------------+
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use chat_relay::infrastructure::broker::{create_broker, MessageBroker};
//!
//! let broker = create_broker(&settings.broker)?;
//! broker.start().await?;
//! broker.produce("new-chats", "key", b"{}").await?;
//! let mut records = broker.consume("chat-1-events").await?;
//! ```

mod memory;
mod redis_stream;
mod retry;

pub use self::memory::InMemoryBroker;
pub use self::redis_stream::RedisStreamBroker;
pub use self::retry::{produce_with_retry, RetryPolicy};

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use tracing::info;

use crate::config::{BrokerKind, BrokerSettings};

/// Errors raised by broker adapters.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BrokerError {
    #[error("Broker unavailable: {0}")]
    Unavailable(String),

    #[error("Broker not started")]
    NotStarted,

    #[error("Delivery to {topic} failed after {attempts} attempts: {reason}")]
    DeliveryFailed {
        topic: String,
        attempts: u32,
        reason: String,
    },

    #[error("Consumer for {topic} lost after {attempts} attempts")]
    ConsumerLost { topic: String, attempts: u32 },
}

impl BrokerError {
    /// Whether retrying the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BrokerError::Unavailable(_) | BrokerError::NotStarted)
    }
}

impl From<redis::RedisError> for BrokerError {
    fn from(err: redis::RedisError) -> Self {
        BrokerError::Unavailable(err.to_string())
    }
}

/// A single record read from a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerRecord {
    /// Partitioning key supplied by the producer
    pub key: String,

    /// Opaque payload bytes
    pub payload: Vec<u8>,
}

impl BrokerRecord {
    pub fn new(key: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            payload: payload.into(),
        }
    }
}

/// Records of one topic in production order.
///
/// The stream ends when the broker stops. An `Err` item is terminal: the
/// consumer is expected to re-subscribe.
pub type RecordStream = BoxStream<'static, Result<BrokerRecord, BrokerError>>;

/// Topic-based message broker.
///
/// `produce` and `consume` fail with `BrokerError::NotStarted` until `start`
/// has completed. `start` is idempotent; `stop` on a stopped broker fails
/// with `BrokerError::NotStarted`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// Open connections.
    async fn start(&self) -> Result<(), BrokerError>;

    /// Close connections and end every open record stream.
    async fn stop(&self) -> Result<(), BrokerError>;

    /// Append `value` to `topic` under `key`.
    async fn produce(&self, topic: &str, key: &str, value: &[u8]) -> Result<(), BrokerError>;

    /// Subscribe to records produced to `topic` from now on.
    async fn consume(&self, topic: &str) -> Result<RecordStream, BrokerError>;

    /// Check the broker is started and reachable.
    async fn ping(&self) -> Result<(), BrokerError>;
}

/// Build the broker adapter selected in configuration.
///
/// The adapter is returned unstarted.
pub fn create_broker(settings: &BrokerSettings) -> Result<Arc<dyn MessageBroker>, BrokerError> {
    match settings.kind {
        BrokerKind::Redis => {
            info!(url = %settings.url, "Using Redis stream broker");
            Ok(Arc::new(RedisStreamBroker::new(settings)?))
        }
        BrokerKind::Memory => {
            info!("Using in-memory broker");
            Ok(Arc::new(InMemoryBroker::new(settings.channel_capacity)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(BrokerError::Unavailable("down".into()).is_retryable());
        assert!(BrokerError::NotStarted.is_retryable());
        assert!(!BrokerError::DeliveryFailed {
            topic: "t".into(),
            attempts: 3,
            reason: "down".into(),
        }
        .is_retryable());
    }

    #[test]
    fn create_memory_broker() {
        let settings = crate::config::Settings::local().unwrap();
        assert!(create_broker(&settings.broker).is_ok());
    }
}
