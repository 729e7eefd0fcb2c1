//! Broker-backed event handlers.
//!
//! Each handler turns one kind of domain event into a broker record:
//!
//! | Event              | Topic                  | Key      |
//! |--------------------|------------------------|----------|
//! | NewMessageReceived | room topic of the chat | chat oid |
//! | ChatDeleted        | room topic of the chat | chat oid |
//! | NewChatCreated     | `new_chats`            | event id |
//! | ListenerAdded      | `listeners`            | chat oid |
//!
//! Payloads are JSON objects: `event_title` followed by the event fields.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, error};

use super::mediator::{EventHandler, Mediator};
use crate::config::TopicSettings;
use crate::domain::{DomainEvent, EventKind};
use crate::infrastructure::broker::{produce_with_retry, BrokerError, MessageBroker, RetryPolicy};
use crate::infrastructure::metrics;
use crate::shared::error::AppError;

#[derive(Serialize)]
struct EventEnvelope<'a> {
    event_title: &'static str,
    #[serde(flatten)]
    event: &'a DomainEvent,
}

/// Serialize an event into its broker payload.
pub fn encode_event(event: &DomainEvent) -> Result<Vec<u8>, AppError> {
    let envelope = EventEnvelope {
        event_title: event.title(),
        event,
    };
    Ok(serde_json::to_vec(&envelope)?)
}

/// Produces encoded events with the configured retry policy.
pub struct EventPublisher {
    broker: Arc<dyn MessageBroker>,
    topics: TopicSettings,
    retry: RetryPolicy,
}

impl EventPublisher {
    pub fn new(broker: Arc<dyn MessageBroker>, topics: TopicSettings, retry: RetryPolicy) -> Self {
        Self {
            broker,
            topics,
            retry,
        }
    }

    pub fn topics(&self) -> &TopicSettings {
        &self.topics
    }

    async fn publish(&self, event: &DomainEvent, topic: &str, key: &str) -> Result<(), AppError> {
        let payload = encode_event(event).inspect_err(|e| {
            error!(event = %event.kind(), error = %e, "Dropping event that failed to serialize");
        })?;

        let result =
            produce_with_retry(self.broker.as_ref(), &self.retry, topic, key, &payload).await;
        metrics::record_produce(event.kind().as_str(), result.is_ok());

        match result {
            Ok(()) => {
                debug!(topic, key, event = %event.kind(), "Event published");
                Ok(())
            }
            Err(e) => {
                if let BrokerError::DeliveryFailed { attempts, .. } = &e {
                    error!(topic, key, attempts, event = %event.kind(), "Event delivery failed");
                }
                Err(e.into())
            }
        }
    }
}

/// Publishes new messages to the chat's room topic.
pub struct NewMessageReceivedHandler {
    publisher: Arc<EventPublisher>,
}

impl NewMessageReceivedHandler {
    pub fn new(publisher: Arc<EventPublisher>) -> Self {
        Self { publisher }
    }
}

#[async_trait]
impl EventHandler for NewMessageReceivedHandler {
    fn name(&self) -> &'static str {
        "publish_new_message"
    }

    async fn handle(&self, event: &DomainEvent) -> Result<(), AppError> {
        let DomainEvent::NewMessageReceived(inner) = event else {
            return Ok(());
        };
        let topic = self.publisher.topics().room_topic(&inner.chat_oid);
        self.publisher.publish(event, &topic, &inner.chat_oid).await
    }
}

/// Publishes chat deletion to the chat's room topic so live members hear it.
pub struct ChatDeletedHandler {
    publisher: Arc<EventPublisher>,
}

impl ChatDeletedHandler {
    pub fn new(publisher: Arc<EventPublisher>) -> Self {
        Self { publisher }
    }
}

#[async_trait]
impl EventHandler for ChatDeletedHandler {
    fn name(&self) -> &'static str {
        "publish_chat_deleted"
    }

    async fn handle(&self, event: &DomainEvent) -> Result<(), AppError> {
        let DomainEvent::ChatDeleted(inner) = event else {
            return Ok(());
        };
        let topic = self.publisher.topics().room_topic(&inner.chat_oid);
        self.publisher.publish(event, &topic, &inner.chat_oid).await
    }
}

/// Publishes chat creation to the `new_chats` topic.
pub struct NewChatCreatedHandler {
    publisher: Arc<EventPublisher>,
}

impl NewChatCreatedHandler {
    pub fn new(publisher: Arc<EventPublisher>) -> Self {
        Self { publisher }
    }
}

#[async_trait]
impl EventHandler for NewChatCreatedHandler {
    fn name(&self) -> &'static str {
        "publish_new_chat"
    }

    async fn handle(&self, event: &DomainEvent) -> Result<(), AppError> {
        let DomainEvent::NewChatCreated(inner) = event else {
            return Ok(());
        };
        let key = inner.event_id.to_string();
        let topic = self.publisher.topics().new_chats.clone();
        self.publisher.publish(event, &topic, &key).await
    }
}

/// Publishes listener registrations to the `listeners` topic.
pub struct ListenerAddedHandler {
    publisher: Arc<EventPublisher>,
}

impl ListenerAddedHandler {
    pub fn new(publisher: Arc<EventPublisher>) -> Self {
        Self { publisher }
    }
}

#[async_trait]
impl EventHandler for ListenerAddedHandler {
    fn name(&self) -> &'static str {
        "publish_listener_added"
    }

    async fn handle(&self, event: &DomainEvent) -> Result<(), AppError> {
        let DomainEvent::ListenerAdded(inner) = event else {
            return Ok(());
        };
        let topic = self.publisher.topics().listeners.clone();
        self.publisher.publish(event, &topic, &inner.chat_oid).await
    }
}

/// Register one publishing handler per event kind.
pub fn register_publishers(mediator: &mut Mediator, publisher: Arc<EventPublisher>) {
    mediator.register_event_handler(
        EventKind::NewMessageReceived,
        Arc::new(NewMessageReceivedHandler::new(publisher.clone())),
    );
    mediator.register_event_handler(
        EventKind::ChatDeleted,
        Arc::new(ChatDeletedHandler::new(publisher.clone())),
    );
    mediator.register_event_handler(
        EventKind::NewChatCreated,
        Arc::new(NewChatCreatedHandler::new(publisher.clone())),
    );
    mediator.register_event_handler(
        EventKind::ListenerAdded,
        Arc::new(ListenerAddedHandler::new(publisher)),
    );
}
