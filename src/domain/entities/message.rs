//! Message aggregate and repository trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::events::{AggregateRoot, DomainEvent, EventBuffer, NewMessageReceivedEvent};
use crate::domain::value_objects::{Pagination, Text};
use crate::shared::error::AppError;

/// A message posted into a chat.
#[derive(Debug, Clone)]
pub struct Message {
    /// Message identifier
    pub oid: Uuid,

    /// Chat the message belongs to
    pub chat_oid: Uuid,

    /// Validated body
    pub text: Text,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    events: EventBuffer,
}

impl Message {
    /// Post a new message into `chat_oid`, recording `NewMessageReceived`.
    pub fn create(chat_oid: Uuid, text: Text) -> Self {
        let mut message = Self::restore(Uuid::new_v4(), chat_oid, text, Utc::now());
        message
            .events
            .record(DomainEvent::NewMessageReceived(NewMessageReceivedEvent {
                event_id: Uuid::new_v4(),
                occurred_at: Utc::now(),
                message_text: message.text.as_str().to_owned(),
                message_oid: message.oid.to_string(),
                chat_oid: chat_oid.to_string(),
            }));
        message
    }

    /// Rebuild a stored message. Records nothing.
    pub fn restore(oid: Uuid, chat_oid: Uuid, text: Text, created_at: DateTime<Utc>) -> Self {
        Self {
            oid,
            chat_oid,
            text,
            created_at,
            events: EventBuffer::default(),
        }
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }
}

impl AggregateRoot for Message {
    fn pull_events(&mut self) -> Vec<DomainEvent> {
        self.events.drain()
    }
}

/// Repository trait for message storage.
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Append a message to its chat.
    async fn add(&self, message: &Message) -> Result<(), AppError>;

    /// Messages of a chat in posting order, windowed, plus the total count.
    async fn list(
        &self,
        chat_oid: Uuid,
        pagination: &Pagination,
    ) -> Result<(Vec<Message>, u64), AppError>;
}
