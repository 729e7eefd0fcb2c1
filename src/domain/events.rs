//! Domain events and the per-aggregate event buffer.
//!
//! Aggregates record events while they mutate; the mediator pulls them once
//! the command handler returns and dispatches them to the registered event
//! handlers. Events are never stored or replayed.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Stable type tag used to key event handler registrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    NewChatCreated,
    NewMessageReceived,
    ChatDeleted,
    ListenerAdded,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewChatCreated => "new_chat_created",
            Self::NewMessageReceived => "new_message_received",
            Self::ChatDeleted => "chat_deleted",
            Self::ListenerAdded => "listener_added",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewChatCreatedEvent {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub chat_oid: String,
    pub chat_title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewMessageReceivedEvent {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub message_text: String,
    pub message_oid: String,
    pub chat_oid: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatDeletedEvent {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub chat_oid: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListenerAddedEvent {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub chat_oid: String,
    pub listener_oid: String,
}

/// Every fact an aggregate can record.
///
/// Serializes as the flat field set of the inner event, so broker payloads
/// look like `{"event_id": ..., "chat_oid": ..., ...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DomainEvent {
    NewChatCreated(NewChatCreatedEvent),
    NewMessageReceived(NewMessageReceivedEvent),
    ChatDeleted(ChatDeletedEvent),
    ListenerAdded(ListenerAddedEvent),
}

impl DomainEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::NewChatCreated(_) => EventKind::NewChatCreated,
            Self::NewMessageReceived(_) => EventKind::NewMessageReceived,
            Self::ChatDeleted(_) => EventKind::ChatDeleted,
            Self::ListenerAdded(_) => EventKind::ListenerAdded,
        }
    }

    /// Human-readable title carried in broker payloads.
    pub fn title(&self) -> &'static str {
        match self {
            Self::NewChatCreated(_) => "New chat created",
            Self::NewMessageReceived(_) => "New message received",
            Self::ChatDeleted(_) => "Chat has been deleted",
            Self::ListenerAdded(_) => "Listener added",
        }
    }

    pub fn event_id(&self) -> Uuid {
        match self {
            Self::NewChatCreated(e) => e.event_id,
            Self::NewMessageReceived(e) => e.event_id,
            Self::ChatDeleted(e) => e.event_id,
            Self::ListenerAdded(e) => e.event_id,
        }
    }

    /// Chat the event belongs to. Every current event is chat-scoped.
    pub fn chat_oid(&self) -> &str {
        match self {
            Self::NewChatCreated(e) => &e.chat_oid,
            Self::NewMessageReceived(e) => &e.chat_oid,
            Self::ChatDeleted(e) => &e.chat_oid,
            Self::ListenerAdded(e) => &e.chat_oid,
        }
    }
}

/// Ordered, append-only buffer of events not yet dispatched.
///
/// Cloning yields an empty buffer: pending events belong to the instance
/// that recorded them and can only be released through [`EventBuffer::drain`].
#[derive(Debug, Default)]
pub struct EventBuffer {
    pending: Vec<DomainEvent>,
}

impl EventBuffer {
    pub fn record(&mut self, event: DomainEvent) {
        self.pending.push(event);
    }

    /// Take every pending event, leaving the buffer empty.
    pub fn drain(&mut self) -> Vec<DomainEvent> {
        std::mem::take(&mut self.pending)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Clone for EventBuffer {
    fn clone(&self) -> Self {
        Self::default()
    }
}

/// Anything a command handler returns that may carry recorded events.
pub trait AggregateRoot {
    /// Return and clear the pending events.
    fn pull_events(&mut self) -> Vec<DomainEvent>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat_deleted() -> DomainEvent {
        DomainEvent::ChatDeleted(ChatDeletedEvent {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            chat_oid: "chat-1".into(),
            title: "General".into(),
        })
    }

    #[test]
    fn drain_returns_events_in_order_and_empties_buffer() {
        let mut buffer = EventBuffer::default();
        let first = chat_deleted();
        let second = chat_deleted();
        buffer.record(first.clone());
        buffer.record(second.clone());

        assert_eq!(buffer.drain(), vec![first, second]);
        assert!(buffer.is_empty());
        assert!(buffer.drain().is_empty());
    }

    #[test]
    fn clone_does_not_carry_pending_events() {
        let mut buffer = EventBuffer::default();
        buffer.record(chat_deleted());

        let copy = buffer.clone();

        assert!(copy.is_empty());
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn untagged_serialization_is_flat() {
        let value = serde_json::to_value(chat_deleted()).unwrap();
        assert_eq!(value["chat_oid"], "chat-1");
        assert_eq!(value["title"], "General");
        assert!(value.get("ChatDeleted").is_none());
    }
}
