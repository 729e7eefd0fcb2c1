//! Chat aggregate, listener entity and repository trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::message::Message;
use crate::domain::error::DomainError;
use crate::domain::events::{
    AggregateRoot, ChatDeletedEvent, DomainEvent, EventBuffer, ListenerAddedEvent,
    NewChatCreatedEvent,
};
use crate::domain::value_objects::{Pagination, Title};
use crate::shared::error::AppError;

/// External subscriber of a chat (for example a bot conversation id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ChatListener {
    pub oid: String,
}

impl ChatListener {
    pub fn new(oid: impl Into<String>) -> Self {
        Self { oid: oid.into() }
    }
}

/// A chat room.
///
/// The chat oid doubles as the room identifier for live connections and as
/// the broker key for every room-scoped event.
#[derive(Debug, Clone)]
pub struct Chat {
    /// Chat identifier
    pub oid: Uuid,

    /// Unique title
    pub title: Title,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Messages loaded with the aggregate (empty for a fresh chat)
    pub messages: Vec<Message>,

    /// Registered external listeners
    pub listeners: Vec<ChatListener>,

    is_deleted: bool,
    events: EventBuffer,
}

impl Chat {
    /// Create a new chat, recording `NewChatCreated`.
    pub fn create(title: Title) -> Self {
        let mut chat = Self::restore(Uuid::new_v4(), title, Utc::now(), Vec::new(), Vec::new());
        chat.events
            .record(DomainEvent::NewChatCreated(NewChatCreatedEvent {
                event_id: Uuid::new_v4(),
                occurred_at: Utc::now(),
                chat_oid: chat.oid.to_string(),
                chat_title: chat.title.as_str().to_owned(),
            }));
        chat
    }

    /// Rebuild a stored chat. Records nothing.
    pub fn restore(
        oid: Uuid,
        title: Title,
        created_at: DateTime<Utc>,
        messages: Vec<Message>,
        listeners: Vec<ChatListener>,
    ) -> Self {
        Self {
            oid,
            title,
            created_at,
            messages,
            listeners,
            is_deleted: false,
            events: EventBuffer::default(),
        }
    }

    /// Room identifier used by the connection registry and broker topics.
    pub fn room(&self) -> String {
        self.oid.to_string()
    }

    pub fn add_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Register an external listener, recording `ListenerAdded`.
    pub fn add_listener(&mut self, listener: ChatListener) -> Result<(), DomainError> {
        if self.listeners.contains(&listener) {
            return Err(DomainError::ListenerAlreadyExists(listener.oid));
        }
        self.events
            .record(DomainEvent::ListenerAdded(ListenerAddedEvent {
                event_id: Uuid::new_v4(),
                occurred_at: Utc::now(),
                chat_oid: self.oid.to_string(),
                listener_oid: listener.oid.clone(),
            }));
        self.listeners.push(listener);
        Ok(())
    }

    /// Mark the chat deleted, recording `ChatDeleted` once.
    pub fn delete(&mut self) {
        if self.is_deleted {
            return;
        }
        self.is_deleted = true;
        self.events.record(DomainEvent::ChatDeleted(ChatDeletedEvent {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            chat_oid: self.oid.to_string(),
            title: self.title.as_str().to_owned(),
        }));
    }

    pub fn is_deleted(&self) -> bool {
        self.is_deleted
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }
}

impl AggregateRoot for Chat {
    fn pull_events(&mut self) -> Vec<DomainEvent> {
        self.events.drain()
    }
}

/// Repository trait for chat storage.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatRepository: Send + Sync {
    /// Whether a live chat already uses this title.
    async fn exists_by_title(&self, title: &str) -> Result<bool, AppError>;

    /// Whether a chat with this id exists, without loading it.
    async fn exists_by_id(&self, oid: Uuid) -> Result<bool, AppError>;

    /// Load a chat with its messages and listeners.
    ///
    /// Fails with `AppError::NotFound` when the chat does not exist.
    async fn get_by_id(&self, oid: Uuid) -> Result<Chat, AppError>;

    /// Store a new chat. Fails with `AppError::Conflict` if the title is taken.
    async fn add(&self, chat: &Chat) -> Result<(), AppError>;

    /// Chats ordered by creation time, windowed, plus the total count.
    async fn list(&self, pagination: &Pagination) -> Result<(Vec<Chat>, u64), AppError>;

    /// Remove a chat and its messages.
    async fn delete(&self, oid: Uuid) -> Result<(), AppError>;

    /// Persist a listener on an existing chat.
    async fn add_listener(&self, chat_oid: Uuid, listener: &ChatListener) -> Result<(), AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::Text;

    fn chat() -> Chat {
        Chat::create(Title::new("title").unwrap())
    }

    #[test]
    fn create_chat_success() {
        let mut chat = chat();

        assert_eq!(chat.title.as_str(), "title");
        assert!(chat.messages.is_empty());
        assert_eq!(chat.created_at.date_naive(), Utc::now().date_naive());

        let events = chat.pull_events();
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], DomainEvent::NewChatCreated(e) if e.chat_title == "title"));
    }

    #[test]
    fn pull_events_twice_second_is_empty() {
        let mut chat = chat();
        assert!(!chat.pull_events().is_empty());
        assert!(chat.pull_events().is_empty());
    }

    #[test]
    fn add_message_attaches_to_chat() {
        let mut chat = chat();
        let message = Message::create(chat.oid, Text::new("hello world").unwrap());
        let message_oid = message.oid;

        chat.add_message(message);

        assert!(chat.messages.iter().any(|m| m.oid == message_oid));
    }

    #[test]
    fn add_listener_rejects_duplicate() {
        let mut chat = chat();
        chat.pull_events();

        chat.add_listener(ChatListener::new("bot-1")).unwrap();
        let err = chat.add_listener(ChatListener::new("bot-1")).unwrap_err();

        assert_eq!(err, DomainError::ListenerAlreadyExists("bot-1".into()));
        assert_eq!(chat.listeners.len(), 1);
        assert_eq!(chat.pull_events().len(), 1);
    }

    #[test]
    fn delete_records_event_once() {
        let mut chat = chat();
        chat.pull_events();

        chat.delete();
        chat.delete();

        assert!(chat.is_deleted());
        let events = chat.pull_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].chat_oid(), chat.oid.to_string());
    }

    #[test]
    fn clone_leaves_events_with_original() {
        let chat = chat();
        let mut copy = chat.clone();
        assert!(copy.pull_events().is_empty());
        assert_eq!(chat.pending_events(), 1);
    }
}
