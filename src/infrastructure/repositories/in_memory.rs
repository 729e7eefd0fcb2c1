//! In-Memory Chat Store
//!
//! Process-local implementation of the chat and message repositories.
//! Chats are kept with their messages and listeners under one lock, so
//! title uniqueness and message ordering hold under concurrent requests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::domain::{
    Chat, ChatListener, ChatRepository, Message, MessageRepository, Pagination, Text, Title,
};
use crate::shared::error::AppError;

/// Stored form of a chat.
#[derive(Debug, Clone)]
struct ChatRow {
    /// Insertion order, used for listing
    seq: u64,
    oid: Uuid,
    title: Title,
    created_at: DateTime<Utc>,
    messages: Vec<MessageRow>,
    listeners: Vec<ChatListener>,
}

impl ChatRow {
    fn from_chat(seq: u64, chat: &Chat) -> Self {
        Self {
            seq,
            oid: chat.oid,
            title: chat.title.clone(),
            created_at: chat.created_at,
            messages: chat.messages.iter().map(MessageRow::from_message).collect(),
            listeners: chat.listeners.clone(),
        }
    }

    fn into_chat(self) -> Chat {
        let messages = self
            .messages
            .into_iter()
            .map(|row| row.into_message(self.oid))
            .collect();
        Chat::restore(self.oid, self.title, self.created_at, messages, self.listeners)
    }
}

/// Stored form of a message.
#[derive(Debug, Clone)]
struct MessageRow {
    oid: Uuid,
    text: Text,
    created_at: DateTime<Utc>,
}

impl MessageRow {
    fn from_message(message: &Message) -> Self {
        Self {
            oid: message.oid,
            text: message.text.clone(),
            created_at: message.created_at,
        }
    }

    fn into_message(self, chat_oid: Uuid) -> Message {
        Message::restore(self.oid, chat_oid, self.text, self.created_at)
    }
}

/// In-memory chat and message store.
#[derive(Default)]
pub struct InMemoryChatStore {
    chats: RwLock<HashMap<Uuid, ChatRow>>,
    next_seq: AtomicU64,
}

impl InMemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored chats.
    pub fn len(&self) -> usize {
        self.chats.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.chats.read().is_empty()
    }
}

fn chat_not_found(oid: Uuid) -> AppError {
    AppError::NotFound(format!("Chat {} not found", oid))
}

#[async_trait]
impl ChatRepository for InMemoryChatStore {
    async fn exists_by_title(&self, title: &str) -> Result<bool, AppError> {
        Ok(self
            .chats
            .read()
            .values()
            .any(|row| row.title.as_str() == title))
    }

    async fn exists_by_id(&self, oid: Uuid) -> Result<bool, AppError> {
        Ok(self.chats.read().contains_key(&oid))
    }

    async fn get_by_id(&self, oid: Uuid) -> Result<Chat, AppError> {
        self.chats
            .read()
            .get(&oid)
            .cloned()
            .map(ChatRow::into_chat)
            .ok_or_else(|| chat_not_found(oid))
    }

    async fn add(&self, chat: &Chat) -> Result<(), AppError> {
        let mut chats = self.chats.write();
        if chats.values().any(|row| row.title == chat.title) {
            return Err(AppError::Conflict(format!(
                "Chat with title '{}' already exists",
                chat.title
            )));
        }
        if chats.contains_key(&chat.oid) {
            return Err(AppError::Conflict(format!("Chat {} already exists", chat.oid)));
        }
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        chats.insert(chat.oid, ChatRow::from_chat(seq, chat));
        Ok(())
    }

    async fn list(&self, pagination: &Pagination) -> Result<(Vec<Chat>, u64), AppError> {
        let mut rows: Vec<ChatRow> = self.chats.read().values().cloned().collect();
        rows.sort_by_key(|row| row.seq);

        let count = rows.len() as u64;
        let chats = pagination
            .apply(&rows)
            .into_iter()
            .map(ChatRow::into_chat)
            .collect();
        Ok((chats, count))
    }

    async fn delete(&self, oid: Uuid) -> Result<(), AppError> {
        self.chats
            .write()
            .remove(&oid)
            .map(|_| ())
            .ok_or_else(|| chat_not_found(oid))
    }

    async fn add_listener(&self, chat_oid: Uuid, listener: &ChatListener) -> Result<(), AppError> {
        let mut chats = self.chats.write();
        let row = chats.get_mut(&chat_oid).ok_or_else(|| chat_not_found(chat_oid))?;
        if row.listeners.contains(listener) {
            return Err(AppError::Conflict(format!(
                "Listener {} already registered",
                listener.oid
            )));
        }
        row.listeners.push(listener.clone());
        Ok(())
    }
}

#[async_trait]
impl MessageRepository for InMemoryChatStore {
    async fn add(&self, message: &Message) -> Result<(), AppError> {
        let mut chats = self.chats.write();
        let row = chats
            .get_mut(&message.chat_oid)
            .ok_or_else(|| chat_not_found(message.chat_oid))?;
        row.messages.push(MessageRow::from_message(message));
        Ok(())
    }

    async fn list(
        &self,
        chat_oid: Uuid,
        pagination: &Pagination,
    ) -> Result<(Vec<Message>, u64), AppError> {
        let chats = self.chats.read();
        let row = chats.get(&chat_oid).ok_or_else(|| chat_not_found(chat_oid))?;

        let count = row.messages.len() as u64;
        let messages = pagination
            .apply(&row.messages)
            .into_iter()
            .map(|message| message.into_message(chat_oid))
            .collect();
        Ok((messages, count))
    }
}
