//! Response DTOs
//!
//! Data structures for API response bodies.

use serde::Serialize;

use crate::application::queries::Page;
use crate::domain::{Chat, ChatListener, Message, Pagination};

/// Chat response
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub oid: String,
    pub title: String,
    pub created_at: String,
}

impl From<&Chat> for ChatResponse {
    fn from(chat: &Chat) -> Self {
        Self {
            oid: chat.oid.to_string(),
            title: chat.title.to_string(),
            created_at: chat.created_at.to_rfc3339(),
        }
    }
}

/// Chat with its messages and listeners
#[derive(Debug, Serialize)]
pub struct ChatDetailResponse {
    #[serde(flatten)]
    pub chat: ChatResponse,
    pub messages: Vec<MessageResponse>,
    pub listeners: Vec<ListenerResponse>,
}

impl From<&Chat> for ChatDetailResponse {
    fn from(chat: &Chat) -> Self {
        Self {
            chat: ChatResponse::from(chat),
            messages: chat.messages.iter().map(MessageResponse::from).collect(),
            listeners: chat.listeners.iter().map(ListenerResponse::from).collect(),
        }
    }
}

/// Message response
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub oid: String,
    pub chat_oid: String,
    pub text: String,
    pub created_at: String,
}

impl From<&Message> for MessageResponse {
    fn from(message: &Message) -> Self {
        Self {
            oid: message.oid.to_string(),
            chat_oid: message.chat_oid.to_string(),
            text: message.text.to_string(),
            created_at: message.created_at.to_rfc3339(),
        }
    }
}

/// Listener response
#[derive(Debug, Serialize)]
pub struct ListenerResponse {
    pub oid: String,
}

impl From<&ChatListener> for ListenerResponse {
    fn from(listener: &ChatListener) -> Self {
        Self {
            oid: listener.oid.clone(),
        }
    }
}

/// Paginated collection
#[derive(Debug, Serialize)]
pub struct PageResponse<T> {
    pub count: u64,
    pub limit: u32,
    pub offset: u32,
    pub items: Vec<T>,
}

impl<T> PageResponse<T> {
    pub fn from_page<S>(page: &Page<S>, pagination: Pagination) -> Self
    where
        for<'a> T: From<&'a S>,
    {
        Self {
            count: page.count,
            limit: pagination.limit,
            offset: pagination.offset,
            items: page.items.iter().map(T::from).collect(),
        }
    }
}
