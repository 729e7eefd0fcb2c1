//! Queries and their handlers.

use std::sync::Arc;

use async_trait::async_trait;

use super::mediator::{Query, QueryHandler, QueryKind};
use crate::domain::{Chat, ChatListener, ChatRepository, Message, MessageRepository, Pagination};
use crate::shared::error::AppError;
use crate::shared::validation::parse_oid;

/// One window of a collection plus the collection's total size.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub count: u64,
}

/// Load one chat with its messages and listeners.
#[derive(Debug, Clone)]
pub struct GetChatDetail {
    pub chat_oid: String,
}

impl Query for GetChatDetail {
    const KIND: QueryKind = QueryKind::GetChatDetail;
    type Output = Chat;
}

/// Resolve the broadcast room of an existing chat without loading it.
#[derive(Debug, Clone)]
pub struct GetChatRoom {
    pub chat_oid: String,
}

impl Query for GetChatRoom {
    const KIND: QueryKind = QueryKind::GetChatRoom;
    type Output = String;
}

/// Messages of a chat in posting order.
#[derive(Debug, Clone)]
pub struct GetMessages {
    pub chat_oid: String,
    pub pagination: Pagination,
}

impl Query for GetMessages {
    const KIND: QueryKind = QueryKind::GetMessages;
    type Output = Page<Message>;
}

/// All chats in creation order.
#[derive(Debug, Clone, Default)]
pub struct GetAllChats {
    pub pagination: Pagination,
}

impl Query for GetAllChats {
    const KIND: QueryKind = QueryKind::GetAllChats;
    type Output = Page<Chat>;
}

/// External listeners registered on a chat.
#[derive(Debug, Clone)]
pub struct GetChatListeners {
    pub chat_oid: String,
}

impl Query for GetChatListeners {
    const KIND: QueryKind = QueryKind::GetChatListeners;
    type Output = Vec<ChatListener>;
}

pub struct GetChatDetailHandler {
    chats: Arc<dyn ChatRepository>,
}

impl GetChatDetailHandler {
    pub fn new(chats: Arc<dyn ChatRepository>) -> Self {
        Self { chats }
    }
}

#[async_trait]
impl QueryHandler for GetChatDetailHandler {
    type Query = GetChatDetail;

    async fn handle(&self, query: GetChatDetail) -> Result<Chat, AppError> {
        self.chats.get_by_id(parse_oid(&query.chat_oid)?).await
    }
}

pub struct GetChatRoomHandler {
    chats: Arc<dyn ChatRepository>,
}

impl GetChatRoomHandler {
    pub fn new(chats: Arc<dyn ChatRepository>) -> Self {
        Self { chats }
    }
}

#[async_trait]
impl QueryHandler for GetChatRoomHandler {
    type Query = GetChatRoom;

    async fn handle(&self, query: GetChatRoom) -> Result<String, AppError> {
        let oid = parse_oid(&query.chat_oid)?;
        if !self.chats.exists_by_id(oid).await? {
            return Err(AppError::NotFound(format!("Chat {} not found", oid)));
        }
        Ok(oid.to_string())
    }
}

pub struct GetMessagesHandler {
    messages: Arc<dyn MessageRepository>,
}

impl GetMessagesHandler {
    pub fn new(messages: Arc<dyn MessageRepository>) -> Self {
        Self { messages }
    }
}

#[async_trait]
impl QueryHandler for GetMessagesHandler {
    type Query = GetMessages;

    async fn handle(&self, query: GetMessages) -> Result<Page<Message>, AppError> {
        let chat_oid = parse_oid(&query.chat_oid)?;
        let (items, count) = self.messages.list(chat_oid, &query.pagination).await?;
        Ok(Page { items, count })
    }
}

pub struct GetAllChatsHandler {
    chats: Arc<dyn ChatRepository>,
}

impl GetAllChatsHandler {
    pub fn new(chats: Arc<dyn ChatRepository>) -> Self {
        Self { chats }
    }
}

#[async_trait]
impl QueryHandler for GetAllChatsHandler {
    type Query = GetAllChats;

    async fn handle(&self, query: GetAllChats) -> Result<Page<Chat>, AppError> {
        let (items, count) = self.chats.list(&query.pagination).await?;
        Ok(Page { items, count })
    }
}

pub struct GetChatListenersHandler {
    chats: Arc<dyn ChatRepository>,
}

impl GetChatListenersHandler {
    pub fn new(chats: Arc<dyn ChatRepository>) -> Self {
        Self { chats }
    }
}

#[async_trait]
impl QueryHandler for GetChatListenersHandler {
    type Query = GetChatListeners;

    async fn handle(&self, query: GetChatListeners) -> Result<Vec<ChatListener>, AppError> {
        let chat = self.chats.get_by_id(parse_oid(&query.chat_oid)?).await?;
        Ok(chat.listeners)
    }
}
