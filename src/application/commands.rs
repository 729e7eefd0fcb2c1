//! Commands and their handlers.
//!
//! Each handler validates its input, loads or creates the aggregate, lets the
//! aggregate record its events and persists the change. Event dispatch is
//! left to the mediator.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::mediator::{Command, CommandHandler, CommandKind};
use crate::domain::{
    Chat, ChatListener, ChatRepository, Message, MessageRepository, Text, Title,
};
use crate::shared::error::AppError;
use crate::shared::validation::parse_oid;

/// Create a chat with a unique title.
#[derive(Debug, Clone)]
pub struct CreateChat {
    pub title: String,
}

impl Command for CreateChat {
    const KIND: CommandKind = CommandKind::CreateChat;
    type Output = Chat;
}

/// Post a message into an existing chat.
#[derive(Debug, Clone)]
pub struct CreateMessage {
    pub chat_oid: String,
    pub text: String,
}

impl Command for CreateMessage {
    const KIND: CommandKind = CommandKind::CreateMessage;
    type Output = Message;
}

/// Register an external listener (a bot conversation) on a chat.
#[derive(Debug, Clone)]
pub struct AddListener {
    pub chat_oid: String,
    pub telegram_chat_id: String,
}

impl Command for AddListener {
    const KIND: CommandKind = CommandKind::AddListener;
    type Output = Chat;
}

/// Delete a chat and its messages.
#[derive(Debug, Clone)]
pub struct DeleteChat {
    pub chat_oid: String,
}

impl Command for DeleteChat {
    const KIND: CommandKind = CommandKind::DeleteChat;
    type Output = Chat;
}

pub struct CreateChatHandler {
    chats: Arc<dyn ChatRepository>,
}

impl CreateChatHandler {
    pub fn new(chats: Arc<dyn ChatRepository>) -> Self {
        Self { chats }
    }
}

#[async_trait]
impl CommandHandler for CreateChatHandler {
    type Command = CreateChat;

    #[instrument(skip_all, fields(title = %command.title))]
    async fn handle(&self, command: CreateChat) -> Result<Chat, AppError> {
        let title = Title::new(command.title)?;

        if self.chats.exists_by_title(title.as_str()).await? {
            return Err(AppError::Conflict(format!(
                "Chat with title '{}' already exists",
                title
            )));
        }

        let chat = Chat::create(title);
        self.chats.add(&chat).await?;
        debug!(chat_oid = %chat.oid, "Chat created");
        Ok(chat)
    }
}

pub struct CreateMessageHandler {
    chats: Arc<dyn ChatRepository>,
    messages: Arc<dyn MessageRepository>,
}

impl CreateMessageHandler {
    pub fn new(chats: Arc<dyn ChatRepository>, messages: Arc<dyn MessageRepository>) -> Self {
        Self { chats, messages }
    }
}

#[async_trait]
impl CommandHandler for CreateMessageHandler {
    type Command = CreateMessage;

    #[instrument(skip_all, fields(chat_oid = %command.chat_oid))]
    async fn handle(&self, command: CreateMessage) -> Result<Message, AppError> {
        let chat_oid = parse_oid(&command.chat_oid)?;
        let chat = self.chats.get_by_id(chat_oid).await?;
        let text = Text::new(command.text)?;

        let message = Message::create(chat.oid, text);
        self.messages.add(&message).await?;
        debug!(message_oid = %message.oid, "Message stored");
        Ok(message)
    }
}

pub struct AddListenerHandler {
    chats: Arc<dyn ChatRepository>,
}

impl AddListenerHandler {
    pub fn new(chats: Arc<dyn ChatRepository>) -> Self {
        Self { chats }
    }
}

#[async_trait]
impl CommandHandler for AddListenerHandler {
    type Command = AddListener;

    #[instrument(skip_all, fields(chat_oid = %command.chat_oid))]
    async fn handle(&self, command: AddListener) -> Result<Chat, AppError> {
        let chat_oid = parse_oid(&command.chat_oid)?;
        let listener_oid = command.telegram_chat_id.trim();
        if listener_oid.is_empty() {
            return Err(AppError::Validation("Listener id must not be empty".into()));
        }

        let mut chat = self.chats.get_by_id(chat_oid).await?;
        let listener = ChatListener::new(listener_oid);
        chat.add_listener(listener.clone())?;
        self.chats.add_listener(chat.oid, &listener).await?;
        Ok(chat)
    }
}

pub struct DeleteChatHandler {
    chats: Arc<dyn ChatRepository>,
}

impl DeleteChatHandler {
    pub fn new(chats: Arc<dyn ChatRepository>) -> Self {
        Self { chats }
    }
}

#[async_trait]
impl CommandHandler for DeleteChatHandler {
    type Command = DeleteChat;

    #[instrument(skip_all, fields(chat_oid = %command.chat_oid))]
    async fn handle(&self, command: DeleteChat) -> Result<Chat, AppError> {
        let chat_oid = parse_oid(&command.chat_oid)?;
        let mut chat = self.chats.get_by_id(chat_oid).await?;

        chat.delete();
        self.chats.delete(chat.oid).await?;
        debug!("Chat deleted");
        Ok(chat)
    }
}
