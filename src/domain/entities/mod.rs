//! # Domain Entities
//!
//! Aggregates of the chat backend and the repository traits used to
//! persist them.
//!
//! ## Aggregates
//!
//! - **Chat**: A chat room with its title, messages and external listeners
//! - **Message**: A text message posted into a chat
//!
//! Aggregates record domain events while they mutate; see
//! [`crate::domain::events`]. Repository traits are implemented in the
//! infrastructure layer, following the dependency inversion principle.

mod chat;
mod message;

pub use chat::{Chat, ChatListener, ChatRepository};
pub use message::{Message, MessageRepository};

#[cfg(test)]
pub use chat::MockChatRepository;
