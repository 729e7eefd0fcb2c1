//! Repository Implementations
//!
//! Implementations of the domain repository traits.
//!
//! ## Available Repositories
//!
//! - **InMemoryChatStore** - Chats, their messages and listeners, kept in process
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use chat_relay::infrastructure::repositories::InMemoryChatStore;
//!
//! let store = Arc::new(InMemoryChatStore::new());
//! let chats: Arc<dyn ChatRepository> = store.clone();
//! let messages: Arc<dyn MessageRepository> = store;
//! ```

pub mod in_memory;

pub use in_memory::InMemoryChatStore;
