//! # Domain Layer
//!
//! The domain layer contains the core business logic of the chat backend.
//! It is independent of the mediator, the broker and the transport.
//!
//! ## Structure
//!
//! - **entities**: Aggregates (Chat, Message) and repository traits
//! - **events**: Domain events and the per-aggregate event buffer
//! - **value_objects**: Validated value types (Title, Text, Pagination)
//! - **error**: Domain rule violations

pub mod entities;
pub mod error;
pub mod events;
pub mod value_objects;

// Re-export commonly used types
pub use entities::*;
pub use error::DomainError;
pub use events::{AggregateRoot, DomainEvent, EventKind};
pub use value_objects::*;
