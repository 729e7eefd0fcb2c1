//! Domain rule violations.

/// Errors raised by value objects and aggregates.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    #[error("Empty text")]
    EmptyText,

    #[error("Text too long: \"{0}...\"")]
    TextTooLong(String),

    #[error("This listener already listens: {0}")]
    ListenerAlreadyExists(String),
}
