//! Application Layer
//!
//! Commands, queries and event handlers routed through the mediator, plus
//! the data transfer objects (DTOs) used by the presentation layer.

pub mod commands;
pub mod dto;
pub mod events;
pub mod mediator;
pub mod queries;

pub use mediator::{
    Command, CommandHandler, CommandKind, DispatchReport, EventHandler, HandlerFailure, Mediator,
    Query, QueryHandler, QueryKind,
};
