//! # Chat Relay Library
//!
//! This crate provides an event-driven chat backend with:
//! - A mediator routing commands, queries and domain events
//! - Event handlers that publish domain events to a message broker
//! - Redis streams (or an in-process broker) for cross-instance delivery
//! - WebSocket rooms fed from the broker, one bridge loop per watched room
//!
//! ## Architecture
//!
//! The crate follows Clean Architecture principles:
//!
//! - **Domain Layer**: Aggregates, events, value objects and repository traits
//! - **Application Layer**: Mediator, commands, queries, event publishers and DTOs
//! - **Infrastructure Layer**: Broker adapters, repositories and metrics
//! - **Presentation Layer**: HTTP routes and WebSocket room fan-out
//!
//! ## Module Structure
//!
//! ```text
//! chat_relay/
//! +-- config/         Configuration management
//! +-- domain/         Aggregates, events and value objects
//! +-- application/    Mediator, handlers and DTOs
//! +-- infrastructure/ Broker, repositories and metrics
//! +-- presentation/   HTTP routes and WebSocket rooms
//! +-- shared/         Common utilities (errors, validation)
//! ```

// Configuration module
pub mod config;

// Domain layer - Core business logic
pub mod domain;

// Application layer - Mediator and handlers
pub mod application;

// Infrastructure layer - External implementations
pub mod infrastructure;

// Presentation layer - HTTP and WebSocket handlers
pub mod presentation;

// Shared utilities
pub mod shared;

// Application startup and state management
pub mod startup;

// Telemetry and observability
pub mod telemetry;
