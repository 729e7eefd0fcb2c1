//! Mediator
//!
//! In-process command bus, query bus and event bus.
//!
//! Handlers are keyed by closed kind enums: every command type names its
//! [`CommandKind`], every query its [`QueryKind`], and domain events carry
//! their [`EventKind`]. Commands and queries map to exactly one handler,
//! events to any number of handlers run in registration order.
//!
//! The registries are filled once at start-up (`&mut self`) and only read
//! afterwards, so a built `Mediator` is shared behind an `Arc` without locks.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut mediator = Mediator::new();
//! mediator.register_command_handler(Arc::new(CreateChatHandler::new(chats)))?;
//! mediator.register_event_handler(EventKind::NewChatCreated, Arc::new(NewChatCreatedHandler::new(publisher)));
//!
//! let chat = mediator.handle_command(CreateChat { title: "General".into() }).await?;
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use crate::domain::{AggregateRoot, DomainEvent, EventKind};
use crate::infrastructure::metrics;
use crate::shared::error::AppError;

/// Every command the mediator routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    CreateChat,
    CreateMessage,
    AddListener,
    DeleteChat,
}

impl CommandKind {
    pub const ALL: [CommandKind; 4] = [
        CommandKind::CreateChat,
        CommandKind::CreateMessage,
        CommandKind::AddListener,
        CommandKind::DeleteChat,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::CreateChat => "create_chat",
            CommandKind::CreateMessage => "create_message",
            CommandKind::AddListener => "add_listener",
            CommandKind::DeleteChat => "delete_chat",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every query the mediator routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    GetChatDetail,
    GetChatRoom,
    GetMessages,
    GetAllChats,
    GetChatListeners,
}

impl QueryKind {
    pub const ALL: [QueryKind; 5] = [
        QueryKind::GetChatDetail,
        QueryKind::GetChatRoom,
        QueryKind::GetMessages,
        QueryKind::GetAllChats,
        QueryKind::GetChatListeners,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::GetChatDetail => "get_chat_detail",
            QueryKind::GetChatRoom => "get_chat_room",
            QueryKind::GetMessages => "get_messages",
            QueryKind::GetAllChats => "get_all_chats",
            QueryKind::GetChatListeners => "get_chat_listeners",
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A requested state change.
///
/// The output is an aggregate: once the handler returns, the mediator drains
/// its pending events and dispatches them.
pub trait Command: Send + Sync + 'static {
    const KIND: CommandKind;
    type Output: AggregateRoot + Send + 'static;
}

/// A read request. No event side effects.
pub trait Query: Send + Sync + 'static {
    const KIND: QueryKind;
    type Output: Send + 'static;
}

#[async_trait]
pub trait CommandHandler: Send + Sync {
    type Command: Command;

    async fn handle(
        &self,
        command: Self::Command,
    ) -> Result<<Self::Command as Command>::Output, AppError>;
}

#[async_trait]
pub trait QueryHandler: Send + Sync {
    type Query: Query;

    async fn handle(&self, query: Self::Query) -> Result<<Self::Query as Query>::Output, AppError>;
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Stable name used in logs and metrics.
    fn name(&self) -> &'static str;

    async fn handle(&self, event: &DomainEvent) -> Result<(), AppError>;
}

/// A handler failure recorded during event dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerFailure {
    pub handler: &'static str,
    pub error: String,
}

/// Outcome of dispatching one event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchReport {
    /// Handlers that completed successfully
    pub handled: usize,
    pub failures: Vec<HandlerFailure>,
}

impl DispatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

type CommandHandlerRef<C> = Arc<dyn CommandHandler<Command = C>>;
type QueryHandlerRef<Q> = Arc<dyn QueryHandler<Query = Q>>;

/// Command, query and event router.
#[derive(Default)]
pub struct Mediator {
    // Values are `CommandHandlerRef<C>` / `QueryHandlerRef<Q>` for the type
    // whose KIND is the key.
    command_handlers: HashMap<CommandKind, Box<dyn Any + Send + Sync>>,
    query_handlers: HashMap<QueryKind, Box<dyn Any + Send + Sync>>,
    event_handlers: HashMap<EventKind, Vec<Arc<dyn EventHandler>>>,
}

impl Mediator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the single handler of a command type.
    ///
    /// # Errors
    ///
    /// `AppError::DuplicateRegistration` if the command already has a handler.
    pub fn register_command_handler<H>(&mut self, handler: Arc<H>) -> Result<(), AppError>
    where
        H: CommandHandler + 'static,
    {
        let kind = <H::Command as Command>::KIND;
        if self.command_handlers.contains_key(&kind) {
            return Err(AppError::DuplicateRegistration(kind.as_str()));
        }
        let handler: CommandHandlerRef<H::Command> = handler;
        self.command_handlers.insert(kind, Box::new(handler));
        debug!(command = %kind, "Command handler registered");
        Ok(())
    }

    /// Register the single handler of a query type.
    ///
    /// # Errors
    ///
    /// `AppError::DuplicateRegistration` if the query already has a handler.
    pub fn register_query_handler<H>(&mut self, handler: Arc<H>) -> Result<(), AppError>
    where
        H: QueryHandler + 'static,
    {
        let kind = <H::Query as Query>::KIND;
        if self.query_handlers.contains_key(&kind) {
            return Err(AppError::DuplicateRegistration(kind.as_str()));
        }
        let handler: QueryHandlerRef<H::Query> = handler;
        self.query_handlers.insert(kind, Box::new(handler));
        debug!(query = %kind, "Query handler registered");
        Ok(())
    }

    /// Append a handler for an event kind.
    pub fn register_event_handler(&mut self, kind: EventKind, handler: Arc<dyn EventHandler>) {
        debug!(event = %kind, handler = handler.name(), "Event handler registered");
        self.event_handlers.entry(kind).or_default().push(handler);
    }

    /// Fail with `HandlerNotRegistered` for the first command or query kind
    /// without a handler.
    pub fn ensure_complete(&self) -> Result<(), AppError> {
        if let Some(kind) = CommandKind::ALL
            .iter()
            .find(|kind| !self.command_handlers.contains_key(kind))
        {
            return Err(AppError::HandlerNotRegistered(kind.as_str()));
        }
        if let Some(kind) = QueryKind::ALL
            .iter()
            .find(|kind| !self.query_handlers.contains_key(kind))
        {
            return Err(AppError::HandlerNotRegistered(kind.as_str()));
        }
        Ok(())
    }

    pub fn event_handler_count(&self, kind: EventKind) -> usize {
        self.event_handlers.get(&kind).map(Vec::len).unwrap_or(0)
    }

    /// Run a command, then dispatch the events recorded on its result.
    ///
    /// Returns only after every event has been dispatched. Event handler
    /// failures are logged and never turn a successful command into an error.
    #[instrument(skip_all, fields(command = %C::KIND))]
    pub async fn handle_command<C: Command>(&self, command: C) -> Result<C::Output, AppError> {
        let handler = self
            .command_handlers
            .get(&C::KIND)
            .and_then(|entry| entry.downcast_ref::<CommandHandlerRef<C>>())
            .cloned()
            .ok_or(AppError::HandlerNotRegistered(C::KIND.as_str()))?;

        let result = handler.handle(command).await;
        metrics::record_command(C::KIND.as_str(), result.is_ok());
        let mut output = result?;

        for event in output.pull_events() {
            self.handle_event(&event).await;
        }

        Ok(output)
    }

    #[instrument(skip_all, fields(query = %Q::KIND))]
    pub async fn handle_query<Q: Query>(&self, query: Q) -> Result<Q::Output, AppError> {
        let handler = self
            .query_handlers
            .get(&Q::KIND)
            .and_then(|entry| entry.downcast_ref::<QueryHandlerRef<Q>>())
            .cloned()
            .ok_or(AppError::HandlerNotRegistered(Q::KIND.as_str()))?;

        handler.handle(query).await
    }

    /// Run every handler registered for the event's kind, in order.
    ///
    /// A failing handler does not stop the ones after it.
    #[instrument(skip_all, fields(event = %event.kind(), event_id = %event.event_id()))]
    pub async fn handle_event(&self, event: &DomainEvent) -> DispatchReport {
        let mut report = DispatchReport::default();
        let Some(handlers) = self.event_handlers.get(&event.kind()) else {
            debug!("No handlers registered");
            return report;
        };

        for handler in handlers {
            match handler.handle(event).await {
                Ok(()) => report.handled += 1,
                Err(e) => {
                    warn!(handler = handler.name(), error = %e, "Event handler failed");
                    report.failures.push(HandlerFailure {
                        handler: handler.name(),
                        error: e.to_string(),
                    });
                }
            }
        }

        let failed: Vec<&str> = report.failures.iter().map(|f| f.handler).collect();
        metrics::record_event_dispatch(event.kind().as_str(), &failed);
        report
    }
}
