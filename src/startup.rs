//! Application Startup
//!
//! Wires the repository, broker, mediator and fan-out together and serves the
//! router until Ctrl-C.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use tokio::net::TcpListener;
use tower::ServiceBuilder;

use crate::application::commands::{
    AddListenerHandler, CreateChatHandler, CreateMessageHandler, DeleteChatHandler,
};
use crate::application::events::{register_publishers, EventPublisher};
use crate::application::queries::{
    GetAllChatsHandler, GetChatDetailHandler, GetChatListenersHandler, GetChatRoomHandler,
    GetMessagesHandler,
};
use crate::application::Mediator;
use crate::config::Settings;
use crate::domain::{ChatRepository, MessageRepository};
use crate::infrastructure::broker::{self, MessageBroker, RetryPolicy};
use crate::infrastructure::repositories::InMemoryChatStore;
use crate::presentation::http::handlers::health;
use crate::presentation::http::routes;
use crate::presentation::middleware::{cors, logging};
use crate::presentation::websocket::{BridgeConsumer, ConnectionRegistry};
use crate::shared::error::AppError;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub mediator: Arc<Mediator>,
    pub bridge: Arc<BridgeConsumer>,
    pub registry: Arc<ConnectionRegistry>,
    pub broker: Arc<dyn MessageBroker>,
    pub settings: Arc<Settings>,
}

impl AppState {
    /// Assemble the state around an existing broker.
    ///
    /// The broker is not started here.
    pub fn new(settings: Settings, broker: Arc<dyn MessageBroker>) -> Result<Self, AppError> {
        let store = Arc::new(InMemoryChatStore::new());
        let publisher = Arc::new(EventPublisher::new(
            broker.clone(),
            settings.topics.clone(),
            RetryPolicy::from(&settings.retry),
        ));
        let mediator = build_mediator(store.clone(), store, publisher)?;

        let registry = Arc::new(ConnectionRegistry::new());
        let bridge = Arc::new(BridgeConsumer::new(
            broker.clone(),
            registry.clone(),
            settings.topics.clone(),
            RetryPolicy::from(&settings.bridge),
        ));

        Ok(Self {
            mediator: Arc::new(mediator),
            bridge,
            registry,
            broker,
            settings: Arc::new(settings),
        })
    }
}

/// Register every command, query and event handler.
///
/// # Errors
///
/// Fails on a duplicate registration or when a command or query kind is left
/// without a handler.
pub fn build_mediator(
    chats: Arc<dyn ChatRepository>,
    messages: Arc<dyn MessageRepository>,
    publisher: Arc<EventPublisher>,
) -> Result<Mediator, AppError> {
    let mut mediator = Mediator::new();

    mediator.register_command_handler(Arc::new(CreateChatHandler::new(chats.clone())))?;
    mediator.register_command_handler(Arc::new(CreateMessageHandler::new(
        chats.clone(),
        messages.clone(),
    )))?;
    mediator.register_command_handler(Arc::new(AddListenerHandler::new(chats.clone())))?;
    mediator.register_command_handler(Arc::new(DeleteChatHandler::new(chats.clone())))?;

    mediator.register_query_handler(Arc::new(GetChatDetailHandler::new(chats.clone())))?;
    mediator.register_query_handler(Arc::new(GetChatRoomHandler::new(chats.clone())))?;
    mediator.register_query_handler(Arc::new(GetMessagesHandler::new(messages)))?;
    mediator.register_query_handler(Arc::new(GetAllChatsHandler::new(chats.clone())))?;
    mediator.register_query_handler(Arc::new(GetChatListenersHandler::new(chats)))?;

    register_publishers(&mut mediator, publisher);

    mediator.ensure_complete()?;
    Ok(mediator)
}

/// Router with tracing and CORS applied
pub fn build_router(state: AppState) -> Router {
    let cors = cors::create_cors_layer(&state.settings.cors);
    routes::create_router(state).layer(
        ServiceBuilder::new()
            .layer(logging::create_trace_layer())
            .layer(cors),
    )
}

/// Application instance
pub struct Application {
    listener: TcpListener,
    router: Router,
    state: AppState,
}

impl Application {
    /// Build the application from settings and start the broker
    pub async fn build(settings: Settings) -> Result<Self> {
        health::init_server_start();

        let broker = broker::create_broker(&settings.broker)?;
        broker.start().await?;
        tracing::info!(kind = ?settings.broker.kind, "Message broker started");

        let addr = settings.server_addr();
        let state = AppState::new(settings, broker)?;
        let router = build_router(state.clone());

        let listener = TcpListener::bind(&addr).await?;
        tracing::info!("Listening on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            router,
            state,
        })
    }

    /// Run the server until Ctrl-C, then stop every bridge loop and the broker
    pub async fn run_until_stopped(self) -> Result<()> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Shutting down");
        self.state.bridge.shutdown().await;
        if let Err(e) = self.state.broker.stop().await {
            tracing::warn!(error = %e, "Broker stop failed");
        }
        Ok(())
    }

    /// Get the bound address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
