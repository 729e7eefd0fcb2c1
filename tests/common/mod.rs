//! Common Test Utilities
//!
//! Shared helpers, fixtures, and test infrastructure.

use std::sync::Arc;
use std::time::Duration;

use axum_test::TestServer;
use fake::faker::company::en::Buzzword;
use fake::Fake;
use serde_json::{json, Value};
use tokio::sync::mpsc::UnboundedReceiver;

use chat_relay::application::commands::CreateChat;
use chat_relay::config::Settings;
use chat_relay::domain::Chat;
use chat_relay::infrastructure::broker::{InMemoryBroker, MessageBroker};
use chat_relay::startup::{build_router, AppState};

/// How long a test waits for a relayed payload
pub const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// Application wired to an in-process broker
pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    pub broker: Arc<InMemoryBroker>,
}

impl TestApp {
    /// App with its own, already started broker
    pub async fn spawn() -> Self {
        let broker = Arc::new(InMemoryBroker::default());
        broker.start().await.unwrap();
        Self::with_broker(broker)
    }

    /// App sharing `broker` with other instances, as replicas share Redis
    pub fn with_broker(broker: Arc<InMemoryBroker>) -> Self {
        let settings = Settings::local().unwrap();
        let state = AppState::new(settings, broker.clone()).unwrap();
        let server = TestServer::new(build_router(state.clone())).unwrap();

        Self {
            server,
            state,
            broker,
        }
    }

    /// Create a chat over HTTP and return the response body
    pub async fn post_chat(&self, title: &str) -> Value {
        let response = self.server.post("/chats").json(&json!({ "title": title })).await;
        response.assert_status(axum::http::StatusCode::CREATED);
        response.json::<Value>()
    }

    /// Create a chat through the mediator
    pub async fn create_chat(&self) -> Chat {
        self.state
            .mediator
            .handle_command(CreateChat {
                title: unique_title(),
            })
            .await
            .unwrap()
    }
}

/// Random title that does not collide with other tests
pub fn unique_title() -> String {
    let word: String = Buzzword().fake();
    format!("{} {}", word, &uuid::Uuid::new_v4().simple().to_string()[..8])
}

/// Next relayed payload, or `None` on timeout or closed channel
pub async fn recv_payload(rx: &mut UnboundedReceiver<Arc<str>>) -> Option<Value> {
    let payload = tokio::time::timeout(RECV_TIMEOUT, rx.recv()).await.ok()??;
    serde_json::from_str(&payload).ok()
}

/// `true` if nothing arrives within a short grace period
pub async fn stays_silent(rx: &mut UnboundedReceiver<Arc<str>>) -> bool {
    tokio::time::timeout(Duration::from_millis(100), rx.recv())
        .await
        .is_err()
}
