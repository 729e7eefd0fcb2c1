//! Application settings and configuration structures.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Placeholder substituted with the room id in [`TopicSettings::room_template`].
pub const ROOM_PLACEHOLDER: &str = "{room}";

/// Root configuration structure containing all application settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Server configuration (host, port)
    pub server: ServerSettings,

    /// Message broker connection
    pub broker: BrokerSettings,

    /// Broker topic names
    pub topics: TopicSettings,

    /// Produce retry policy for broker-backed event handlers
    pub retry: RetrySettings,

    /// Restart backoff for room bridge consumers
    pub bridge: RetrySettings,

    /// CORS configuration
    pub cors: CorsSettings,

    /// Current environment (development, staging, production)
    pub environment: String,
}

/// Server binding configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Host address to bind to (e.g., "0.0.0.0")
    pub host: String,

    /// Port number to listen on
    pub port: u16,
}

/// Which broker adapter to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrokerKind {
    /// Redis streams, shared between server instances
    Redis,
    /// Process-local channels (single instance, tests)
    Memory,
}

/// Message broker configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerSettings {
    /// Adapter selection
    pub kind: BrokerKind,

    /// Redis connection URL
    pub url: String,

    /// Approximate number of entries kept per stream
    pub stream_max_len: usize,

    /// Maximum entries fetched per read
    pub read_count: usize,

    /// Idle delay between stream polls in milliseconds
    pub poll_interval_ms: u64,

    /// Per-topic buffer for the in-memory adapter
    pub channel_capacity: usize,
}

/// Broker topic names.
#[derive(Debug, Clone, Deserialize)]
pub struct TopicSettings {
    /// Topic receiving chat creation events
    pub new_chats: String,

    /// Topic receiving listener registrations
    pub listeners: String,

    /// Per-room topic template; must contain `{room}`
    pub room_template: String,
}

impl TopicSettings {
    /// Topic carrying every room-scoped event for `room`.
    pub fn room_topic(&self, room: &str) -> String {
        self.room_template.replace(ROOM_PLACEHOLDER, room)
    }
}

/// Exponential backoff policy.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySettings {
    /// Attempts before giving up (produce) or raising an alert (consume)
    pub max_attempts: u32,

    /// First delay in milliseconds
    pub initial_delay_ms: u64,

    /// Delay cap in milliseconds
    pub max_delay_ms: u64,

    /// Growth factor between attempts
    pub backoff_multiplier: f64,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CorsSettings {
    /// Allowed origins (comma-separated in env)
    pub allowed_origins: Vec<String>,
}

impl Settings {
    /// Load settings from environment variables and configuration files.
    ///
    /// The loading order is:
    /// 1. config/default.toml (base configuration)
    /// 2. config/{RUN_ENV}.toml (environment-specific overrides)
    /// 3. Environment variables (highest priority)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if configuration cannot be loaded or parsed,
    /// or if the room topic template lacks the `{room}` placeholder.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        // Determine the running environment
        let environment = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".into());

        Self::builder(&environment)?
            // Load from config files
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Load from environment variables
            // APP__SERVER__PORT=3000 -> server.port = 3000
            .add_source(
                Environment::default()
                    .prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            // Map simple environment variables
            .set_override_option("server.host", std::env::var("SERVER_HOST").ok())?
            .set_override_option("server.port", std::env::var("SERVER_PORT").ok())?
            .set_override_option("broker.url", std::env::var("REDIS_URL").ok())?
            .set_override_option("broker.kind", std::env::var("BROKER_KIND").ok())?
            .build()?
            .try_deserialize()
            .and_then(Self::validate)
    }

    /// Settings built from defaults only, with the in-memory broker.
    ///
    /// Used by tests and single-process runs.
    pub fn local() -> Result<Self, ConfigError> {
        Self::builder("test")?
            .set_override("broker.kind", "memory")?
            .build()?
            .try_deserialize()
            .and_then(Self::validate)
    }

    fn builder(
        environment: &str,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Config::builder()
            .set_default("environment", environment)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("broker.kind", "redis")?
            .set_default("broker.url", "redis://127.0.0.1:6379")?
            .set_default("broker.stream_max_len", 10_000_i64)?
            .set_default("broker.read_count", 100_i64)?
            .set_default("broker.poll_interval_ms", 50_i64)?
            .set_default("broker.channel_capacity", 1024_i64)?
            .set_default("topics.new_chats", "new-chats")?
            .set_default("topics.listeners", "chat-listeners")?
            .set_default("topics.room_template", "chat-{room}-events")?
            .set_default("retry.max_attempts", 3)?
            .set_default("retry.initial_delay_ms", 100)?
            .set_default("retry.max_delay_ms", 2000)?
            .set_default("retry.backoff_multiplier", 2.0)?
            .set_default("bridge.max_attempts", 5)?
            .set_default("bridge.initial_delay_ms", 250)?
            .set_default("bridge.max_delay_ms", 30_000)?
            .set_default("bridge.backoff_multiplier", 2.0)?
            .set_default("cors.allowed_origins", vec!["http://localhost:3000"])
    }

    fn validate(settings: Self) -> Result<Self, ConfigError> {
        if !settings.topics.room_template.contains(ROOM_PLACEHOLDER) {
            return Err(ConfigError::Message(format!(
                "topics.room_template must contain {}: {}",
                ROOM_PLACEHOLDER, settings.topics.room_template
            )));
        }
        Ok(settings)
    }

    /// Get the full server address as a string.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_settings_use_memory_broker() {
        let settings = Settings::local().unwrap();
        assert_eq!(settings.broker.kind, BrokerKind::Memory);
        assert_eq!(settings.retry.max_attempts, 3);
        assert_eq!(settings.server_addr(), "0.0.0.0:3000");
    }

    #[test]
    fn room_topic_substitutes_room_id() {
        let settings = Settings::local().unwrap();
        assert_eq!(settings.topics.room_topic("abc"), "chat-abc-events");
    }

    #[test]
    fn template_without_placeholder_is_rejected() {
        let mut settings = Settings::local().unwrap();
        settings.topics.room_template = "chat-events".into();
        assert!(Settings::validate(settings).is_err());
    }
}
