//! Exponential backoff for broker operations.

use std::time::Duration;

use tracing::warn;

use super::{BrokerError, MessageBroker};
use crate::config::RetrySettings;

/// Exponential backoff policy.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl RetryPolicy {
    /// Delay to wait after the failed attempt number `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let delay_ms = (self.initial_delay_ms as f64 * self.backoff_multiplier.powi(exponent))
            .min(self.max_delay_ms as f64) as u64;
        Duration::from_millis(delay_ms)
    }

    /// Delay once backoff has reached its cap.
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 100,
            max_delay_ms: 2000,
            backoff_multiplier: 2.0,
        }
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            initial_delay_ms: settings.initial_delay_ms,
            max_delay_ms: settings.max_delay_ms,
            backoff_multiplier: settings.backoff_multiplier,
        }
    }
}

/// Produce a record, retrying retryable failures with backoff.
///
/// Non-retryable errors are returned at once. When every attempt fails the
/// result is `BrokerError::DeliveryFailed` carrying the last cause.
pub async fn produce_with_retry(
    broker: &dyn MessageBroker,
    policy: &RetryPolicy,
    topic: &str,
    key: &str,
    value: &[u8],
) -> Result<(), BrokerError> {
    let attempts = policy.max_attempts.max(1);
    let mut last_error = None;

    for attempt in 0..attempts {
        match broker.produce(topic, key, value).await {
            Ok(()) => return Ok(()),
            Err(err) if err.is_retryable() => {
                warn!(topic, attempt = attempt + 1, error = %err, "Produce attempt failed");
                last_error = Some(err);
                if attempt + 1 < attempts {
                    tokio::time::sleep(policy.delay_for(attempt)).await;
                }
            }
            Err(err) => return Err(err),
        }
    }

    Err(BrokerError::DeliveryFailed {
        topic: topic.to_owned(),
        attempts,
        reason: last_error.map(|err| err.to_string()).unwrap_or_default(),
    })
}
