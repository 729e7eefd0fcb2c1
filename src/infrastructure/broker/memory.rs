//! In-process broker backed by tokio broadcast channels.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use super::{BrokerError, BrokerRecord, MessageBroker, RecordStream};

/// Broker that fans records out to subscribers of the same process.
///
/// Every `consume` call gets its own receiver, so two subscribers of one
/// topic both see every record produced after they subscribed. Records
/// produced while nobody listens are dropped, but always kept in the
/// produced log for inspection.
pub struct InMemoryBroker {
    capacity: usize,
    /// `None` while stopped
    topics: RwLock<Option<HashMap<String, broadcast::Sender<BrokerRecord>>>>,
    produced: Mutex<Vec<(String, BrokerRecord)>>,
}

impl InMemoryBroker {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            topics: RwLock::new(None),
            produced: Mutex::new(Vec::new()),
        }
    }

    /// Every record accepted by `produce`, with its topic.
    pub fn produced(&self) -> Vec<(String, BrokerRecord)> {
        self.produced.lock().clone()
    }

    /// Records accepted for `topic`.
    pub fn produced_to(&self, topic: &str) -> Vec<BrokerRecord> {
        self.produced
            .lock()
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, record)| record.clone())
            .collect()
    }

    /// Number of open record streams on `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .read()
            .as_ref()
            .and_then(|topics| topics.get(topic))
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }

    pub fn is_started(&self) -> bool {
        self.topics.read().is_some()
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl MessageBroker for InMemoryBroker {
    async fn start(&self) -> Result<(), BrokerError> {
        let mut topics = self.topics.write();
        if topics.is_none() {
            *topics = Some(HashMap::new());
            debug!("In-memory broker started");
        }
        Ok(())
    }

    async fn stop(&self) -> Result<(), BrokerError> {
        // Dropping the senders closes every receiver, ending open streams.
        match self.topics.write().take() {
            Some(_) => {
                debug!("In-memory broker stopped");
                Ok(())
            }
            None => Err(BrokerError::NotStarted),
        }
    }

    async fn produce(&self, topic: &str, key: &str, value: &[u8]) -> Result<(), BrokerError> {
        let record = BrokerRecord::new(key, value);
        {
            let guard = self.topics.read();
            let topics = guard.as_ref().ok_or(BrokerError::NotStarted)?;
            if let Some(sender) = topics.get(topic) {
                // Err only means there is no live receiver right now.
                let _ = sender.send(record.clone());
            }
        }
        self.produced.lock().push((topic.to_owned(), record));
        Ok(())
    }

    async fn consume(&self, topic: &str) -> Result<RecordStream, BrokerError> {
        let receiver = {
            let mut guard = self.topics.write();
            let topics = guard.as_mut().ok_or(BrokerError::NotStarted)?;
            topics
                .entry(topic.to_owned())
                .or_insert_with(|| broadcast::channel(self.capacity).0)
                .subscribe()
        };

        let topic = topic.to_owned();
        let stream = futures::stream::unfold(receiver, move |mut receiver| {
            let topic = topic.clone();
            async move {
                loop {
                    match receiver.recv().await {
                        Ok(record) => return Some((Ok(record), receiver)),
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(topic = %topic, skipped, "Subscriber lagged, records skipped");
                        }
                        Err(RecvError::Closed) => return None,
                    }
                }
            }
        });

        Ok(stream.boxed())
    }

    async fn ping(&self) -> Result<(), BrokerError> {
        if self.is_started() {
            Ok(())
        } else {
            Err(BrokerError::NotStarted)
        }
    }
}
