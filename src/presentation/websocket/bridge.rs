//! Bridge Consumer
//!
//! Relays broker records of a room's topic into the connection registry.
//!
//! One consumption loop runs per room with at least one local connection.
//! It starts with the first connection and is told to stop, through a
//! `watch` channel, when the last one leaves. Records are broadcast in the
//! order the broker delivers them.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Instrument};

use super::registry::{ConnectionHandle, ConnectionId, ConnectionRegistry, JoinOutcome, RegistryError};
use crate::config::TopicSettings;
use crate::infrastructure::broker::{
    BrokerError, BrokerRecord, MessageBroker, RecordStream, RetryPolicy,
};
use crate::infrastructure::metrics;

struct RoomLoop {
    stop: watch::Sender<bool>,
    subscribed: watch::Receiver<bool>,
    task: JoinHandle<()>,
}

/// Starts and stops per-room consumption loops as connections come and go.
pub struct BridgeConsumer {
    broker: Arc<dyn MessageBroker>,
    registry: Arc<ConnectionRegistry>,
    topics: TopicSettings,
    backoff: RetryPolicy,
    loops: DashMap<String, RoomLoop>,
}

impl BridgeConsumer {
    pub fn new(
        broker: Arc<dyn MessageBroker>,
        registry: Arc<ConnectionRegistry>,
        topics: TopicSettings,
        backoff: RetryPolicy,
    ) -> Self {
        Self {
            broker,
            registry,
            topics,
            backoff,
            loops: DashMap::new(),
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Join a connection to a room, starting the room's loop if needed.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(
        &self,
        room: &str,
        connection: ConnectionHandle,
    ) -> Result<JoinOutcome, RegistryError> {
        // The loop entry lock serializes lifecycle changes of one room.
        let outcome = match self.loops.entry(room.to_owned()) {
            Entry::Occupied(mut entry) => {
                let outcome = self.registry.join(room, connection)?;
                if entry.get().task.is_finished() {
                    entry.insert(self.spawn_loop(room));
                }
                outcome
            }
            Entry::Vacant(slot) => {
                let outcome = self.registry.join(room, connection)?;
                slot.insert(self.spawn_loop(room));
                outcome
            }
        };

        metrics::set_room_bridges(self.loops.len());
        Ok(outcome)
    }

    /// Remove a connection from a room, stopping the loop if it was the last.
    pub fn disconnect(&self, room: &str, connection_id: ConnectionId) {
        if let Entry::Occupied(entry) = self.loops.entry(room.to_owned()) {
            self.registry.leave(room, connection_id);
            if self.registry.member_count(room) == 0 {
                let (_, room_loop) = entry.remove_entry();
                room_loop.stop.send_replace(true);
                debug!(room, "Last connection left, stopping bridge");
            }
        } else {
            self.registry.leave(room, connection_id);
        }

        metrics::set_room_bridges(self.loops.len());
    }

    pub fn is_running(&self, room: &str) -> bool {
        self.loops
            .get(room)
            .map(|room_loop| !room_loop.task.is_finished())
            .unwrap_or(false)
    }

    pub fn active_rooms(&self) -> usize {
        self.loops.len()
    }

    /// Wait until the room's loop holds a broker subscription.
    ///
    /// Returns `false` if the room has no loop or it stopped first.
    pub async fn wait_subscribed(&self, room: &str) -> bool {
        let Some(mut subscribed) = self
            .loops
            .get(room)
            .map(|room_loop| room_loop.subscribed.clone())
        else {
            return false;
        };
        let ready = subscribed.wait_for(|ready| *ready).await.is_ok();
        ready
    }

    /// Stop every loop and wait for them to finish.
    pub async fn shutdown(&self) {
        let rooms: Vec<String> = self.loops.iter().map(|entry| entry.key().clone()).collect();
        let mut tasks = Vec::with_capacity(rooms.len());
        for room in rooms {
            if let Some((_, room_loop)) = self.loops.remove(&room) {
                room_loop.stop.send_replace(true);
                tasks.push(room_loop.task);
            }
        }

        let count = tasks.len();
        for task in tasks {
            let _ = task.await;
        }
        metrics::set_room_bridges(0);
        info!(stopped = count, "Bridge consumers stopped");
    }

    fn spawn_loop(&self, room: &str) -> RoomLoop {
        let (stop, stop_rx) = watch::channel(false);
        let (subscribed_tx, subscribed) = watch::channel(false);
        let room_loop = RoomRelay {
            broker: self.broker.clone(),
            registry: self.registry.clone(),
            room: room.to_owned(),
            topic: self.topics.room_topic(room),
            backoff: self.backoff.clone(),
            stop: stop_rx,
            subscribed: subscribed_tx,
        };
        let span = tracing::info_span!("bridge", room = %room);
        let task = tokio::spawn(room_loop.run().instrument(span));
        debug!(room, "Bridge started");

        RoomLoop {
            stop,
            subscribed,
            task,
        }
    }
}

/// State owned by one room's consumption task.
struct RoomRelay {
    broker: Arc<dyn MessageBroker>,
    registry: Arc<ConnectionRegistry>,
    room: String,
    topic: String,
    backoff: RetryPolicy,
    stop: watch::Receiver<bool>,
    subscribed: watch::Sender<bool>,
}

enum StreamEnd {
    Stopped,
    Failed(BrokerError),
    Closed,
}

impl RoomRelay {
    async fn run(mut self) {
        let mut failures: u32 = 0;

        loop {
            if *self.stop.borrow() {
                break;
            }

            let consumed = tokio::select! {
                _ = self.stop.changed() => break,
                consumed = self.broker.consume(&self.topic) => consumed,
            };

            match consumed {
                Ok(records) => {
                    self.subscribed.send_replace(true);
                    match self.relay(records, &mut failures).await {
                        StreamEnd::Stopped => break,
                        StreamEnd::Failed(e) => {
                            warn!(topic = %self.topic, error = %e, "Broker stream failed")
                        }
                        StreamEnd::Closed => debug!(topic = %self.topic, "Broker stream ended"),
                    }
                    self.subscribed.send_replace(false);
                }
                Err(e) => warn!(topic = %self.topic, error = %e, "Broker subscription failed"),
            }

            failures = failures.saturating_add(1);
            if failures == self.backoff.max_attempts {
                let lost = BrokerError::ConsumerLost {
                    topic: self.topic.clone(),
                    attempts: failures,
                };
                error!(error = %lost, "Bridge consumer lost, retrying at capped backoff");
                metrics::record_consumer_lost();
            }
            let delay = if failures >= self.backoff.max_attempts {
                self.backoff.max_delay()
            } else {
                self.backoff.delay_for(failures - 1)
            };

            tokio::select! {
                _ = self.stop.changed() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        debug!(room = %self.room, "Bridge loop finished");
    }

    async fn relay(&mut self, mut records: RecordStream, failures: &mut u32) -> StreamEnd {
        loop {
            tokio::select! {
                _ = self.stop.changed() => return StreamEnd::Stopped,
                next = records.next() => match next {
                    Some(Ok(record)) => {
                        *failures = 0;
                        self.forward(record);
                    }
                    Some(Err(e)) => return StreamEnd::Failed(e),
                    None => return StreamEnd::Closed,
                },
            }
        }
    }

    fn forward(&self, record: BrokerRecord) {
        match String::from_utf8(record.payload) {
            Ok(text) => {
                self.registry.broadcast(&self.room, Arc::from(text));
            }
            Err(_) => warn!(topic = %self.topic, key = %record.key, "Skipping non UTF-8 record"),
        }
    }
}
