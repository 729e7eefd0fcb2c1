//! Broker backed by Redis streams.
//!
//! Each topic is a stream. Producers `XADD` entries carrying two fields,
//! `key` and `value`; consumers poll `XREAD` from the stream tail observed at
//! subscription time, so a subscriber only sees records produced after it
//! subscribed.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::RwLock;
use redis::aio::{ConnectionManager, MultiplexedConnection};
use redis::streams::{
    StreamId, StreamMaxlen, StreamRangeReply, StreamReadOptions, StreamReadReply,
};
use redis::{AsyncCommands, Client};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use super::{BrokerError, BrokerRecord, MessageBroker, RecordStream};
use crate::config::BrokerSettings;

const KEY_FIELD: &str = "key";
const VALUE_FIELD: &str = "value";
/// Stream id preceding every real entry.
const STREAM_ORIGIN: &str = "0-0";

/// Redis streams adapter.
pub struct RedisStreamBroker {
    client: Client,
    stream_max_len: usize,
    read_count: usize,
    poll_interval: Duration,
    /// Shared producer connection, present while started
    producer: RwLock<Option<ConnectionManager>>,
    /// `true` while stopped; consumers watch it to end their streams
    stopped: watch::Sender<bool>,
}

impl RedisStreamBroker {
    /// Create an unstarted adapter. Fails only on a malformed URL.
    pub fn new(settings: &BrokerSettings) -> Result<Self, BrokerError> {
        let client = Client::open(settings.url.as_str())?;
        let (stopped, _) = watch::channel(true);

        Ok(Self {
            client,
            stream_max_len: settings.stream_max_len,
            read_count: settings.read_count.max(1),
            poll_interval: Duration::from_millis(settings.poll_interval_ms.max(1)),
            producer: RwLock::new(None),
            stopped,
        })
    }

    fn producer(&self) -> Result<ConnectionManager, BrokerError> {
        self.producer.read().clone().ok_or(BrokerError::NotStarted)
    }
}

#[async_trait]
impl MessageBroker for RedisStreamBroker {
    #[instrument(skip(self))]
    async fn start(&self) -> Result<(), BrokerError> {
        if self.producer.read().is_some() {
            debug!("Redis stream broker already started");
            return Ok(());
        }

        info!("Connecting to Redis...");
        let manager = ConnectionManager::new(self.client.clone()).await?;
        *self.producer.write() = Some(manager);
        self.stopped.send_replace(false);
        info!("Redis stream broker started");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn stop(&self) -> Result<(), BrokerError> {
        if self.producer.write().take().is_none() {
            return Err(BrokerError::NotStarted);
        }
        self.stopped.send_replace(true);
        info!("Redis stream broker stopped");
        Ok(())
    }

    async fn produce(&self, topic: &str, key: &str, value: &[u8]) -> Result<(), BrokerError> {
        let mut conn = self.producer()?;
        let _: String = conn
            .xadd_maxlen(
                topic,
                StreamMaxlen::Approx(self.stream_max_len),
                "*",
                &[(KEY_FIELD, key.as_bytes()), (VALUE_FIELD, value)],
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn consume(&self, topic: &str) -> Result<RecordStream, BrokerError> {
        let stopped = self.stopped.subscribe();
        if *stopped.borrow() {
            return Err(BrokerError::NotStarted);
        }

        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let tail: StreamRangeReply = conn.xrevrange_count(topic, "+", "-", 1).await?;
        let last_id = tail
            .ids
            .first()
            .map(|entry| entry.id.clone())
            .unwrap_or_else(|| STREAM_ORIGIN.to_owned());
        debug!(topic, last_id = %last_id, "Subscribed to stream");

        let cursor = StreamCursor {
            conn,
            buffer: ReadBuffer::new(topic, last_id),
            read_count: self.read_count,
            poll_interval: self.poll_interval,
            stopped,
            failed: false,
        };

        let stream = futures::stream::unfold(cursor, |mut cursor| async move {
            cursor.next_record().await.map(|item| (item, cursor))
        });
        Ok(stream.boxed())
    }

    async fn ping(&self) -> Result<(), BrokerError> {
        let mut conn = self.producer()?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

/// Read position of one subscription.
struct StreamCursor {
    conn: MultiplexedConnection,
    buffer: ReadBuffer,
    read_count: usize,
    poll_interval: Duration,
    stopped: watch::Receiver<bool>,
    failed: bool,
}

impl StreamCursor {
    /// Next record, `None` once the broker stops or after a read error.
    async fn next_record(&mut self) -> Option<Result<BrokerRecord, BrokerError>> {
        loop {
            if self.failed {
                return None;
            }
            if let Some(record) = self.buffer.records.pop_front() {
                return Some(Ok(record));
            }
            if *self.stopped.borrow() {
                return None;
            }

            let options = StreamReadOptions::default().count(self.read_count);
            let reply: Result<Option<StreamReadReply>, redis::RedisError> = self
                .conn
                .xread_options(
                    &[self.buffer.topic.as_str()],
                    &[self.buffer.last_id.as_str()],
                    &options,
                )
                .await;

            match reply {
                Ok(Some(reply)) => self.buffer.absorb(reply),
                Ok(None) => {}
                Err(err) => {
                    self.failed = true;
                    return Some(Err(err.into()));
                }
            }

            if self.buffer.records.is_empty() {
                let poll_interval = self.poll_interval;
                tokio::select! {
                    changed = self.stopped.changed() => {
                        if changed.is_err() {
                            return None;
                        }
                    }
                    _ = tokio::time::sleep(poll_interval) => {}
                }
            }
        }
    }

}

/// Records read but not yet yielded, plus the id to resume `XREAD` from.
struct ReadBuffer {
    topic: String,
    last_id: String,
    records: VecDeque<BrokerRecord>,
}

impl ReadBuffer {
    fn new(topic: &str, last_id: String) -> Self {
        Self {
            topic: topic.to_owned(),
            last_id,
            records: VecDeque::new(),
        }
    }

    /// Queue every decodable entry. The cursor moves past malformed ones too.
    fn absorb(&mut self, reply: StreamReadReply) {
        for stream in reply.keys {
            for entry in stream.ids {
                self.last_id = entry.id.clone();
                match decode_entry(&entry) {
                    Some(record) => self.records.push_back(record),
                    None => warn!(topic = %self.topic, id = %entry.id, "Skipping malformed stream entry"),
                }
            }
        }
    }
}

fn decode_entry(entry: &StreamId) -> Option<BrokerRecord> {
    let payload: Vec<u8> = entry.get(VALUE_FIELD)?;
    let key: String = entry.get(KEY_FIELD).unwrap_or_default();
    Some(BrokerRecord { key, payload })
}
