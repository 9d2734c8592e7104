//! Outbound adapters: the durable key/flat-map store and broadcast sinks.
//!
//! The dispatcher never calls these directly. It posts to the outbox and
//! the [`OutboxWriter`](crate::processors::OutboxWriter) drives the
//! adapters with a per-call timeout.

mod channel;
mod memory;
mod postgres;
mod webhook;

pub use channel::ChannelBroadcaster;
pub use memory::InMemoryStore;
pub use postgres::PgStore;
pub use webhook::WebhookBroadcaster;

use std::sync::Arc;
use std::time::Duration;

use ascep_sdk::objects::{StreamMessage, Topic};
use async_trait::async_trait;
use futures_util::future::join_all;
use thiserror::Error;
use tracing::warn;

use crate::entities::FlatRecord;

/// Deadline applied to an outbound call that does not bring its own.
pub const DEFAULT_SINK_TIMEOUT: Duration = Duration::from_millis(250);

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),

    /// Non-2xx response from a webhook target.
    #[error("webhook delivery failed with status {status}: {body}")]
    DeliveryFailed { status: u16, body: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },
}

/// Key to flat string map store with per-key expiry.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Merge `fields` into the record at `key`, creating it if needed.
    async fn upsert(&self, key: &str, fields: FlatRecord) -> Result<(), SinkError>;

    async fn read(&self, key: &str) -> Result<Option<FlatRecord>, SinkError>;

    /// Returns whether a live record existed.
    async fn delete(&self, key: &str) -> Result<bool, SinkError>;

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), SinkError>;

    async fn delete_field(&self, key: &str, field: &str) -> Result<(), SinkError>;

    /// Physically remove expired records and return how many went.
    /// Reads already ignore them.
    async fn purge_expired(&self) -> Result<u64, SinkError>;
}

/// Fire-and-forget topic publisher.
#[async_trait]
pub trait BroadcastSink: Send + Sync {
    fn name(&self) -> &str;

    /// Upper bound the sink enforces on its own `publish` calls. `None`
    /// leaves the caller to apply one.
    fn deadline(&self) -> Option<Duration> {
        None
    }

    async fn publish(&self, topic: Topic, message: &StreamMessage) -> Result<(), SinkError>;
}

/// Publishes to every inner sink concurrently, each under its own
/// deadline. A failing or slow sink is logged and does not hold up
/// delivery to the rest.
#[derive(Clone)]
pub struct BroadcastFanout {
    sinks: Vec<Arc<dyn BroadcastSink>>,
    /// Deadline for inner sinks that do not declare one.
    sink_timeout: Duration,
}

impl Default for BroadcastFanout {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl BroadcastFanout {
    pub fn new(sinks: Vec<Arc<dyn BroadcastSink>>) -> Self {
        Self {
            sinks,
            sink_timeout: DEFAULT_SINK_TIMEOUT,
        }
    }

    pub fn with_sink_timeout(mut self, sink_timeout: Duration) -> Self {
        self.sink_timeout = sink_timeout;
        self
    }

    fn deadline_of(&self, sink: &dyn BroadcastSink) -> Duration {
        sink.deadline().unwrap_or(self.sink_timeout)
    }

    pub fn push(&mut self, sink: Arc<dyn BroadcastSink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl BroadcastSink for BroadcastFanout {
    fn name(&self) -> &str {
        "fanout"
    }

    fn deadline(&self) -> Option<Duration> {
        Some(
            self.sinks
                .iter()
                .map(|sink| self.deadline_of(sink.as_ref()))
                .max()
                .unwrap_or(Duration::ZERO),
        )
    }

    async fn publish(&self, topic: Topic, message: &StreamMessage) -> Result<(), SinkError> {
        let deliveries = self.sinks.iter().map(|sink| async move {
            let timeout = self.deadline_of(sink.as_ref());
            let result = match tokio::time::timeout(timeout, sink.publish(topic, message)).await {
                Ok(result) => result,
                Err(_) => Err(SinkError::Timeout {
                    operation: "publish",
                    timeout,
                }),
            };
            if let Err(e) = result {
                warn!(sink = sink.name(), topic = %topic, error = %e, "Broadcast sink failed");
            }
        });
        join_all(deliveries).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct SleepySink {
        delay: Duration,
        deadline: Option<Duration>,
        delivered: AtomicUsize,
    }

    impl SleepySink {
        fn new(delay: Duration, deadline: Option<Duration>) -> Arc<Self> {
            Arc::new(Self {
                delay,
                deadline,
                delivered: AtomicUsize::new(0),
            })
        }

        fn delivered(&self) -> usize {
            self.delivered.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl BroadcastSink for SleepySink {
        fn name(&self) -> &str {
            "sleepy"
        }

        fn deadline(&self) -> Option<Duration> {
            self.deadline
        }

        async fn publish(&self, _topic: Topic, _message: &StreamMessage) -> Result<(), SinkError> {
            tokio::time::sleep(self.delay).await;
            self.delivered.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_slow_sink_does_not_block_the_next() {
        let slow = SleepySink::new(Duration::from_secs(5), None);
        let fast = SleepySink::new(Duration::ZERO, None);
        let sinks: Vec<Arc<dyn BroadcastSink>> = vec![slow.clone(), fast.clone()];
        let fanout = BroadcastFanout::new(sinks)
            .with_sink_timeout(Duration::from_millis(50));

        let message = StreamMessage::Lagged { skipped: 0 };
        let started = std::time::Instant::now();
        for _ in 0..3 {
            fanout.publish(Topic::Alerts, &message).await.unwrap();
        }

        assert_eq!(fast.delivered(), 3);
        assert_eq!(slow.delivered(), 0);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_declared_deadline_overrides_default() {
        let patient = SleepySink::new(Duration::from_millis(100), Some(Duration::from_secs(2)));
        let fanout = BroadcastFanout::new(vec![patient.clone() as Arc<dyn BroadcastSink>])
            .with_sink_timeout(Duration::from_millis(10));

        assert_eq!(fanout.deadline(), Some(Duration::from_secs(2)));
        fanout
            .publish(Topic::Alerts, &StreamMessage::Lagged { skipped: 0 })
            .await
            .unwrap();
        assert_eq!(patient.delivered(), 1);
    }
}
