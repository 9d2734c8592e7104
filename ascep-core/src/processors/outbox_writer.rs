//! OutboxWriter processor.
//!
//! The OutboxWriter is responsible for:
//! - Receiving `OutboxMessage` from the dispatcher's outbox
//! - Writing signal records (with TTL) and rule records to the durable store
//! - Publishing signals, alerts and logs to the broadcast sink
//!
//! Every store or publish call runs under a timeout: `sink_timeout`, or
//! the deadline a broadcast sink enforces itself. Failures are logged and
//! never reported back to the dispatcher.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ascep_sdk::objects::{SignalObject, StreamMessage, Topic};
use tracing::{debug, info, warn};

use crate::entities::rule::RULES_KEY;
use crate::entities::{FlatRecord, Rule, Signal};
use crate::events::{OutboxMessage, OutboxReceiver};
use crate::latency::{LatencyTracker, SINK_WRITE};
use crate::sinks::{BroadcastSink, DEFAULT_SINK_TIMEOUT, DurableStore, SinkError};

/// Signal records expire after a day.
pub const DEFAULT_SIGNAL_TTL: Duration = Duration::from_secs(86_400);

#[derive(Debug, Clone, Copy)]
pub struct WriterOptions {
    pub sink_timeout: Duration,
    pub signal_ttl: Duration,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            sink_timeout: DEFAULT_SINK_TIMEOUT,
            signal_ttl: DEFAULT_SIGNAL_TTL,
        }
    }
}

pub struct OutboxWriter {
    outbox_rx: OutboxReceiver,
    store: Arc<dyn DurableStore>,
    broadcast: Arc<dyn BroadcastSink>,
    options: WriterOptions,
    latency: LatencyTracker,
}

impl OutboxWriter {
    pub fn new(
        outbox_rx: OutboxReceiver,
        store: Arc<dyn DurableStore>,
        broadcast: Arc<dyn BroadcastSink>,
        options: WriterOptions,
        latency: LatencyTracker,
    ) -> Self {
        Self {
            outbox_rx,
            store,
            broadcast,
            options,
            latency,
        }
    }

    /// Run until the dispatcher drops its end of the outbox. Messages
    /// already queued at that point are still written.
    pub async fn run(mut self) {
        info!("OutboxWriter started");

        while let Some(message) = self.outbox_rx.recv().await {
            self.process(message).await;
        }

        info!("OutboxWriter shutdown complete");
    }

    async fn process(&self, message: OutboxMessage) {
        let label = message.label();
        debug!(message = label, "Writing outbox message");
        let result = match message {
            OutboxMessage::Signal { topic, signal } => self.write_signal(topic, &signal).await,
            OutboxMessage::Alert(notice) => {
                self.publish(Topic::Alerts, StreamMessage::Alert { notice })
                    .await
            }
            OutboxMessage::Log(notice) => {
                self.publish(Topic::Logs, StreamMessage::Log { notice }).await
            }
            OutboxMessage::RuleSaved(rule) => self.save_rule(&rule).await,
            OutboxMessage::RuleDeleted(id) => {
                self.timed(
                    "delete_field",
                    self.store.delete_field(RULES_KEY, &Rule::record_field(id)),
                )
                .await
            }
            OutboxMessage::SignalDeleted(id) => self
                .timed("delete", self.store.delete(&Signal::record_key(id)))
                .await
                .map(|_| ()),
        };

        if let Err(e) = result {
            warn!(message = label, error = %e, "Outbound write failed");
        }
    }

    async fn write_signal(&self, topic: Topic, signal: &Signal) -> Result<(), SinkError> {
        let key = Signal::record_key(signal.id);
        // Store and publish are independent; one failing does not skip the other.
        let stored = async {
            self.timed("upsert", self.store.upsert(&key, signal.to_record()))
                .await?;
            self.timed("expire", self.store.expire(&key, self.options.signal_ttl))
                .await
        }
        .await;
        if let Err(e) = &stored {
            warn!(signal_id = signal.id, error = %e, "Failed to store signal");
        }

        self.publish(
            topic,
            StreamMessage::Signal {
                topic,
                signal: SignalObject::from(signal),
            },
        )
        .await
    }

    async fn save_rule(&self, rule: &Rule) -> Result<(), SinkError> {
        let mut fields = FlatRecord::new();
        fields.insert(Rule::record_field(rule.id), rule.encode()?);
        self.timed("upsert", self.store.upsert(RULES_KEY, fields))
            .await
    }

    async fn publish(&self, topic: Topic, message: StreamMessage) -> Result<(), SinkError> {
        let call = self.broadcast.publish(topic, &message);
        if self.broadcast.deadline().is_some() {
            self.measured(call).await
        } else {
            self.timed("publish", call).await
        }
    }

    async fn timed<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T, SinkError>>,
    ) -> Result<T, SinkError> {
        let timeout = self.options.sink_timeout;
        self.measured(async move {
            match tokio::time::timeout(timeout, call).await {
                Ok(result) => result,
                Err(_) => Err(SinkError::Timeout { operation, timeout }),
            }
        })
        .await
    }

    async fn measured<T>(
        &self,
        call: impl Future<Output = Result<T, SinkError>>,
    ) -> Result<T, SinkError> {
        let started = Instant::now();
        let result = call.await;
        self.latency.record(SINK_WRITE, started.elapsed());
        result
    }
}

/// Read every persisted rule. Records that no longer decode are skipped.
pub async fn load_rules(store: &dyn DurableStore) -> Result<Vec<Rule>, SinkError> {
    let Some(fields) = store.read(RULES_KEY).await? else {
        return Ok(Vec::new());
    };

    let mut rules = Vec::with_capacity(fields.len());
    for (field, raw) in fields {
        match Rule::decode(&raw) {
            Ok(rule) => rules.push(rule),
            Err(e) => warn!(field = %field, error = %e, "Skipping unreadable rule record"),
        }
    }
    Ok(rules)
}
