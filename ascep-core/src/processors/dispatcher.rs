//! Dispatcher processor.
//!
//! The Dispatcher is the only owner of engine state and is responsible for:
//! - Receiving `EngineEvent` from the bounded event queue, one at a time
//! - Updating the price cache and scanning the fresh snapshot for opportunities
//! - Emitting opportunity signals and evaluating every rule against the event
//! - Feeding opportunity signals back into the rules as `arbitrage_signal` events
//! - Answering `EngineCommand` requests from the API layer
//! - Picking up new thresholds between events
//!
//! Outbound effects are posted to the outbox and never awaited here.

use std::time::Instant;

use ascep_sdk::config::Thresholds;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::cache::PriceCache;
use crate::config::{ConfigWatcher, ThresholdsStore};
use crate::detection::OpportunityDetector;
use crate::entities::{Rule, RuleId, Signal, ValidationError};
use crate::events::{
    CommandReceiver, DEFAULT_OUTBOX_CAPACITY, DEFAULT_QUEUE_CAPACITY, EngineCommand, EngineEvent,
    EventReceiver, Outbox, OutboxReceiver, command_channel, event_channel, outbox_channel,
};
use crate::handle::{EngineError, EngineHandle};
use crate::latency::{DETECTION_SCAN, EVENT_PROCESSING, LatencyTracker};
use crate::rules::{MatchContext, RuleEngine};
use crate::signals::{SignalFactory, SignalSource};

/// Sizing and behaviour switches fixed at startup.
#[derive(Debug, Clone, Copy)]
pub struct EngineOptions {
    pub queue_capacity: usize,
    pub outbox_capacity: usize,
    /// Re-evaluate rules against each opportunity signal.
    pub feed_signals_to_rules: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            outbox_capacity: DEFAULT_OUTBOX_CAPACITY,
            feed_signals_to_rules: true,
        }
    }
}

/// What one event produced.
#[derive(Debug, Default)]
pub struct EventOutcome {
    pub opportunity_signals: Vec<Signal>,
    /// Rules fired by the event itself, then by each fed-back signal, in order.
    pub fired_rules: Vec<RuleId>,
}

pub struct Dispatcher {
    cache: PriceCache,
    detector: OpportunityDetector,
    factory: SignalFactory,
    rules: RuleEngine,
    thresholds: Thresholds,
    thresholds_store: ThresholdsStore,
    config_watcher: ConfigWatcher,
    event_rx: EventReceiver,
    command_rx: CommandReceiver,
    shutdown_rx: watch::Receiver<bool>,
    latency: LatencyTracker,
    feed_signals_to_rules: bool,
}

impl Dispatcher {
    /// Wire a dispatcher, the handle that talks to it, and the receiving
    /// end of its outbox.
    pub async fn new(
        options: EngineOptions,
        thresholds_store: ThresholdsStore,
        latency: LatencyTracker,
        shutdown_rx: watch::Receiver<bool>,
    ) -> (Self, EngineHandle, OutboxReceiver) {
        let (event_tx, event_rx) = event_channel(options.queue_capacity);
        let (command_tx, command_rx) = command_channel();
        let (outbox_tx, outbox_rx) = outbox_channel(options.outbox_capacity);
        let outbox = Outbox::new(outbox_tx);

        let thresholds = thresholds_store.snapshot().await;
        let factory = SignalFactory::new(&thresholds, outbox.clone());
        let rules = RuleEngine::new(outbox);

        let handle = EngineHandle::new(
            event_tx,
            command_tx,
            factory.history(),
            rules.reader(),
            thresholds_store.clone(),
            latency.clone(),
        );

        let dispatcher = Self {
            cache: PriceCache::new(),
            detector: OpportunityDetector::new(),
            factory,
            rules,
            thresholds,
            config_watcher: thresholds_store.subscribe(),
            thresholds_store,
            event_rx,
            command_rx,
            shutdown_rx,
            latency,
            feed_signals_to_rules: options.feed_signals_to_rules,
        };
        (dispatcher, handle, outbox_rx)
    }

    /// Load persisted rules before the loop starts.
    pub fn restore_rules(&mut self, rules: impl IntoIterator<Item = Rule>) -> usize {
        self.rules.restore(rules)
    }

    /// Run the Dispatcher until shutdown or until every producer is gone.
    pub async fn run(mut self) {
        info!("Dispatcher started");

        loop {
            tokio::select! {
                biased;

                changed = self.shutdown_rx.changed() => {
                    // A dropped sender means nobody can stop us any more.
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        info!("Dispatcher received shutdown signal");
                        break;
                    }
                }

                Ok(()) = self.config_watcher.changed() => {
                    self.reload_thresholds().await;
                }

                Some(command) = self.command_rx.recv() => {
                    self.handle_command(command);
                }

                event = self.event_rx.recv() => {
                    let Some(event) = event else {
                        info!("Event channel closed");
                        break;
                    };
                    if let Err(e) = self.process_event(event) {
                        warn!(error = %e, "Rejected event");
                    }
                }
            }
        }

        info!("Dispatcher shutdown complete");
    }

    async fn reload_thresholds(&mut self) {
        self.thresholds = self.thresholds_store.snapshot().await;
        self.factory.apply_thresholds(&self.thresholds);
        info!(
            version = self.thresholds_store.version(),
            cross_currency = self.thresholds.cross_currency_threshold,
            triangular = self.thresholds.triangular_threshold,
            "Dispatcher picked up new thresholds"
        );
    }

    /// Apply one event to completion.
    ///
    /// Price events update the cache and trigger a scan; every event is
    /// then evaluated by the rules. A rejected price changes nothing.
    pub fn process_event(&mut self, event: EngineEvent) -> Result<EventOutcome, ValidationError> {
        let started = Instant::now();
        let mut outcome = EventOutcome::default();

        let prior_price = match &event {
            EngineEvent::Price(tick) => {
                let replaced =
                    self.cache
                        .update(tick.symbol.clone(), tick.price, tick.observed_at)?;
                outcome.opportunity_signals = self.scan();
                replaced.map(|entry| entry.value)
            }
            EngineEvent::Generic { .. } => event
                .symbol()
                .and_then(|symbol| self.cache.get(symbol))
                .map(|entry| entry.value),
        };

        let ctx = MatchContext { prior_price };
        outcome.fired_rules = self.rules.evaluate(&event, &ctx, &mut self.factory);

        if self.feed_signals_to_rules {
            for signal in &outcome.opportunity_signals {
                let feedback = EngineEvent::from_signal(signal);
                let fired = self
                    .rules
                    .evaluate(&feedback, &MatchContext::default(), &mut self.factory);
                outcome.fired_rules.extend(fired);
            }
        }

        self.latency.record(EVENT_PROCESSING, started.elapsed());
        debug!(
            event_type = event.event_type(),
            signals = outcome.opportunity_signals.len(),
            fired = outcome.fired_rules.len(),
            "Event processed"
        );
        Ok(outcome)
    }

    fn scan(&mut self) -> Vec<Signal> {
        let started = Instant::now();
        let snapshot = self.cache.fresh_snapshot(self.thresholds.freshness_window());
        let opportunities = self.detector.scan(&snapshot, &self.thresholds);
        self.latency.record(DETECTION_SCAN, started.elapsed());

        opportunities
            .iter()
            .map(|opportunity| self.factory.emit(SignalSource::Opportunity(opportunity)))
            .collect()
    }

    pub fn handle_command(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::RegisterRule { draft, reply } => {
                let _ = reply.send(Ok(self.rules.register(draft)));
            }
            EngineCommand::UpdateRule { id, patch, reply } => {
                let _ = reply.send(self.rules.update(id, patch));
            }
            EngineCommand::DeleteRule { id, reply } => {
                let _ = reply.send(self.rules.delete(id));
            }
            EngineCommand::TestRule { id, event, reply } => {
                let ctx = MatchContext {
                    prior_price: event
                        .symbol()
                        .and_then(|symbol| self.cache.get(symbol))
                        .map(|entry| entry.value),
                };
                let _ = reply.send(self.rules.test(id, &event, &ctx));
            }
            EngineCommand::ManualSignal { signal, reply } => {
                let signal = self.factory.emit(SignalSource::Manual(signal));
                let _ = reply.send(Ok(signal));
            }
            EngineCommand::DeleteSignal { id, reply } => {
                let result = self
                    .factory
                    .delete(id)
                    .ok_or(EngineError::SignalNotFound(id));
                let _ = reply.send(result);
            }
            EngineCommand::PriceSnapshot { max_age, reply } => {
                let entries = self.cache.fresh_snapshot(max_age).into_values().collect();
                let _ = reply.send(Ok(entries));
            }
        }
    }
}
