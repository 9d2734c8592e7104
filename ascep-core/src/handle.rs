//! Cloneable front door to a running engine.
//!
//! Reads of signal history, rules and latency are served from shared
//! snapshots without touching the dispatcher. Everything that changes
//! engine state is sent to the dispatcher as an [`EngineCommand`] and
//! awaited.

use ascep_sdk::config::Thresholds;
use ascep_sdk::objects::{
    CreateRuleRequest, EventPayload, LatencyStatsResponse, ManualSignalRequest, PriceUpdate,
    RuleStatsResponse, SignalStatsResponse, ThresholdsPatch, UpdateRuleRequest,
};
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::oneshot;

use crate::config::ThresholdsStore;
use crate::entities::{
    ManualSignal, PriceEntry, Rule, RuleDraft, RuleId, RulePatch, Signal, SignalId,
    ValidationError, validate_price,
};
use crate::events::{CommandSender, EngineCommand, EngineEvent, EventSender, PriceTick, Reply};
use crate::latency::LatencyTracker;
use crate::rules::{EvaluationError, RuleBookReader};
use crate::signals::SignalHistoryReader;

/// Error returned by every [`EngineHandle`] operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("rule {0} not found")]
    RuleNotFound(RuleId),

    #[error("signal {0} not found")]
    SignalNotFound(SignalId),

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    /// The dispatcher is gone; nothing more will be processed.
    #[error("engine is not running")]
    EngineStopped,
}

impl EngineError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::RuleNotFound(_) | Self::SignalNotFound(_))
    }
}

#[derive(Clone)]
pub struct EngineHandle {
    events: EventSender,
    commands: CommandSender,
    history: SignalHistoryReader,
    rules: RuleBookReader,
    thresholds: ThresholdsStore,
    latency: LatencyTracker,
}

impl EngineHandle {
    pub(crate) fn new(
        events: EventSender,
        commands: CommandSender,
        history: SignalHistoryReader,
        rules: RuleBookReader,
        thresholds: ThresholdsStore,
        latency: LatencyTracker,
    ) -> Self {
        Self {
            events,
            commands,
            history,
            rules,
            thresholds,
            latency,
        }
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> EngineCommand,
    ) -> Result<T, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| EngineError::EngineStopped)?;
        rx.await.map_err(|_| EngineError::EngineStopped)?
    }

    async fn enqueue(&self, event: EngineEvent) -> Result<(), EngineError> {
        self.events
            .send(event)
            .await
            .map_err(|_| EngineError::EngineStopped)
    }

    // -- Ingestion -----------------------------------------------------------

    /// Queue one price update, waiting while the queue is full.
    pub async fn ingest_price(&self, update: PriceUpdate) -> Result<(), EngineError> {
        validate_price(update.symbol.trim(), update.price)?;
        let tick = PriceTick::from_update(update, OffsetDateTime::now_utc());
        self.enqueue(EngineEvent::Price(tick)).await
    }

    /// Queue a batch in order. The whole batch is rejected if any entry is
    /// invalid.
    pub async fn ingest_prices(&self, updates: Vec<PriceUpdate>) -> Result<usize, EngineError> {
        for update in &updates {
            validate_price(update.symbol.trim(), update.price)?;
        }
        let received_at = OffsetDateTime::now_utc();
        let count = updates.len();
        for update in updates {
            let tick = PriceTick::from_update(update, received_at);
            self.enqueue(EngineEvent::Price(tick)).await?;
        }
        Ok(count)
    }

    pub async fn ingest_event(&self, payload: EventPayload) -> Result<(), EngineError> {
        if payload.event_type.trim().is_empty() {
            return Err(ValidationError::EmptyEventType.into());
        }
        self.enqueue(EngineEvent::from(payload)).await
    }

    // -- Signals -------------------------------------------------------------

    /// Newest first.
    pub fn recent_signals(&self, limit: usize) -> Vec<Signal> {
        self.history.recent(limit)
    }

    pub fn signal_count(&self) -> usize {
        self.history.len()
    }

    pub fn get_signal(&self, id: SignalId) -> Result<Signal, EngineError> {
        self.history.get(id).ok_or(EngineError::SignalNotFound(id))
    }

    pub async fn delete_signal(&self, id: SignalId) -> Result<Signal, EngineError> {
        self.request(|reply| EngineCommand::DeleteSignal { id, reply })
            .await
    }

    pub async fn create_manual_signal(
        &self,
        request: ManualSignalRequest,
    ) -> Result<Signal, EngineError> {
        let signal = ManualSignal::try_from(request)?;
        self.request(|reply| EngineCommand::ManualSignal { signal, reply })
            .await
    }

    pub fn signal_stats(&self) -> SignalStatsResponse {
        self.history.stats()
    }

    // -- Rules ---------------------------------------------------------------

    pub fn list_rules(&self) -> Vec<Rule> {
        self.rules.list()
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn get_rule(&self, id: RuleId) -> Result<Rule, EngineError> {
        self.rules.get(id).ok_or(EngineError::RuleNotFound(id))
    }

    pub async fn register_rule(&self, request: CreateRuleRequest) -> Result<Rule, EngineError> {
        let draft = RuleDraft::try_from(request)?;
        self.request(|reply| EngineCommand::RegisterRule { draft, reply })
            .await
    }

    pub async fn update_rule(
        &self,
        id: RuleId,
        request: UpdateRuleRequest,
    ) -> Result<Rule, EngineError> {
        let patch = RulePatch::from(request);
        self.request(|reply| EngineCommand::UpdateRule { id, patch, reply })
            .await
    }

    pub async fn delete_rule(&self, id: RuleId) -> Result<Rule, EngineError> {
        self.request(|reply| EngineCommand::DeleteRule { id, reply })
            .await
    }

    /// Evaluate one rule against a sample event without triggering it.
    pub async fn test_rule(&self, id: RuleId, payload: EventPayload) -> Result<bool, EngineError> {
        let event = EngineEvent::from(payload);
        self.request(|reply| EngineCommand::TestRule { id, event, reply })
            .await
    }

    pub fn rule_stats(&self) -> RuleStatsResponse {
        self.rules.stats()
    }

    // -- Thresholds ----------------------------------------------------------

    pub async fn thresholds(&self) -> Thresholds {
        self.thresholds.snapshot().await
    }

    /// Apply the fields present in `patch`. Nothing changes if the result
    /// is invalid.
    pub async fn update_thresholds(
        &self,
        patch: &ThresholdsPatch,
    ) -> Result<Thresholds, EngineError> {
        let mut applied = None;
        self.thresholds
            .try_update(|current| {
                let next = current.patched(patch)?;
                applied = Some(next);
                Ok::<_, ValidationError>(next)
            })
            .await?;
        match applied {
            Some(thresholds) => Ok(thresholds),
            None => Ok(self.thresholds.snapshot().await),
        }
    }

    pub async fn replace_thresholds(&self, thresholds: Thresholds) -> Result<(), EngineError> {
        thresholds.validate().map_err(ValidationError::from)?;
        self.thresholds.update(thresholds).await;
        Ok(())
    }

    // -- Prices & status -----------------------------------------------------

    /// Cached prices no older than `max_age`, or the freshness window when
    /// none is given. Sorted by symbol.
    pub async fn price_snapshot(
        &self,
        max_age: Option<time::Duration>,
    ) -> Result<Vec<PriceEntry>, EngineError> {
        let max_age = match max_age {
            Some(max_age) => max_age,
            None => self.thresholds.read().await.freshness_window(),
        };
        self.request(|reply| EngineCommand::PriceSnapshot { max_age, reply })
            .await
    }

    pub fn latency(&self) -> LatencyStatsResponse {
        self.latency.stats()
    }
}
