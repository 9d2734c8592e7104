use ascep_sdk::objects::{RuleAction, RuleNotice};
use serde_json::Value;
use time::OffsetDateTime;
use tracing::{info, warn};

use super::book::{RuleBook, RuleBookReader};
use super::matchers::{MatchContext, matches};
use crate::entities::{Rule, RuleDraft, RuleId, RulePatch};
use crate::events::{EngineEvent, Outbox, OutboxMessage};
use crate::handle::EngineError;
use crate::signals::{SignalFactory, SignalSource};

/// Holds the registered rules and evaluates them against events.
///
/// Every change to a rule, including trigger bookkeeping, is posted to
/// the outbox as `RuleSaved` so the durable copy follows the live one.
pub struct RuleEngine {
    book: RuleBook,
    next_id: RuleId,
    outbox: Outbox,
}

impl RuleEngine {
    pub fn new(outbox: Outbox) -> Self {
        Self {
            book: RuleBook::new(),
            next_id: 1,
            outbox,
        }
    }

    pub fn reader(&self) -> RuleBookReader {
        self.book.reader()
    }

    /// Load previously persisted rules. The id counter continues after
    /// the highest restored id.
    pub fn restore(&mut self, rules: impl IntoIterator<Item = Rule>) -> usize {
        let mut book = self.book.write();
        let mut restored = 0;
        for rule in rules {
            self.next_id = self.next_id.max(rule.id.saturating_add(1));
            book.insert(rule.id, rule);
            restored += 1;
        }
        restored
    }

    pub fn register(&mut self, draft: RuleDraft) -> Rule {
        let id = self.next_id;
        self.next_id += 1;
        let rule = Rule::new(id, draft, OffsetDateTime::now_utc());
        self.book.write().insert(id, rule.clone());
        info!(rule_id = id, name = %rule.name, pattern = %rule.pattern, "Rule registered");
        self.outbox.post(OutboxMessage::RuleSaved(rule.clone()));
        rule
    }

    pub fn update(&mut self, id: RuleId, patch: RulePatch) -> Result<Rule, EngineError> {
        let mut book = self.book.write();
        let rule = book.get_mut(&id).ok_or(EngineError::RuleNotFound(id))?;
        rule.apply(patch)?;
        let updated = rule.clone();
        drop(book);
        info!(rule_id = id, enabled = updated.enabled, "Rule updated");
        self.outbox.post(OutboxMessage::RuleSaved(updated.clone()));
        Ok(updated)
    }

    pub fn delete(&mut self, id: RuleId) -> Result<Rule, EngineError> {
        let removed = self
            .book
            .write()
            .remove(&id)
            .ok_or(EngineError::RuleNotFound(id))?;
        info!(rule_id = id, "Rule deleted");
        self.outbox.post(OutboxMessage::RuleDeleted(id));
        Ok(removed)
    }

    /// Evaluate one rule without bookkeeping or actions. Disabled rules
    /// are evaluated too.
    pub fn test(
        &self,
        id: RuleId,
        event: &EngineEvent,
        ctx: &MatchContext,
    ) -> Result<bool, EngineError> {
        let rule = self.book.reader().get(id).ok_or(EngineError::RuleNotFound(id))?;
        Ok(matches(&rule, &event.to_payload(), ctx)?)
    }

    /// Run every enabled rule against `event` and return the ids that fired.
    ///
    /// A rule whose matcher errors is skipped for this event only.
    pub fn evaluate(
        &mut self,
        event: &EngineEvent,
        ctx: &MatchContext,
        factory: &mut SignalFactory,
    ) -> Vec<RuleId> {
        let payload = event.to_payload();
        let mut fired = Vec::new();
        let mut book = self.book.write();

        for rule in book.values_mut() {
            if !rule.enabled {
                continue;
            }
            match matches(rule, &payload, ctx) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    warn!(rule_id = rule.id, error = %e, "Rule evaluation failed, skipping");
                    continue;
                }
            }

            let now = OffsetDateTime::now_utc();
            rule.record_trigger(now);
            fired.push(rule.id);
            info!(
                rule_id = rule.id,
                name = %rule.name,
                trigger_count = rule.trigger_count(),
                event_type = event.event_type(),
                "Rule triggered"
            );

            match rule.action {
                RuleAction::CreateSignal => {
                    factory.emit(SignalSource::RuleMatch {
                        rule: &*rule,
                        payload: &payload,
                    });
                }
                RuleAction::SendAlert => {
                    self.outbox
                        .post(OutboxMessage::Alert(notice(rule, &payload, now)));
                }
                RuleAction::LogEvent => {
                    self.outbox.post(OutboxMessage::Log(notice(rule, &payload, now)));
                }
            }
            self.outbox.post(OutboxMessage::RuleSaved(rule.clone()));
        }
        fired
    }
}

fn notice(rule: &Rule, payload: &Value, at: OffsetDateTime) -> RuleNotice {
    RuleNotice {
        rule_id: rule.id,
        rule_name: rule.name.clone(),
        pattern: rule.pattern,
        message: format!("CEP rule '{}' triggered", rule.name),
        event: payload.clone(),
        timestamp: at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{OutboxReceiver, PriceTick, outbox_channel};
    use ascep_sdk::config::Thresholds;
    use ascep_sdk::objects::{CreateRuleRequest, PatternKind, SignalKind};
    use serde_json::json;

    fn setup() -> (RuleEngine, SignalFactory, OutboxReceiver) {
        let (tx, rx) = outbox_channel(64);
        let outbox = Outbox::new(tx);
        (
            RuleEngine::new(outbox.clone()),
            SignalFactory::new(&Thresholds::default(), outbox),
            rx,
        )
    }

    fn draft(pattern: PatternKind, action: RuleAction, conditions: Value) -> RuleDraft {
        RuleDraft::try_from(CreateRuleRequest {
            name: format!("{pattern} rule"),
            pattern,
            conditions: conditions.as_object().cloned().unwrap_or_default(),
            action,
            enabled: true,
        })
        .unwrap()
    }

    fn tick(price: f64) -> EngineEvent {
        EngineEvent::Price(PriceTick {
            symbol: "EUR/USD".into(),
            price,
            observed_at: OffsetDateTime::now_utc(),
            volume: None,
        })
    }

    fn drain(rx: &mut OutboxReceiver) -> Vec<OutboxMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    #[test]
    fn test_price_spike_fires_and_books() {
        let (mut engine, mut factory, mut rx) = setup();
        let rule = engine.register(draft(
            PatternKind::PriceSpike,
            RuleAction::CreateSignal,
            json!({"price_change_threshold": 5}),
        ));
        drain(&mut rx);

        let ctx = MatchContext {
            prior_price: Some(100.0),
        };
        assert!(engine.evaluate(&tick(104.0), &ctx, &mut factory).is_empty());
        assert_eq!(engine.evaluate(&tick(106.0), &ctx, &mut factory), vec![rule.id]);

        let stored = engine.reader().get(rule.id).unwrap();
        assert_eq!(stored.trigger_count(), 1);
        assert!(stored.last_triggered_at().is_some());

        let messages = drain(&mut rx);
        assert!(matches!(
            &messages[0],
            OutboxMessage::Signal { signal, .. } if signal.kind == SignalKind::RuleMatch
        ));
        assert!(matches!(&messages[1], OutboxMessage::RuleSaved(r) if r.trigger_count() == 1));
    }

    #[test]
    fn test_disabled_rules_keep_their_bookkeeping() {
        let (mut engine, mut factory, _rx) = setup();
        let rule = engine.register(draft(
            PatternKind::VolumeSurge,
            RuleAction::LogEvent,
            json!({"volume_threshold": 10}),
        ));
        engine
            .update(
                rule.id,
                RulePatch {
                    enabled: Some(false),
                    ..Default::default()
                },
            )
            .unwrap();

        let event = EngineEvent::Generic {
            event_type: "trade".into(),
            fields: json!({"volume": 500}).as_object().cloned().unwrap(),
        };
        assert!(engine
            .evaluate(&event, &MatchContext::default(), &mut factory)
            .is_empty());
        let stored = engine.reader().get(rule.id).unwrap();
        assert_eq!(stored.trigger_count(), 0);
        assert_eq!(stored.last_triggered_at(), None);

        // a dry run still evaluates it
        assert_eq!(engine.test(rule.id, &event, &MatchContext::default()), Ok(true));
        assert_eq!(engine.reader().get(rule.id).unwrap().trigger_count(), 0);
    }

    #[test]
    fn test_failing_rule_does_not_block_others() {
        let (mut engine, mut factory, mut rx) = setup();
        let broken = engine.register(draft(PatternKind::VolumeSurge, RuleAction::LogEvent, json!({})));
        let alert = engine.register(draft(
            PatternKind::Custom,
            RuleAction::SendAlert,
            json!({"custom_condition": "EUR/USD"}),
        ));
        drain(&mut rx);

        let event = EngineEvent::Generic {
            event_type: "trade".into(),
            fields: json!({"symbol": "EUR/USD", "volume": "lots"})
                .as_object()
                .cloned()
                .unwrap(),
        };
        let fired = engine.evaluate(&event, &MatchContext::default(), &mut factory);
        assert_eq!(fired, vec![alert.id]);
        assert_eq!(engine.reader().get(broken.id).unwrap().trigger_count(), 0);

        let messages = drain(&mut rx);
        assert!(matches!(&messages[0], OutboxMessage::Alert(n) if n.rule_id == alert.id));
        assert_eq!(factory.history().len(), 0);

        assert!(matches!(
            engine.test(broken.id, &event, &MatchContext::default()),
            Err(EngineError::Evaluation(_))
        ));
    }

    #[test]
    fn test_update_delete_and_restore() {
        let (mut engine, _factory, _rx) = setup();
        assert!(matches!(
            engine.delete(42),
            Err(EngineError::RuleNotFound(42))
        ));
        assert!(matches!(
            engine.update(42, RulePatch::default()),
            Err(EngineError::RuleNotFound(42))
        ));

        let restored = Rule::new(
            7,
            draft(PatternKind::TrendReversal, RuleAction::LogEvent, json!({})),
            OffsetDateTime::UNIX_EPOCH,
        );
        assert_eq!(engine.restore(vec![restored]), 1);
        let next = engine.register(draft(PatternKind::PriceSpike, RuleAction::LogEvent, json!({})));
        assert_eq!(next.id, 8);

        assert!(matches!(
            engine.update(
                7,
                RulePatch {
                    name: Some(" ".into()),
                    ..Default::default()
                }
            ),
            Err(EngineError::Validation(_))
        ));
        assert_eq!(engine.delete(7).map(|r| r.id).ok(), Some(7));
        assert_eq!(engine.reader().len(), 1);
    }
}
