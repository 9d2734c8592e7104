use ascep_sdk::config::{SeverityThresholds, Thresholds};
use ascep_sdk::objects::{Severity, SignalKind, Topic};
use serde_json::Value;
use time::OffsetDateTime;
use tracing::info;

use super::history::{SignalHistory, SignalHistoryReader};
use crate::entities::{ManualSignal, Opportunity, Rule, Signal, SignalId, Symbol};
use crate::events::{Outbox, OutboxMessage};

/// Trigger count above which a rule-created signal is classified high.
pub const RULE_HIGH_SEVERITY_TRIGGERS: u64 = 5;

/// What a signal is created from.
#[derive(Debug)]
pub enum SignalSource<'a> {
    Opportunity(&'a Opportunity),
    /// A fired `create_signal` rule and the payload of the event that fired it.
    RuleMatch { rule: &'a Rule, payload: &'a Value },
    Manual(ManualSignal),
}

/// Turns opportunities, rule matches and manual requests into signals.
///
/// Owns the id counter and the history writer; every emitted signal is
/// appended to history before it is posted to the outbox.
pub struct SignalFactory {
    next_id: SignalId,
    severity: SeverityThresholds,
    history: SignalHistory,
    outbox: Outbox,
}

impl SignalFactory {
    pub fn new(thresholds: &Thresholds, outbox: Outbox) -> Self {
        Self {
            next_id: 1,
            severity: thresholds.severity_thresholds,
            history: SignalHistory::new(thresholds.signal_memory_limit),
            outbox,
        }
    }

    pub fn history(&self) -> SignalHistoryReader {
        self.history.reader()
    }

    pub fn apply_thresholds(&mut self, thresholds: &Thresholds) {
        self.severity = thresholds.severity_thresholds;
        self.history.set_capacity(thresholds.signal_memory_limit);
    }

    pub fn classify(&self, spread_pct: f64) -> Severity {
        if spread_pct > self.severity.high {
            Severity::High
        } else if spread_pct > self.severity.medium {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    pub fn emit(&mut self, source: SignalSource<'_>) -> Signal {
        let id = self.next_id;
        self.next_id += 1;
        let timestamp = OffsetDateTime::now_utc();

        let (signal, topic) = match source {
            SignalSource::Opportunity(opportunity) => (
                Signal {
                    id,
                    kind: opportunity.kind().into(),
                    symbols: opportunity.symbols().cloned().collect(),
                    prices: opportunity.prices().collect(),
                    spread: opportunity.spread(),
                    spread_pct: opportunity.spread_pct(),
                    severity: self.classify(opportunity.spread_pct()),
                    timestamp,
                    source_rule_id: None,
                },
                Topic::ArbitrageSignals,
            ),
            SignalSource::RuleMatch { rule, payload } => {
                let severity = if rule.trigger_count() > RULE_HIGH_SEVERITY_TRIGGERS {
                    Severity::High
                } else {
                    Severity::Medium
                };
                (
                    Signal {
                        id,
                        kind: SignalKind::RuleMatch,
                        symbols: payload_symbols(payload),
                        prices: payload_prices(payload),
                        spread: payload_number(payload, "spread"),
                        spread_pct: payload_number(payload, "spread_percentage"),
                        severity,
                        timestamp,
                        source_rule_id: Some(rule.id),
                    },
                    Topic::CepSignals,
                )
            }
            SignalSource::Manual(manual) => (
                Signal {
                    id,
                    kind: SignalKind::Manual,
                    severity: self.classify(manual.spread_pct),
                    symbols: manual.symbols,
                    prices: manual.prices,
                    spread: manual.spread,
                    spread_pct: manual.spread_pct,
                    timestamp,
                    source_rule_id: None,
                },
                Topic::ArbitrageSignals,
            ),
        };

        info!(
            signal_id = signal.id,
            kind = %signal.kind,
            severity = %signal.severity,
            spread_pct = signal.spread_pct,
            "Signal created"
        );
        self.history.push(signal.clone());
        self.outbox.post(OutboxMessage::Signal {
            topic,
            signal: signal.clone(),
        });
        signal
    }

    /// Remove a signal from history and queue its durable record for deletion.
    pub fn delete(&mut self, id: SignalId) -> Option<Signal> {
        let removed = self.history.remove(id)?;
        self.outbox.post(OutboxMessage::SignalDeleted(id));
        Some(removed)
    }
}

fn payload_symbols(payload: &Value) -> Vec<Symbol> {
    if let Some(symbol) = payload.get("symbol").and_then(Value::as_str) {
        return vec![Symbol::from(symbol)];
    }
    payload
        .get("symbols")
        .and_then(Value::as_array)
        .map(|symbols| symbols.iter().filter_map(Value::as_str).map(Symbol::from).collect())
        .unwrap_or_default()
}

fn payload_prices(payload: &Value) -> Vec<f64> {
    if let Some(price) = payload.get("price").and_then(Value::as_f64) {
        return vec![price];
    }
    payload
        .get("prices")
        .and_then(Value::as_array)
        .map(|prices| prices.iter().filter_map(Value::as_f64).collect())
        .unwrap_or_default()
}

fn payload_number(payload: &Value, key: &str) -> f64 {
    payload.get(key).and_then(Value::as_f64).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Leg, RuleDraft};
    use crate::events::outbox_channel;
    use ascep_sdk::objects::{CreateRuleRequest, PatternKind, RuleAction};
    use serde_json::json;

    fn factory(capacity: usize) -> (SignalFactory, crate::events::OutboxReceiver) {
        let (tx, rx) = outbox_channel(16);
        let thresholds = Thresholds {
            signal_memory_limit: capacity,
            ..Thresholds::default()
        };
        (SignalFactory::new(&thresholds, Outbox::new(tx)), rx)
    }

    fn cross(spread_pct: f64) -> Opportunity {
        Opportunity::cross_currency(
            Leg {
                symbol: "EUR/USD".into(),
                price: 1.1,
            },
            Leg {
                symbol: "USD/EUR".into(),
                price: 0.9,
            },
            0.01,
            spread_pct,
        )
    }

    #[test]
    fn test_severity_bands() {
        let (factory, _rx) = factory(10);
        assert_eq!(factory.classify(1.0), Severity::High);
        assert_eq!(factory.classify(0.5), Severity::Medium);
        assert_eq!(factory.classify(0.3), Severity::Medium);
        assert_eq!(factory.classify(0.2), Severity::Low);
    }

    #[test]
    fn test_ids_increase_and_history_is_bounded() {
        let (mut factory, mut rx) = factory(2);
        let ids: Vec<_> = (0..3)
            .map(|_| factory.emit(SignalSource::Opportunity(&cross(1.0))).id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);

        let history = factory.history();
        assert_eq!(history.len(), 2);
        let retained: Vec<_> = history.recent(10).iter().map(|s| s.id).collect();
        assert_eq!(retained, vec![3, 2]);

        let Ok(OutboxMessage::Signal { topic, signal }) = rx.try_recv() else {
            panic!("expected a signal in the outbox");
        };
        assert_eq!(topic, Topic::ArbitrageSignals);
        assert_eq!(signal.kind, SignalKind::CrossCurrency);
        assert_eq!(signal.symbols.len(), 2);
    }

    #[test]
    fn test_rule_match_severity_follows_trigger_count() {
        let (mut factory, mut rx) = factory(10);
        let draft = RuleDraft::try_from(CreateRuleRequest {
            name: "spike".into(),
            pattern: PatternKind::PriceSpike,
            conditions: Default::default(),
            action: RuleAction::CreateSignal,
            enabled: true,
        })
        .unwrap();
        let mut rule = Rule::new(4, draft, OffsetDateTime::UNIX_EPOCH);
        let payload = json!({"type": "price_update", "symbol": "EUR/USD", "price": 1.2});

        for _ in 0..5 {
            rule.record_trigger(OffsetDateTime::UNIX_EPOCH);
        }
        let medium = factory.emit(SignalSource::RuleMatch {
            rule: &rule,
            payload: &payload,
        });
        assert_eq!(medium.severity, Severity::Medium);
        assert_eq!(medium.source_rule_id, Some(4));
        assert_eq!(medium.symbols, vec![Symbol::from("EUR/USD")]);
        assert_eq!(medium.prices, vec![1.2]);

        rule.record_trigger(OffsetDateTime::UNIX_EPOCH);
        let high = factory.emit(SignalSource::RuleMatch {
            rule: &rule,
            payload: &payload,
        });
        assert_eq!(high.severity, Severity::High);

        let Ok(OutboxMessage::Signal { topic, .. }) = rx.try_recv() else {
            panic!("expected a signal in the outbox");
        };
        assert_eq!(topic, Topic::CepSignals);
    }

    #[test]
    fn test_delete_posts_to_outbox() {
        let (mut factory, mut rx) = factory(10);
        let signal = factory.emit(SignalSource::Manual(ManualSignal {
            symbols: vec!["EUR/USD".into()],
            prices: vec![],
            spread: 0.3,
            spread_pct: 0.3,
        }));
        assert_eq!(signal.severity, Severity::Medium);
        let _ = rx.try_recv();

        assert!(factory.delete(signal.id).is_some());
        assert!(factory.delete(signal.id).is_none());
        assert!(matches!(rx.try_recv(), Ok(OutboxMessage::SignalDeleted(id)) if id == signal.id));
        assert!(rx.try_recv().is_err());
    }
}
