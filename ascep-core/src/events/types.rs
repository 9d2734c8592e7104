//! Event, command and outbox message types.

use ascep_sdk::objects::{EventPayload, PriceUpdate, RuleNotice, SignalObject, Topic};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::sync::oneshot;

use crate::entities::{ManualSignal, PriceEntry, Rule, RuleDraft, RuleId, RulePatch, Signal, SignalId, Symbol};
use crate::handle::EngineError;

/// Event type given to opportunity signals when they are fed back to the rules.
pub const ARBITRAGE_SIGNAL_EVENT: &str = "arbitrage_signal";
pub const PRICE_UPDATE_EVENT: &str = "price_update";

/// One observed price.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceTick {
    pub symbol: Symbol,
    pub price: f64,
    pub observed_at: OffsetDateTime,
    pub volume: Option<f64>,
}

/// Unit of work pulled by the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Price(PriceTick),
    Generic {
        event_type: String,
        fields: Map<String, Value>,
    },
}

impl EngineEvent {
    pub fn symbol(&self) -> Option<&str> {
        match self {
            Self::Price(tick) => Some(tick.symbol.as_str()),
            Self::Generic { fields, .. } => fields.get("symbol").and_then(Value::as_str),
        }
    }

    pub fn event_type(&self) -> &str {
        match self {
            Self::Price(_) => PRICE_UPDATE_EVENT,
            Self::Generic { event_type, .. } => event_type,
        }
    }

    /// JSON object form seen by rule matchers: `{"type": ..., ...fields}`.
    pub fn to_payload(&self) -> Value {
        let mut object = Map::new();
        match self {
            Self::Price(tick) => {
                object.insert("symbol".into(), Value::from(tick.symbol.as_str()));
                object.insert("price".into(), Value::from(tick.price));
                if let Ok(ts) = tick.observed_at.format(&Rfc3339) {
                    object.insert("timestamp".into(), Value::from(ts));
                }
                if let Some(volume) = tick.volume {
                    object.insert("volume".into(), Value::from(volume));
                }
            }
            Self::Generic { fields, .. } => {
                object.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
        }
        object.insert("type".into(), Value::from(self.event_type()));
        Value::Object(object)
    }

    /// The event an opportunity signal becomes when re-evaluated by the rules.
    pub fn from_signal(signal: &Signal) -> Self {
        let fields = match serde_json::to_value(SignalObject::from(signal)) {
            Ok(Value::Object(fields)) => fields,
            _ => Map::new(),
        };
        Self::Generic {
            event_type: ARBITRAGE_SIGNAL_EVENT.to_owned(),
            fields,
        }
    }
}

impl PriceTick {
    /// Build from a wire update, stamping `received_at` when no timestamp is given.
    pub fn from_update(update: PriceUpdate, received_at: OffsetDateTime) -> Self {
        Self {
            symbol: Symbol::from(update.symbol.trim()),
            price: update.price,
            observed_at: update.timestamp.unwrap_or(received_at),
            volume: update.volume,
        }
    }
}

impl From<EventPayload> for EngineEvent {
    fn from(payload: EventPayload) -> Self {
        Self::Generic {
            event_type: payload.event_type,
            fields: payload.fields,
        }
    }
}

pub type Reply<T> = oneshot::Sender<Result<T, EngineError>>;

/// Request that needs the dispatcher's state and an answer.
#[derive(Debug)]
pub enum EngineCommand {
    RegisterRule {
        draft: RuleDraft,
        reply: Reply<Rule>,
    },
    UpdateRule {
        id: RuleId,
        patch: RulePatch,
        reply: Reply<Rule>,
    },
    DeleteRule {
        id: RuleId,
        reply: Reply<Rule>,
    },
    /// Dry run: no bookkeeping, no actions.
    TestRule {
        id: RuleId,
        event: EngineEvent,
        reply: Reply<bool>,
    },
    ManualSignal {
        signal: ManualSignal,
        reply: Reply<Signal>,
    },
    DeleteSignal {
        id: SignalId,
        reply: Reply<Signal>,
    },
    PriceSnapshot {
        max_age: time::Duration,
        reply: Reply<Vec<PriceEntry>>,
    },
}

/// Work handed from the dispatcher to the outbound sink writer.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboxMessage {
    Signal { topic: Topic, signal: Signal },
    Alert(RuleNotice),
    Log(RuleNotice),
    RuleSaved(Rule),
    RuleDeleted(RuleId),
    SignalDeleted(SignalId),
}

impl OutboxMessage {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Signal { .. } => "signal",
            Self::Alert(_) => "alert",
            Self::Log(_) => "log",
            Self::RuleSaved(_) => "rule_saved",
            Self::RuleDeleted(_) => "rule_deleted",
            Self::SignalDeleted(_) => "signal_deleted",
        }
    }
}
