//! Stream message types for the live feed.
//!
//! The `GET /ws` endpoint upgrades to a WebSocket connection and pushes
//! one [`StreamMessage`] JSON frame per published message. The same
//! payloads are POSTed to configured webhooks.
//!
//! Clients may narrow the stream with `?topics=alerts,logs`; without it
//! every topic is delivered.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use super::rules::PatternKind;
use super::signals::SignalObject;

/// Broadcast topic a message is published on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    /// Opportunity and manual signals.
    ArbitrageSignals,
    /// Signals created by rule actions.
    CepSignals,
    Alerts,
    Logs,
}

impl Topic {
    pub const ALL: [Topic; 4] = [
        Topic::ArbitrageSignals,
        Topic::CepSignals,
        Topic::Alerts,
        Topic::Logs,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ArbitrageSignals => "arbitrage_signals",
            Self::CepSignals => "cep_signals",
            Self::Alerts => "alerts",
            Self::Logs => "logs",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown topic: {0}")]
pub struct UnknownTopic(pub String);

impl FromStr for Topic {
    type Err = UnknownTopic;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|topic| topic.as_str() == s)
            .ok_or_else(|| UnknownTopic(s.to_owned()))
    }
}

/// Payload of an alert or log action fired by a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleNotice {
    pub rule_id: u64,
    pub rule_name: String,
    pub pattern: PatternKind,
    pub message: String,
    /// The event that triggered the rule.
    pub event: Value,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Server-to-client stream frame, tagged by `"type"`:
///
/// ```json
/// {"type":"signal","topic":"arbitrage_signals","signal":{ ... }}
/// {"type":"alert","notice":{ ... }}
/// {"type":"lagged","skipped":12}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamMessage {
    Signal { topic: Topic, signal: SignalObject },
    Alert { notice: RuleNotice },
    Log { notice: RuleNotice },
    /// The subscriber fell behind and missed this many messages.
    Lagged { skipped: u64 },
}

impl StreamMessage {
    /// The topic this message belongs to. `Lagged` is connection-local.
    pub fn topic(&self) -> Option<Topic> {
        match self {
            Self::Signal { topic, .. } => Some(*topic),
            Self::Alert { .. } => Some(Topic::Alerts),
            Self::Log { .. } => Some(Topic::Logs),
            Self::Lagged { .. } => None,
        }
    }
}
