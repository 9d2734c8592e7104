//! Rule types for the complex event processing API.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;

/// The fixed set of patterns a rule can match.
///
/// Unknown names fail deserialization, so they are rejected at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    /// Relative price move against the previously cached price.
    PriceSpike,
    /// Event volume at or above a threshold.
    VolumeSurge,
    /// Event spread percentage at or above a threshold.
    ArbitrageOpportunity,
    /// Reserved. Never matches.
    TrendReversal,
    /// Substring match against the event's serialized form.
    Custom,
}

impl PatternKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PriceSpike => "price_spike",
            Self::VolumeSurge => "volume_surge",
            Self::ArbitrageOpportunity => "arbitrage_opportunity",
            Self::TrendReversal => "trend_reversal",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happens when a rule matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    CreateSignal,
    SendAlert,
    LogEvent,
}

impl RuleAction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreateSignal => "create_signal",
            Self::SendAlert => "send_alert",
            Self::LogEvent => "log_event",
        }
    }
}

impl fmt::Display for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleObject {
    pub id: u64,
    pub name: String,
    pub pattern: PatternKind,
    pub conditions: Map<String, Value>,
    pub action: RuleAction,
    pub enabled: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_triggered_at: Option<OffsetDateTime>,
    pub trigger_count: u64,
}

fn default_enabled() -> bool {
    true
}

/// Request body for `POST /rules`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateRuleRequest {
    pub name: String,
    pub pattern: PatternKind,
    #[serde(default)]
    pub conditions: Map<String, Value>,
    pub action: RuleAction,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Request body for `PUT /rules/{id}`. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateRuleRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<PatternKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<RuleAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleListResponse {
    pub rules: Vec<RuleObject>,
    pub total: usize,
}

/// Result of a dry-run evaluation. No bookkeeping is changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleTestResponse {
    pub rule_id: u64,
    pub matched: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleStatsResponse {
    pub total_rules: usize,
    /// Rules that have triggered at least once.
    pub active_rules: usize,
    pub total_triggers: u64,
    pub average_triggers_per_rule: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_rule_defaults() {
        let req: CreateRuleRequest = serde_json::from_str(
            r#"{"name":"spike","pattern":"price_spike","action":"send_alert"}"#,
        )
        .unwrap();
        assert!(req.enabled);
        assert!(req.conditions.is_empty());
        assert_eq!(req.pattern, PatternKind::PriceSpike);
    }

    #[test]
    fn test_unknown_pattern_rejected() {
        let res: Result<CreateRuleRequest, _> = serde_json::from_str(
            r#"{"name":"x","pattern":"moon_phase","action":"log_event"}"#,
        );
        assert!(res.is_err());
    }
}
