//! Signal types: the published unit of output.

use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// What produced a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    CrossCurrency,
    Triangular,
    RuleMatch,
    Manual,
}

impl SignalKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CrossCurrency => "cross_currency",
            Self::Triangular => "triangular",
            Self::RuleMatch => "rule_match",
            Self::Manual => "manual",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signal severity, ordered `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A published signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalObject {
    pub id: u64,
    pub kind: SignalKind,
    pub symbols: Vec<String>,
    pub prices: Vec<f64>,
    pub spread: f64,
    pub spread_percentage: f64,
    pub severity: Severity,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_rule_id: Option<u64>,
}

/// Request body for `POST /signals`.
///
/// `prices`, when present, must have one entry per symbol.
/// `spread_percentage` defaults to `spread` when omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualSignalRequest {
    pub symbols: Vec<String>,
    pub spread: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prices: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spread_percentage: Option<f64>,
}

/// Query string for `GET /signals`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListSignalsQuery {
    #[serde(default = "ListSignalsQuery::default_limit")]
    pub limit: usize,
}

impl ListSignalsQuery {
    pub const DEFAULT_LIMIT: usize = 50;
    pub const MAX_LIMIT: usize = 1000;

    fn default_limit() -> usize {
        Self::DEFAULT_LIMIT
    }

    /// The requested limit clamped to `1..=MAX_LIMIT`.
    pub fn clamped(&self) -> usize {
        self.limit.clamp(1, Self::MAX_LIMIT)
    }
}

impl Default for ListSignalsQuery {
    fn default() -> Self {
        Self {
            limit: Self::DEFAULT_LIMIT,
        }
    }
}

/// Newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalListResponse {
    pub signals: Vec<SignalObject>,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalStatsResponse {
    pub total: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub average_spread_percentage: f64,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_signal_at: Option<OffsetDateTime>,
}
