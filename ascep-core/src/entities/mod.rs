pub mod kv_record;
pub mod opportunity;
pub mod price;
pub mod rule;
pub mod signal;

pub use opportunity::{Leg, Opportunity, OpportunityKind};
pub use price::{PriceEntry, validate_price};
pub use rule::{Rule, RuleDraft, RuleId, RulePatch};
pub use signal::{ManualSignal, Signal, SignalId};

use ascep_sdk::config::ThresholdsError;
use compact_str::CompactString;

/// Instrument name. Ratio symbols are written `BASE/QUOTE`.
pub type Symbol = CompactString;

/// Flat string map as kept by the durable store.
pub type FlatRecord = std::collections::BTreeMap<String, String>;

/// Split a ratio symbol into `(base, quote)`.
///
/// Returns `None` for anything that is not exactly two non-empty,
/// distinct halves around a single `/`.
pub fn split_pair(symbol: &str) -> Option<(&str, &str)> {
    let (base, quote) = symbol.split_once('/')?;
    if base.is_empty() || quote.is_empty() || quote.contains('/') || base == quote {
        return None;
    }
    Some((base, quote))
}

/// Input rejected before it touches engine state.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("symbol must not be empty")]
    EmptySymbol,
    #[error("{field} must be a finite number")]
    NotFinite { field: &'static str },
    #[error("price for {symbol} must be positive, got {value}")]
    NonPositivePrice { symbol: Symbol, value: f64 },
    #[error("rule name must not be empty")]
    EmptyRuleName,
    #[error("condition {key} must be a finite, non-negative number")]
    InvalidCondition { key: &'static str },
    #[error("custom rules require a non-empty string custom_condition")]
    MissingCondition,
    #[error("event type must not be empty")]
    EmptyEventType,
    #[error("manual signals need at least one symbol")]
    NoSymbols,
    #[error("expected {expected} prices (one per symbol), got {actual}")]
    PriceCountMismatch { expected: usize, actual: usize },
    #[error(transparent)]
    Thresholds(#[from] ThresholdsError),
}
