//! Pattern matchers: pure functions of a rule's conditions, the event
//! payload and the prior cached price.

use ascep_sdk::objects::PatternKind;
use serde_json::Value;

use crate::entities::Rule;
use crate::entities::rule::{PRICE_CHANGE_THRESHOLD, SPREAD_THRESHOLD, VOLUME_THRESHOLD};

pub const DEFAULT_PRICE_CHANGE_THRESHOLD: f64 = 5.0;
pub const DEFAULT_VOLUME_THRESHOLD: f64 = 1_000_000.0;
pub const DEFAULT_SPREAD_THRESHOLD: f64 = 0.1;

/// The event cannot be evaluated by this rule. Other rules are unaffected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvaluationError {
    #[error("event field {field} is not a number")]
    NonNumericField { field: &'static str },
}

/// State outside the event that a matcher may consult.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MatchContext {
    /// Price cached for the event's symbol before this event was applied.
    pub prior_price: Option<f64>,
}

pub fn matches(rule: &Rule, payload: &Value, ctx: &MatchContext) -> Result<bool, EvaluationError> {
    match rule.pattern {
        PatternKind::PriceSpike => price_spike(
            payload,
            ctx.prior_price,
            rule.threshold(PRICE_CHANGE_THRESHOLD, DEFAULT_PRICE_CHANGE_THRESHOLD),
        ),
        PatternKind::VolumeSurge => volume_surge(
            payload,
            rule.threshold(VOLUME_THRESHOLD, DEFAULT_VOLUME_THRESHOLD),
        ),
        PatternKind::ArbitrageOpportunity => arbitrage_opportunity(
            payload,
            rule.threshold(SPREAD_THRESHOLD, DEFAULT_SPREAD_THRESHOLD),
        ),
        PatternKind::TrendReversal => Ok(trend_reversal()),
        PatternKind::Custom => Ok(custom(payload, rule.custom_condition())),
    }
}

/// `|Δ%| >= threshold` against the prior price. Needs a positive prior
/// price and a price on the event.
pub fn price_spike(
    payload: &Value,
    prior_price: Option<f64>,
    threshold: f64,
) -> Result<bool, EvaluationError> {
    let Some(price) = numeric_field(payload, "price")? else {
        return Ok(false);
    };
    let Some(prior) = prior_price.filter(|p| *p > 0.0) else {
        return Ok(false);
    };
    let change_pct = (price - prior) / prior * 100.0;
    Ok(change_pct.abs() >= threshold)
}

/// Missing volume counts as zero.
pub fn volume_surge(payload: &Value, threshold: f64) -> Result<bool, EvaluationError> {
    let volume = numeric_field(payload, "volume")?.unwrap_or(0.0);
    Ok(volume >= threshold)
}

/// Missing spread counts as zero.
pub fn arbitrage_opportunity(payload: &Value, threshold: f64) -> Result<bool, EvaluationError> {
    let spread_pct = numeric_field(payload, "spread_percentage")?.unwrap_or(0.0);
    Ok(spread_pct >= threshold)
}

// TODO: needs a per-symbol price window in the cache before it can do anything useful.
pub fn trend_reversal() -> bool {
    false
}

/// Substring match against the event's serialized JSON.
pub fn custom(payload: &Value, condition: Option<&str>) -> bool {
    match condition {
        Some(condition) if !condition.is_empty() => payload.to_string().contains(condition),
        _ => false,
    }
}

fn numeric_field(payload: &Value, field: &'static str) -> Result<Option<f64>, EvaluationError> {
    match payload.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_f64()
            .map(Some)
            .ok_or(EvaluationError::NonNumericField { field }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_price_spike_threshold() {
        let up6 = json!({"symbol": "EUR/USD", "price": 106.0});
        let up4 = json!({"symbol": "EUR/USD", "price": 104.0});
        let down6 = json!({"symbol": "EUR/USD", "price": 94.0});
        assert_eq!(price_spike(&up6, Some(100.0), 5.0), Ok(true));
        assert_eq!(price_spike(&up4, Some(100.0), 5.0), Ok(false));
        assert_eq!(price_spike(&down6, Some(100.0), 5.0), Ok(true));
        assert_eq!(price_spike(&up6, None, 5.0), Ok(false));
        assert_eq!(price_spike(&up6, Some(0.0), 5.0), Ok(false));
        assert_eq!(price_spike(&json!({"symbol": "EUR/USD"}), Some(100.0), 5.0), Ok(false));
    }

    #[test]
    fn test_volume_and_spread() {
        assert_eq!(volume_surge(&json!({"volume": 1_000_000}), 1_000_000.0), Ok(true));
        assert_eq!(volume_surge(&json!({"volume": 999_999}), 1_000_000.0), Ok(false));
        assert_eq!(volume_surge(&json!({}), 1_000_000.0), Ok(false));
        assert_eq!(arbitrage_opportunity(&json!({"spread_percentage": 0.1}), 0.1), Ok(true));
        assert_eq!(arbitrage_opportunity(&json!({"spread_percentage": 0.05}), 0.1), Ok(false));
    }

    #[test]
    fn test_non_numeric_field_is_an_error() {
        assert_eq!(
            volume_surge(&json!({"volume": "huge"}), 1.0),
            Err(EvaluationError::NonNumericField { field: "volume" })
        );
    }

    #[test]
    fn test_custom_substring() {
        let payload = json!({"type": "news", "headline": "ECB hikes rates"});
        assert!(custom(&payload, Some("ECB")));
        assert!(!custom(&payload, Some("FED")));
        assert!(!custom(&payload, None));
        assert!(!trend_reversal());
    }
}
