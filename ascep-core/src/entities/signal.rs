use ascep_sdk::objects::{ManualSignalRequest, Severity, SignalKind, SignalObject};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use super::{FlatRecord, RuleId, Symbol, ValidationError};

pub type SignalId = u64;

/// A published, severity-classified signal. Never mutated after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub id: SignalId,
    pub kind: SignalKind,
    pub symbols: Vec<Symbol>,
    pub prices: Vec<f64>,
    pub spread: f64,
    pub spread_pct: f64,
    pub severity: Severity,
    pub timestamp: OffsetDateTime,
    pub source_rule_id: Option<RuleId>,
}

impl Signal {
    /// Durable store key for a signal.
    pub fn record_key(id: SignalId) -> String {
        format!("signal:{id}")
    }

    /// Flat-map encoding for the durable store. List fields are JSON strings.
    pub fn to_record(&self) -> FlatRecord {
        let symbols: Vec<&str> = self.symbols.iter().map(|s| s.as_str()).collect();
        let mut record = FlatRecord::new();
        record.insert("id".into(), self.id.to_string());
        record.insert("type".into(), self.kind.to_string());
        record.insert("symbols".into(), serde_json::json!(symbols).to_string());
        record.insert("prices".into(), serde_json::json!(self.prices).to_string());
        record.insert("spread".into(), self.spread.to_string());
        record.insert("spread_percentage".into(), self.spread_pct.to_string());
        record.insert("severity".into(), self.severity.to_string());
        record.insert(
            "timestamp".into(),
            self.timestamp
                .format(&Rfc3339)
                .unwrap_or_else(|_| self.timestamp.unix_timestamp().to_string()),
        );
        if let Some(rule_id) = self.source_rule_id {
            record.insert("source_rule_id".into(), rule_id.to_string());
        }
        record
    }
}

impl From<&Signal> for SignalObject {
    fn from(signal: &Signal) -> Self {
        Self {
            id: signal.id,
            kind: signal.kind,
            symbols: signal.symbols.iter().map(|s| s.to_string()).collect(),
            prices: signal.prices.clone(),
            spread: signal.spread,
            spread_percentage: signal.spread_pct,
            severity: signal.severity,
            timestamp: signal.timestamp,
            source_rule_id: signal.source_rule_id,
        }
    }
}

/// A validated request for an operator-created signal.
#[derive(Debug, Clone, PartialEq)]
pub struct ManualSignal {
    pub symbols: Vec<Symbol>,
    pub prices: Vec<f64>,
    pub spread: f64,
    pub spread_pct: f64,
}

impl TryFrom<ManualSignalRequest> for ManualSignal {
    type Error = ValidationError;

    fn try_from(request: ManualSignalRequest) -> Result<Self, Self::Error> {
        if request.symbols.is_empty() {
            return Err(ValidationError::NoSymbols);
        }
        if request.symbols.iter().any(|s| s.trim().is_empty()) {
            return Err(ValidationError::EmptySymbol);
        }
        if !request.spread.is_finite() {
            return Err(ValidationError::NotFinite { field: "spread" });
        }
        let spread_pct = request.spread_percentage.unwrap_or(request.spread);
        if !spread_pct.is_finite() {
            return Err(ValidationError::NotFinite {
                field: "spread_percentage",
            });
        }
        let prices = request.prices.unwrap_or_default();
        if !prices.is_empty() && prices.len() != request.symbols.len() {
            return Err(ValidationError::PriceCountMismatch {
                expected: request.symbols.len(),
                actual: prices.len(),
            });
        }
        if prices.iter().any(|p| !p.is_finite()) {
            return Err(ValidationError::NotFinite { field: "prices" });
        }
        Ok(Self {
            symbols: request.symbols.iter().map(|s| Symbol::from(s.trim())).collect(),
            prices,
            spread: request.spread,
            spread_pct,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Signal {
        Signal {
            id: 3,
            kind: SignalKind::CrossCurrency,
            symbols: vec!["EUR/USD".into(), "USD/EUR".into()],
            prices: vec![1.1, 0.9],
            spread: 0.0111,
            spread_pct: 1.01,
            severity: Severity::High,
            timestamp: time::macros::datetime!(2024-05-01 12:00:00 UTC),
            source_rule_id: None,
        }
    }

    #[test]
    fn test_record_encodes_lists_as_json() {
        let record = sample().to_record();
        assert_eq!(record["id"], "3");
        assert_eq!(record["type"], "cross_currency");
        assert_eq!(record["symbols"], r#"["EUR/USD","USD/EUR"]"#);
        assert_eq!(record["prices"], "[1.1,0.9]");
        assert_eq!(record["severity"], "high");
        assert_eq!(record["timestamp"], "2024-05-01T12:00:00Z");
        assert!(!record.contains_key("source_rule_id"));
        assert_eq!(Signal::record_key(3), "signal:3");
    }

    #[test]
    fn test_manual_request_validation() {
        let ok = ManualSignal::try_from(ManualSignalRequest {
            symbols: vec!["EUR/USD".into()],
            spread: 0.4,
            prices: None,
            spread_percentage: None,
        })
        .unwrap();
        assert_eq!(ok.spread_pct, 0.4);
        assert!(ok.prices.is_empty());

        let empty = ManualSignalRequest {
            symbols: vec![],
            spread: 0.4,
            prices: None,
            spread_percentage: None,
        };
        assert_eq!(ManualSignal::try_from(empty), Err(ValidationError::NoSymbols));

        let mismatch = ManualSignalRequest {
            symbols: vec!["EUR/USD".into(), "USD/EUR".into()],
            spread: 0.4,
            prices: Some(vec![1.1]),
            spread_percentage: None,
        };
        assert_eq!(
            ManualSignal::try_from(mismatch),
            Err(ValidationError::PriceCountMismatch {
                expected: 2,
                actual: 1
            })
        );

        let nan = ManualSignalRequest {
            symbols: vec!["EUR/USD".into()],
            spread: f64::NAN,
            prices: None,
            spread_percentage: None,
        };
        assert_eq!(
            ManualSignal::try_from(nan),
            Err(ValidationError::NotFinite { field: "spread" })
        );
    }
}
