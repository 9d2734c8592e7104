//! Price ingestion and snapshot types.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A single observed price.
///
/// `timestamp` defaults to the server's receive time when omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceUpdate {
    pub symbol: String,
    pub price: f64,
    #[serde(default, with = "time::serde::rfc3339::option", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
}

/// Body of `POST /prices`: either one update or a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PriceBatch {
    One(PriceUpdate),
    Many(Vec<PriceUpdate>),
}

impl PriceBatch {
    pub fn into_vec(self) -> Vec<PriceUpdate> {
        match self {
            Self::One(update) => vec![update],
            Self::Many(updates) => updates,
        }
    }
}

/// Query string for `GET /prices`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSnapshotQuery {
    /// Overrides the configured freshness window.
    #[serde(default)]
    pub max_age_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceEntryObject {
    pub symbol: String,
    pub price: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub observed_at: OffsetDateTime,
}

/// Sorted by symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshotResponse {
    pub max_age_ms: u64,
    pub prices: Vec<PriceEntryObject>,
}

/// Number of events accepted onto the engine queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestResponse {
    pub accepted: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_accepts_single_and_list() {
        let one: PriceBatch = serde_json::from_str(r#"{"symbol":"EUR/USD","price":1.1}"#).unwrap();
        assert_eq!(one.into_vec().len(), 1);

        let many: PriceBatch = serde_json::from_str(
            r#"[{"symbol":"EUR/USD","price":1.1},{"symbol":"USD/EUR","price":0.9,"timestamp":"2024-01-01T00:00:00Z"}]"#,
        )
        .unwrap();
        let many = many.into_vec();
        assert_eq!(many.len(), 2);
        assert!(many[0].timestamp.is_none());
        assert!(many[1].timestamp.is_some());
    }
}
