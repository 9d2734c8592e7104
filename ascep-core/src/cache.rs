//! Latest price per symbol with freshness-filtered snapshots.

use std::collections::{BTreeMap, HashMap};

use time::OffsetDateTime;

use crate::entities::{PriceEntry, Symbol, ValidationError, validate_price};

/// Fresh prices keyed by symbol, in symbol order.
pub type PriceSnapshot = BTreeMap<Symbol, PriceEntry>;

/// One entry per symbol, overwritten on every accepted update.
#[derive(Debug, Default)]
pub struct PriceCache {
    entries: HashMap<Symbol, PriceEntry>,
}

impl PriceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a price and return the entry it replaced.
    ///
    /// A price rejected by [`validate_price`] leaves the cache unchanged.
    pub fn update(
        &mut self,
        symbol: Symbol,
        value: f64,
        observed_at: OffsetDateTime,
    ) -> Result<Option<PriceEntry>, ValidationError> {
        validate_price(&symbol, value)?;
        let entry = PriceEntry {
            symbol: symbol.clone(),
            value,
            observed_at,
        };
        Ok(self.entries.insert(symbol, entry))
    }

    pub fn get(&self, symbol: &str) -> Option<&PriceEntry> {
        self.entries.get(symbol)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy of every entry with `now - observed_at <= max_age`.
    pub fn fresh_snapshot_at(&self, now: OffsetDateTime, max_age: time::Duration) -> PriceSnapshot {
        self.entries
            .values()
            .filter(|entry| entry.age_at(now) <= max_age)
            .map(|entry| (entry.symbol.clone(), entry.clone()))
            .collect()
    }

    pub fn fresh_snapshot(&self, max_age: time::Duration) -> PriceSnapshot {
        self.fresh_snapshot_at(OffsetDateTime::now_utc(), max_age)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;
    use time::macros::datetime;

    #[test]
    fn test_update_replaces_and_returns_prior() {
        let mut cache = PriceCache::new();
        let t0 = datetime!(2024-01-01 00:00:00 UTC);
        assert_eq!(cache.update("EUR/USD".into(), 1.08, t0).unwrap(), None);
        let prior = cache.update("EUR/USD".into(), 1.09, t0 + Duration::seconds(1)).unwrap();
        assert_eq!(prior.map(|e| e.value), Some(1.08));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("EUR/USD").map(|e| e.value), Some(1.09));
    }

    #[test]
    fn test_rejected_updates_leave_cache_unchanged() {
        let mut cache = PriceCache::new();
        let t0 = datetime!(2024-01-01 00:00:00 UTC);
        cache.update("EUR/USD".into(), 1.08, t0).unwrap();

        assert!(matches!(
            cache.update("EUR/USD".into(), 0.0, t0),
            Err(ValidationError::NonPositivePrice { .. })
        ));
        assert!(cache.update("EUR/USD".into(), f64::NAN, t0).is_err());
        assert!(cache.update("".into(), 1.0, t0).is_err());
        assert_eq!(cache.get("EUR/USD").map(|e| e.value), Some(1.08));

        // non-ratio symbols may go to zero or below, but never non-finite
        assert!(cache.update("SPREAD_INDEX".into(), -0.5, t0).is_ok());
        assert!(cache.update("SPREAD_INDEX".into(), f64::INFINITY, t0).is_err());
    }

    #[test]
    fn test_fresh_snapshot_filters_by_age() {
        let mut cache = PriceCache::new();
        let now = datetime!(2024-01-01 00:00:10 UTC);
        cache.update("EUR/USD".into(), 1.08, now - Duration::milliseconds(400)).unwrap();
        cache.update("USD/EUR".into(), 0.92, now - Duration::milliseconds(500)).unwrap();
        cache.update("GBP/USD".into(), 1.26, now - Duration::milliseconds(501)).unwrap();

        let snapshot = cache.fresh_snapshot_at(now, Duration::milliseconds(500));
        let symbols: Vec<&str> = snapshot.keys().map(|s| s.as_str()).collect();
        assert_eq!(symbols, vec!["EUR/USD", "USD/EUR"]);
    }
}
