use ascep_sdk::objects::PriceEntryObject;
use time::OffsetDateTime;

use super::{Symbol, ValidationError, split_pair};

/// Check a price before it is queued or cached.
///
/// Non-finite values are rejected for every symbol; ratio symbols
/// (`BASE/QUOTE`) also reject values `<= 0`.
pub fn validate_price(symbol: &str, value: f64) -> Result<(), ValidationError> {
    if symbol.is_empty() {
        return Err(ValidationError::EmptySymbol);
    }
    if !value.is_finite() {
        return Err(ValidationError::NotFinite { field: "price" });
    }
    if value <= 0.0 && split_pair(symbol).is_some() {
        return Err(ValidationError::NonPositivePrice {
            symbol: Symbol::from(symbol),
            value,
        });
    }
    Ok(())
}

/// Latest observed price for one symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceEntry {
    pub symbol: Symbol,
    pub value: f64,
    pub observed_at: OffsetDateTime,
}

impl PriceEntry {
    pub fn age_at(&self, now: OffsetDateTime) -> time::Duration {
        now - self.observed_at
    }
}

impl From<&PriceEntry> for PriceEntryObject {
    fn from(entry: &PriceEntry) -> Self {
        Self {
            symbol: entry.symbol.to_string(),
            price: entry.value,
            observed_at: entry.observed_at,
        }
    }
}
