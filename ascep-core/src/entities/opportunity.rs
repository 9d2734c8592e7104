use ascep_sdk::objects::SignalKind;
use smallvec::SmallVec;

use super::Symbol;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpportunityKind {
    CrossCurrency,
    Triangular,
}

impl From<OpportunityKind> for SignalKind {
    fn from(kind: OpportunityKind) -> Self {
        match kind {
            OpportunityKind::CrossCurrency => SignalKind::CrossCurrency,
            OpportunityKind::Triangular => SignalKind::Triangular,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Leg {
    pub symbol: Symbol,
    pub price: f64,
}

/// A pricing mismatch found in one detection pass.
///
/// Cross-currency opportunities always carry two legs, triangular ones
/// three. The constructors are the only way to build one.
#[derive(Debug, Clone, PartialEq)]
pub struct Opportunity {
    kind: OpportunityKind,
    legs: SmallVec<[Leg; 3]>,
    spread: f64,
    spread_pct: f64,
}

impl Opportunity {
    pub fn cross_currency(direct: Leg, reverse: Leg, spread: f64, spread_pct: f64) -> Self {
        let mut legs = SmallVec::new();
        legs.push(direct);
        legs.push(reverse);
        Self {
            kind: OpportunityKind::CrossCurrency,
            legs,
            spread,
            spread_pct,
        }
    }

    /// `first` and `second` chain into `closing` (`A/B`, `B/C`, `A/C`).
    pub fn triangular(first: Leg, second: Leg, closing: Leg, spread: f64, spread_pct: f64) -> Self {
        let mut legs = SmallVec::new();
        legs.push(first);
        legs.push(second);
        legs.push(closing);
        Self {
            kind: OpportunityKind::Triangular,
            legs,
            spread,
            spread_pct,
        }
    }

    pub fn kind(&self) -> OpportunityKind {
        self.kind
    }

    pub fn legs(&self) -> &[Leg] {
        &self.legs
    }

    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.legs.iter().map(|leg| &leg.symbol)
    }

    pub fn prices(&self) -> impl Iterator<Item = f64> + '_ {
        self.legs.iter().map(|leg| leg.price)
    }

    pub fn spread(&self) -> f64 {
        self.spread
    }

    pub fn spread_pct(&self) -> f64 {
        self.spread_pct
    }
}
