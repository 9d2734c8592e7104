//! Cross-currency and triangular opportunity detection.
//!
//! A scan works on one immutable snapshot. Pairs and cycles are keyed by
//! their sorted symbols so each is evaluated at most once per scan, no
//! matter which leg the iteration reaches first.

use std::collections::HashSet;

use ascep_sdk::config::Thresholds;
use itertools::Itertools;

use crate::cache::PriceSnapshot;
use crate::entities::{Leg, Opportunity, Symbol, split_pair};

#[derive(Debug, Default, Clone, Copy)]
pub struct OpportunityDetector;

impl OpportunityDetector {
    pub fn new() -> Self {
        Self
    }

    /// Accepted opportunities, highest spread percentage first, at most
    /// `max_signals_per_cycle` of them.
    pub fn scan(&self, snapshot: &PriceSnapshot, thresholds: &Thresholds) -> Vec<Opportunity> {
        let mut found = cross_currency(snapshot, thresholds.cross_currency_threshold);
        found.extend(triangular(snapshot, thresholds.triangular_threshold));
        found.sort_by(|a, b| b.spread_pct().total_cmp(&a.spread_pct()));
        found.truncate(thresholds.max_signals_per_cycle);
        found
    }
}

fn cross_currency(snapshot: &PriceSnapshot, threshold: f64) -> Vec<Opportunity> {
    let mut seen: HashSet<(Symbol, Symbol)> = HashSet::new();
    let mut found = Vec::new();

    for (symbol, entry) in snapshot {
        let Some((base, quote)) = split_pair(symbol) else {
            continue;
        };
        let reverse_symbol = Symbol::from(format!("{quote}/{base}"));
        let Some(reverse) = snapshot.get(&reverse_symbol) else {
            continue;
        };
        let key = if *symbol < reverse_symbol {
            (symbol.clone(), reverse_symbol.clone())
        } else {
            (reverse_symbol.clone(), symbol.clone())
        };
        if !seen.insert(key) {
            continue;
        }

        let price = entry.value;
        if price <= 0.0 || reverse.value <= 0.0 {
            continue;
        }
        let theoretical = 1.0 / reverse.value;
        let spread = (price - theoretical).abs();
        let spread_pct = spread / price * 100.0;
        if spread_pct > threshold {
            found.push(Opportunity::cross_currency(
                Leg {
                    symbol: symbol.clone(),
                    price,
                },
                Leg {
                    symbol: reverse_symbol,
                    price: reverse.value,
                },
                spread,
                spread_pct,
            ));
        }
    }
    found
}

fn triangular(snapshot: &PriceSnapshot, threshold: f64) -> Vec<Opportunity> {
    let mut seen: HashSet<Vec<Symbol>> = HashSet::new();
    let mut found = Vec::new();

    for (first_symbol, first) in snapshot {
        let Some((base, mid)) = split_pair(first_symbol) else {
            continue;
        };
        for (second_symbol, second) in snapshot {
            if first_symbol == second_symbol {
                continue;
            }
            let Some((second_base, quote)) = split_pair(second_symbol) else {
                continue;
            };
            if second_base != mid || base == quote {
                continue;
            }
            let closing_symbol = Symbol::from(format!("{base}/{quote}"));
            let Some(closing) = snapshot.get(&closing_symbol) else {
                continue;
            };
            let key = [first_symbol, second_symbol, &closing_symbol]
                .into_iter()
                .cloned()
                .sorted()
                .collect_vec();
            if !seen.insert(key) {
                continue;
            }

            if first.value <= 0.0 || second.value <= 0.0 || closing.value <= 0.0 {
                continue;
            }
            let theoretical = first.value * second.value;
            let spread = (closing.value - theoretical).abs();
            let spread_pct = spread / closing.value * 100.0;
            if spread_pct > threshold {
                found.push(Opportunity::triangular(
                    Leg {
                        symbol: first_symbol.clone(),
                        price: first.value,
                    },
                    Leg {
                        symbol: second_symbol.clone(),
                        price: second.value,
                    },
                    Leg {
                        symbol: closing_symbol,
                        price: closing.value,
                    },
                    spread,
                    spread_pct,
                ));
            }
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{OpportunityKind, PriceEntry};
    use time::OffsetDateTime;

    fn snapshot(prices: &[(&str, f64)]) -> PriceSnapshot {
        prices
            .iter()
            .map(|(symbol, value)| {
                (
                    Symbol::from(*symbol),
                    PriceEntry {
                        symbol: Symbol::from(*symbol),
                        value: *value,
                        observed_at: OffsetDateTime::UNIX_EPOCH,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_consistent_reciprocal_pair_is_quiet() {
        let snap = snapshot(&[("EUR/USD", 1.0850), ("USD/EUR", 0.9217)]);
        assert!(OpportunityDetector.scan(&snap, &Thresholds::default()).is_empty());
    }

    #[test]
    fn test_reciprocal_mismatch_found_once() {
        let snap = snapshot(&[("EUR/USD", 1.10), ("USD/EUR", 0.90)]);
        let found = OpportunityDetector.scan(&snap, &Thresholds::default());
        assert_eq!(found.len(), 1);
        let opp = &found[0];
        assert_eq!(opp.kind(), OpportunityKind::CrossCurrency);
        assert_eq!(opp.legs().len(), 2);
        assert!((opp.spread_pct() - 1.0101).abs() < 1e-3);
        let symbols: Vec<&str> = opp.symbols().map(|s| s.as_str()).collect();
        assert_eq!(symbols, vec!["EUR/USD", "USD/EUR"]);
    }

    #[test]
    fn test_triangle_found_once_per_cycle() {
        // EUR/USD * USD/JPY = 162.75, EUR/JPY is 2% off
        let snap = snapshot(&[("EUR/USD", 1.085), ("USD/JPY", 150.0), ("EUR/JPY", 166.0)]);
        let found = OpportunityDetector.scan(&snap, &Thresholds::default());
        assert_eq!(found.len(), 1);
        let opp = &found[0];
        assert_eq!(opp.kind(), OpportunityKind::Triangular);
        let symbols: Vec<&str> = opp.symbols().map(|s| s.as_str()).collect();
        assert_eq!(symbols, vec!["EUR/USD", "USD/JPY", "EUR/JPY"]);
        assert!((opp.spread() - 3.25).abs() < 1e-9);
    }

    #[test]
    fn test_balanced_triangle_is_quiet() {
        let snap = snapshot(&[("EUR/USD", 1.085), ("USD/JPY", 150.0), ("EUR/JPY", 162.75)]);
        assert!(OpportunityDetector.scan(&snap, &Thresholds::default()).is_empty());
    }

    #[test]
    fn test_results_sorted_and_capped() {
        let snap = snapshot(&[
            ("AAA/BBB", 1.10),
            ("BBB/AAA", 0.90),
            ("CCC/DDD", 1.50),
            ("DDD/CCC", 0.50),
            ("EEE/FFF", 1.01),
            ("FFF/EEE", 0.985),
        ]);
        let thresholds = Thresholds {
            max_signals_per_cycle: 2,
            ..Thresholds::default()
        };
        let found = OpportunityDetector.scan(&snap, &thresholds);
        assert_eq!(found.len(), 2);
        assert!(found[0].spread_pct() >= found[1].spread_pct());
        assert_eq!(found[0].legs()[0].symbol, "CCC/DDD");
        assert_eq!(found[1].legs()[0].symbol, "AAA/BBB");
    }

    #[test]
    fn test_non_ratio_symbols_are_ignored() {
        let snap = snapshot(&[("SPX", 5000.0), ("EUR/USD", 1.0850)]);
        assert!(OpportunityDetector.scan(&snap, &Thresholds::default()).is_empty());
    }
}
