//! Bounded signal history.
//!
//! The dispatcher holds the only [`SignalHistory`] writer. API handlers
//! read through cloned [`SignalHistoryReader`]s.

use std::collections::VecDeque;
use std::sync::Arc;

use ascep_sdk::objects::{Severity, SignalStatsResponse};
use parking_lot::RwLock;

use crate::entities::{Signal, SignalId};

struct HistoryInner {
    signals: VecDeque<Signal>,
    capacity: usize,
}

/// Oldest-first ring of recent signals with strict FIFO eviction.
pub struct SignalHistory {
    inner: Arc<RwLock<HistoryInner>>,
}

#[derive(Clone)]
pub struct SignalHistoryReader {
    inner: Arc<RwLock<HistoryInner>>,
}

impl SignalHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(RwLock::new(HistoryInner {
                signals: VecDeque::with_capacity(capacity),
                capacity,
            })),
        }
    }

    pub fn reader(&self) -> SignalHistoryReader {
        SignalHistoryReader {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Append, evicting the single oldest entry when full.
    pub fn push(&mut self, signal: Signal) -> Option<Signal> {
        let mut inner = self.inner.write();
        let evicted = if inner.signals.len() >= inner.capacity {
            inner.signals.pop_front()
        } else {
            None
        };
        inner.signals.push_back(signal);
        evicted
    }

    pub fn remove(&mut self, id: SignalId) -> Option<Signal> {
        let mut inner = self.inner.write();
        let position = inner.signals.iter().position(|s| s.id == id)?;
        inner.signals.remove(position)
    }

    /// Change the capacity, dropping the oldest entries if it shrinks.
    pub fn set_capacity(&mut self, capacity: usize) {
        let mut inner = self.inner.write();
        inner.capacity = capacity.max(1);
        while inner.signals.len() > inner.capacity {
            inner.signals.pop_front();
        }
    }
}

impl SignalHistoryReader {
    /// Up to `n` signals, newest first.
    pub fn recent(&self, n: usize) -> Vec<Signal> {
        self.inner.read().signals.iter().rev().take(n).cloned().collect()
    }

    pub fn get(&self, id: SignalId) -> Option<Signal> {
        self.inner.read().signals.iter().find(|s| s.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().signals.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.read().capacity
    }

    pub fn stats(&self) -> SignalStatsResponse {
        let inner = self.inner.read();
        let count = |severity: Severity| inner.signals.iter().filter(|s| s.severity == severity).count();
        let total = inner.signals.len();
        let average_spread_percentage = if total == 0 {
            0.0
        } else {
            inner.signals.iter().map(|s| s.spread_pct).sum::<f64>() / total as f64
        };
        SignalStatsResponse {
            total,
            high: count(Severity::High),
            medium: count(Severity::Medium),
            low: count(Severity::Low),
            average_spread_percentage,
            last_signal_at: inner.signals.back().map(|s| s.timestamp),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ascep_sdk::objects::SignalKind;
    use time::OffsetDateTime;

    fn signal(id: SignalId, severity: Severity, spread_pct: f64) -> Signal {
        Signal {
            id,
            kind: SignalKind::Manual,
            symbols: vec!["EUR/USD".into()],
            prices: vec![],
            spread: spread_pct,
            spread_pct,
            severity,
            timestamp: OffsetDateTime::UNIX_EPOCH + time::Duration::seconds(id as i64),
            source_rule_id: None,
        }
    }

    #[test]
    fn test_fifo_eviction() {
        let mut history = SignalHistory::new(3);
        let reader = history.reader();
        for id in 1..=3 {
            assert!(history.push(signal(id, Severity::Low, 0.1)).is_none());
        }
        let evicted = history.push(signal(4, Severity::Low, 0.1));
        assert_eq!(evicted.map(|s| s.id), Some(1));
        assert_eq!(reader.len(), 3);
        let ids: Vec<_> = reader.recent(10).iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![4, 3, 2]);
    }

    #[test]
    fn test_shrink_drops_oldest() {
        let mut history = SignalHistory::new(5);
        for id in 1..=5 {
            history.push(signal(id, Severity::Low, 0.1));
        }
        history.set_capacity(2);
        let reader = history.reader();
        assert_eq!(reader.capacity(), 2);
        let ids: Vec<_> = reader.recent(10).iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![5, 4]);
    }

    #[test]
    fn test_remove_and_stats() {
        let mut history = SignalHistory::new(10);
        history.push(signal(1, Severity::High, 1.0));
        history.push(signal(2, Severity::Medium, 0.3));
        history.push(signal(3, Severity::Low, 0.2));
        let reader = history.reader();

        let stats = reader.stats();
        assert_eq!((stats.total, stats.high, stats.medium, stats.low), (3, 1, 1, 1));
        assert!((stats.average_spread_percentage - 0.5).abs() < 1e-9);
        assert_eq!(
            stats.last_signal_at,
            Some(OffsetDateTime::UNIX_EPOCH + time::Duration::seconds(3))
        );

        assert_eq!(history.remove(2).map(|s| s.id), Some(2));
        assert!(history.remove(2).is_none());
        assert!(reader.get(2).is_none());
        assert_eq!(reader.get(3).map(|s| s.id), Some(3));
    }
}
