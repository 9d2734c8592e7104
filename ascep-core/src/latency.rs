//! Windowed latency tracking per named operation.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use ascep_sdk::objects::{LatencyStatsResponse, LatencySummaryObject};
use parking_lot::Mutex;

/// Samples kept per operation.
pub const LATENCY_WINDOW: usize = 1000;

pub const EVENT_PROCESSING: &str = "event_processing";
pub const DETECTION_SCAN: &str = "detection_scan";
pub const SINK_WRITE: &str = "sink_write";

/// Shared handle; clones record into the same window.
#[derive(Clone, Default)]
pub struct LatencyTracker {
    samples: Arc<Mutex<HashMap<&'static str, VecDeque<f64>>>>,
}

impl LatencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, operation: &'static str, elapsed: Duration) {
        let mut samples = self.samples.lock();
        let window = samples
            .entry(operation)
            .or_insert_with(|| VecDeque::with_capacity(LATENCY_WINDOW));
        if window.len() >= LATENCY_WINDOW {
            window.pop_front();
        }
        window.push_back(elapsed.as_secs_f64() * 1000.0);
    }

    pub fn summary(&self, operation: &str) -> Option<LatencySummaryObject> {
        let samples = self.samples.lock();
        samples.get(operation).and_then(|window| summarize(window))
    }

    pub fn stats(&self) -> LatencyStatsResponse {
        let samples = self.samples.lock();
        let operations: BTreeMap<String, LatencySummaryObject> = samples
            .iter()
            .filter_map(|(name, window)| Some((name.to_string(), summarize(window)?)))
            .collect();
        LatencyStatsResponse { operations }
    }
}

fn summarize(window: &VecDeque<f64>) -> Option<LatencySummaryObject> {
    if window.is_empty() {
        return None;
    }
    let mut sorted: Vec<f64> = window.iter().copied().collect();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len();
    let percentile = |q: f64| sorted[((n as f64 * q) as usize).min(n - 1)];
    Some(LatencySummaryObject {
        samples: n,
        avg_ms: sorted.iter().sum::<f64>() / n as f64,
        min_ms: sorted[0],
        max_ms: sorted[n - 1],
        p95_ms: percentile(0.95),
        p99_ms: percentile(0.99),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_percentiles() {
        let tracker = LatencyTracker::new();
        for ms in 1..=100u64 {
            tracker.record(EVENT_PROCESSING, Duration::from_millis(ms));
        }
        let summary = tracker.summary(EVENT_PROCESSING).unwrap();
        assert_eq!(summary.samples, 100);
        assert!((summary.avg_ms - 50.5).abs() < 1e-6);
        assert!((summary.min_ms - 1.0).abs() < 1e-6);
        assert!((summary.max_ms - 100.0).abs() < 1e-6);
        assert!((summary.p95_ms - 96.0).abs() < 1e-6);
        assert!((summary.p99_ms - 100.0).abs() < 1e-6);
        assert!(tracker.summary(DETECTION_SCAN).is_none());
    }

    #[test]
    fn test_window_is_bounded() {
        let tracker = LatencyTracker::new();
        for _ in 0..(LATENCY_WINDOW + 50) {
            tracker.record(SINK_WRITE, Duration::from_micros(10));
        }
        assert_eq!(tracker.summary(SINK_WRITE).unwrap().samples, LATENCY_WINDOW);
        assert_eq!(tracker.stats().operations.len(), 1);
    }
}
