use serde::{Deserialize, Serialize};

/// Partial update for `POST /config`. Only present fields are changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cross_currency_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triangular_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_signals_per_cycle: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal_memory_limit: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity_thresholds: Option<SeverityThresholdsPatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub freshness_window_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeverityThresholdsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medium: Option<f64>,
}
