//! Detection and classification thresholds.

use serde::{Deserialize, Serialize};

use crate::objects::thresholds::ThresholdsPatch;

/// Spread-percentage cut-offs used to classify signal severity.
///
/// Evaluated high to low: `spread_pct > high` is high, `> medium` is
/// medium, anything else is low.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityThresholds {
    pub high: f64,
    pub medium: f64,
}

impl Default for SeverityThresholds {
    fn default() -> Self {
        Self {
            high: 0.5,
            medium: 0.2,
        }
    }
}

/// Runtime-tunable thresholds for opportunity detection and signal output.
///
/// All percentages are expressed in percent (`0.1` means 0.1 %).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Minimum spread for a reciprocal pair (`A/B` vs `B/A`).
    pub cross_currency_threshold: f64,
    /// Minimum spread for a three-leg cycle.
    pub triangular_threshold: f64,
    /// Maximum opportunities turned into signals per detection pass.
    pub max_signals_per_cycle: usize,
    /// Capacity of the in-memory signal history.
    pub signal_memory_limit: usize,
    pub severity_thresholds: SeverityThresholds,
    /// Maximum age of a cached price allowed into a detection pass.
    pub freshness_window_ms: u64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            cross_currency_threshold: 0.1,
            triangular_threshold: 0.2,
            max_signals_per_cycle: 5,
            signal_memory_limit: 100,
            severity_thresholds: SeverityThresholds::default(),
            freshness_window_ms: 500,
        }
    }
}

/// Reasons a [`Thresholds`] value is rejected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ThresholdsError {
    #[error("{field} must be a finite number")]
    NotFinite { field: &'static str },
    #[error("{field} must not be negative")]
    Negative { field: &'static str },
    #[error("{field} must be at least 1")]
    ZeroCapacity { field: &'static str },
    #[error("severity high threshold ({high}) is below medium ({medium})")]
    SeverityOrder { high: f64, medium: f64 },
}

impl Thresholds {
    /// The freshness window as a duration.
    pub fn freshness_window(&self) -> time::Duration {
        time::Duration::milliseconds(i64::try_from(self.freshness_window_ms).unwrap_or(i64::MAX))
    }

    /// Check that every field holds a usable value.
    pub fn validate(&self) -> Result<(), ThresholdsError> {
        let percentages = [
            ("cross_currency_threshold", self.cross_currency_threshold),
            ("triangular_threshold", self.triangular_threshold),
            ("severity_thresholds.high", self.severity_thresholds.high),
            ("severity_thresholds.medium", self.severity_thresholds.medium),
        ];
        for (field, value) in percentages {
            if !value.is_finite() {
                return Err(ThresholdsError::NotFinite { field });
            }
            if value < 0.0 {
                return Err(ThresholdsError::Negative { field });
            }
        }
        if self.max_signals_per_cycle == 0 {
            return Err(ThresholdsError::ZeroCapacity {
                field: "max_signals_per_cycle",
            });
        }
        if self.signal_memory_limit == 0 {
            return Err(ThresholdsError::ZeroCapacity {
                field: "signal_memory_limit",
            });
        }
        let SeverityThresholds { high, medium } = self.severity_thresholds;
        if high < medium {
            return Err(ThresholdsError::SeverityOrder { high, medium });
        }
        Ok(())
    }

    /// Return a copy with the fields present in `patch` replaced.
    ///
    /// The result is validated; `self` is left untouched on error.
    pub fn patched(&self, patch: &ThresholdsPatch) -> Result<Self, ThresholdsError> {
        let mut next = *self;
        if let Some(v) = patch.cross_currency_threshold {
            next.cross_currency_threshold = v;
        }
        if let Some(v) = patch.triangular_threshold {
            next.triangular_threshold = v;
        }
        if let Some(v) = patch.max_signals_per_cycle {
            next.max_signals_per_cycle = v;
        }
        if let Some(v) = patch.signal_memory_limit {
            next.signal_memory_limit = v;
        }
        if let Some(severity) = &patch.severity_thresholds {
            if let Some(high) = severity.high {
                next.severity_thresholds.high = high;
            }
            if let Some(medium) = severity.medium {
                next.severity_thresholds.medium = medium;
            }
        }
        if let Some(v) = patch.freshness_window_ms {
            next.freshness_window_ms = v;
        }
        next.validate()?;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::thresholds::SeverityThresholdsPatch;

    #[test]
    fn test_defaults_are_valid() {
        let thresholds = Thresholds::default();
        assert!(thresholds.validate().is_ok());
        assert_eq!(thresholds.max_signals_per_cycle, 5);
        assert_eq!(thresholds.signal_memory_limit, 100);
        assert_eq!(thresholds.freshness_window(), time::Duration::milliseconds(500));
    }

    #[test]
    fn test_patch_only_touches_given_fields() {
        let patch = ThresholdsPatch {
            triangular_threshold: Some(0.3),
            severity_thresholds: Some(SeverityThresholdsPatch {
                high: Some(0.8),
                medium: None,
            }),
            ..Default::default()
        };
        let next = Thresholds::default().patched(&patch).unwrap();
        assert_eq!(next.triangular_threshold, 0.3);
        assert_eq!(next.severity_thresholds.high, 0.8);
        assert_eq!(next.severity_thresholds.medium, 0.2);
        assert_eq!(next.cross_currency_threshold, 0.1);
    }

    #[test]
    fn test_invalid_patch_is_rejected() {
        let patch = ThresholdsPatch {
            signal_memory_limit: Some(0),
            ..Default::default()
        };
        assert_eq!(
            Thresholds::default().patched(&patch),
            Err(ThresholdsError::ZeroCapacity {
                field: "signal_memory_limit"
            })
        );

        let patch = ThresholdsPatch {
            severity_thresholds: Some(SeverityThresholdsPatch {
                high: Some(0.1),
                medium: None,
            }),
            ..Default::default()
        };
        assert!(matches!(
            Thresholds::default().patched(&patch),
            Err(ThresholdsError::SeverityOrder { .. })
        ));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let thresholds: Thresholds = serde_json::from_str(r#"{"cross_currency_threshold": 0.05}"#).unwrap();
        assert_eq!(thresholds.cross_currency_threshold, 0.05);
        assert_eq!(thresholds.triangular_threshold, 0.2);
    }
}
