//! Configuration types shared by the engine and its config surface.
//!
//! Loading and file parsing live in the server crate; these are the
//! validated values the engine consumes.

mod thresholds;

pub use thresholds::{SeverityThresholds, Thresholds, ThresholdsError};
