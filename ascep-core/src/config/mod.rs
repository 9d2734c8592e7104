//! Runtime configuration shared between the engine and the server.
//!
//! File loading lives in the server crate; this module only holds the
//! live, watchable values.

mod config_store;

pub use config_store::{ConfigStore, ConfigWatcher};

use ascep_sdk::config::Thresholds;

/// Live detection thresholds.
pub type ThresholdsStore = ConfigStore<Thresholds>;
