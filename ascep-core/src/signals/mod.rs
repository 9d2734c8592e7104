//! Signal creation and retained history.

pub mod factory;
pub mod history;

pub use factory::{RULE_HIGH_SEVERITY_TRIGGERS, SignalFactory, SignalSource};
pub use history::{SignalHistory, SignalHistoryReader};
