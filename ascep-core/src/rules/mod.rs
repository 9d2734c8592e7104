//! Complex event processing rules.

pub mod book;
pub mod engine;
pub mod matchers;

pub use book::{RuleBook, RuleBookReader};
pub use engine::RuleEngine;
pub use matchers::{EvaluationError, MatchContext};
