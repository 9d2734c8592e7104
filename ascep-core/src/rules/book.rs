use std::collections::BTreeMap;
use std::sync::Arc;

use ascep_sdk::objects::RuleStatsResponse;
use parking_lot::{RwLock, RwLockWriteGuard};

use crate::entities::{Rule, RuleId};

/// Registered rules keyed by id. Written only by the rule engine.
pub struct RuleBook {
    inner: Arc<RwLock<BTreeMap<RuleId, Rule>>>,
}

/// Read-only view for API handlers.
#[derive(Clone)]
pub struct RuleBookReader {
    inner: Arc<RwLock<BTreeMap<RuleId, Rule>>>,
}

impl RuleBook {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    pub fn reader(&self) -> RuleBookReader {
        RuleBookReader {
            inner: Arc::clone(&self.inner),
        }
    }

    pub(crate) fn write(&mut self) -> RwLockWriteGuard<'_, BTreeMap<RuleId, Rule>> {
        self.inner.write()
    }
}

impl Default for RuleBook {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleBookReader {
    /// All rules in id order.
    pub fn list(&self) -> Vec<Rule> {
        self.inner.read().values().cloned().collect()
    }

    pub fn get(&self, id: RuleId) -> Option<Rule> {
        self.inner.read().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn stats(&self) -> RuleStatsResponse {
        let rules = self.inner.read();
        let total_rules = rules.len();
        let active_rules = rules.values().filter(|r| r.trigger_count() > 0).count();
        let total_triggers: u64 = rules.values().map(Rule::trigger_count).sum();
        let average_triggers_per_rule = if total_rules == 0 {
            0.0
        } else {
            total_triggers as f64 / total_rules as f64
        };
        RuleStatsResponse {
            total_rules,
            active_rules,
            total_triggers,
            average_triggers_per_rule,
        }
    }
}
