use ascep_sdk::objects::{CreateRuleRequest, PatternKind, RuleAction, RuleObject, UpdateRuleRequest};
use serde_json::{Map, Value};
use time::OffsetDateTime;

use super::ValidationError;

pub type RuleId = u64;

/// Durable store key holding every rule, one field per rule id.
pub const RULES_KEY: &str = "cep_rules";

pub const PRICE_CHANGE_THRESHOLD: &str = "price_change_threshold";
pub const VOLUME_THRESHOLD: &str = "volume_threshold";
pub const SPREAD_THRESHOLD: &str = "spread_threshold";
pub const CUSTOM_CONDITION: &str = "custom_condition";

const NUMERIC_CONDITIONS: [&str; 3] = [PRICE_CHANGE_THRESHOLD, VOLUME_THRESHOLD, SPREAD_THRESHOLD];

/// A registered pattern + action pair.
///
/// Trigger bookkeeping is only reachable through [`Rule::record_trigger`],
/// so `trigger_count` never decreases.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub id: RuleId,
    pub name: String,
    pub pattern: PatternKind,
    pub conditions: Map<String, Value>,
    pub action: RuleAction,
    pub enabled: bool,
    pub created_at: OffsetDateTime,
    last_triggered_at: Option<OffsetDateTime>,
    trigger_count: u64,
}

/// Validated input for registering a rule.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleDraft {
    name: String,
    pattern: PatternKind,
    conditions: Map<String, Value>,
    action: RuleAction,
    enabled: bool,
}

/// Field-wise update. Validated against the rule it is applied to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RulePatch {
    pub name: Option<String>,
    pub pattern: Option<PatternKind>,
    pub conditions: Option<Map<String, Value>>,
    pub action: Option<RuleAction>,
    pub enabled: Option<bool>,
}

#[derive(Debug, thiserror::Error)]
pub enum RuleRecordError {
    #[error("malformed rule record: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid rule record: {0}")]
    Validation(#[from] ValidationError),
}

fn validate_name(name: &str) -> Result<String, ValidationError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyRuleName);
    }
    Ok(name.to_owned())
}

/// Known numeric keys must hold finite, non-negative numbers. `custom`
/// rules need a non-empty `custom_condition` string.
pub fn validate_conditions(
    pattern: PatternKind,
    conditions: &Map<String, Value>,
) -> Result<(), ValidationError> {
    for key in NUMERIC_CONDITIONS {
        if let Some(value) = conditions.get(key) {
            match value.as_f64() {
                Some(v) if v.is_finite() && v >= 0.0 => {}
                _ => return Err(ValidationError::InvalidCondition { key }),
            }
        }
    }
    let custom = conditions.get(CUSTOM_CONDITION);
    if custom.is_some_and(|value| !value.is_string()) {
        return Err(ValidationError::MissingCondition);
    }
    if pattern == PatternKind::Custom {
        match custom.and_then(Value::as_str) {
            Some(s) if !s.is_empty() => {}
            _ => return Err(ValidationError::MissingCondition),
        }
    }
    Ok(())
}

impl TryFrom<CreateRuleRequest> for RuleDraft {
    type Error = ValidationError;

    fn try_from(request: CreateRuleRequest) -> Result<Self, Self::Error> {
        let name = validate_name(&request.name)?;
        validate_conditions(request.pattern, &request.conditions)?;
        Ok(Self {
            name,
            pattern: request.pattern,
            conditions: request.conditions,
            action: request.action,
            enabled: request.enabled,
        })
    }
}

impl From<UpdateRuleRequest> for RulePatch {
    fn from(request: UpdateRuleRequest) -> Self {
        Self {
            name: request.name,
            pattern: request.pattern,
            conditions: request.conditions,
            action: request.action,
            enabled: request.enabled,
        }
    }
}

impl Rule {
    pub fn new(id: RuleId, draft: RuleDraft, created_at: OffsetDateTime) -> Self {
        Self {
            id,
            name: draft.name,
            pattern: draft.pattern,
            conditions: draft.conditions,
            action: draft.action,
            enabled: draft.enabled,
            created_at,
            last_triggered_at: None,
            trigger_count: 0,
        }
    }

    pub fn trigger_count(&self) -> u64 {
        self.trigger_count
    }

    pub fn last_triggered_at(&self) -> Option<OffsetDateTime> {
        self.last_triggered_at
    }

    pub fn record_trigger(&mut self, at: OffsetDateTime) {
        self.last_triggered_at = Some(at);
        self.trigger_count = self.trigger_count.saturating_add(1);
    }

    /// A numeric condition, or `default` when absent.
    pub fn threshold(&self, key: &str, default: f64) -> f64 {
        self.conditions
            .get(key)
            .and_then(Value::as_f64)
            .unwrap_or(default)
    }

    pub fn custom_condition(&self) -> Option<&str> {
        self.conditions
            .get(CUSTOM_CONDITION)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Apply `patch` atomically: on error the rule is unchanged.
    pub fn apply(&mut self, patch: RulePatch) -> Result<(), ValidationError> {
        let name = match &patch.name {
            Some(name) => validate_name(name)?,
            None => self.name.clone(),
        };
        let pattern = patch.pattern.unwrap_or(self.pattern);
        let conditions = patch.conditions.unwrap_or_else(|| self.conditions.clone());
        validate_conditions(pattern, &conditions)?;

        self.name = name;
        self.pattern = pattern;
        self.conditions = conditions;
        if let Some(action) = patch.action {
            self.action = action;
        }
        if let Some(enabled) = patch.enabled {
            self.enabled = enabled;
        }
        Ok(())
    }

    /// Field name under [`RULES_KEY`].
    pub fn record_field(id: RuleId) -> String {
        id.to_string()
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&RuleObject::from(self))
    }

    pub fn decode(raw: &str) -> Result<Self, RuleRecordError> {
        let object: RuleObject = serde_json::from_str(raw)?;
        Ok(Self::try_from(object)?)
    }
}

impl From<&Rule> for RuleObject {
    fn from(rule: &Rule) -> Self {
        Self {
            id: rule.id,
            name: rule.name.clone(),
            pattern: rule.pattern,
            conditions: rule.conditions.clone(),
            action: rule.action,
            enabled: rule.enabled,
            created_at: rule.created_at,
            last_triggered_at: rule.last_triggered_at,
            trigger_count: rule.trigger_count,
        }
    }
}

impl TryFrom<RuleObject> for Rule {
    type Error = ValidationError;

    fn try_from(object: RuleObject) -> Result<Self, Self::Error> {
        let name = validate_name(&object.name)?;
        validate_conditions(object.pattern, &object.conditions)?;
        Ok(Self {
            id: object.id,
            name,
            pattern: object.pattern,
            conditions: object.conditions,
            action: object.action,
            enabled: object.enabled,
            created_at: object.created_at,
            last_triggered_at: object.last_triggered_at,
            trigger_count: object.trigger_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(pattern: PatternKind, conditions: Value) -> CreateRuleRequest {
        CreateRuleRequest {
            name: "  test rule ".into(),
            pattern,
            conditions: conditions.as_object().cloned().unwrap_or_default(),
            action: RuleAction::SendAlert,
            enabled: true,
        }
    }

    #[test]
    fn test_draft_validation() {
        let draft = RuleDraft::try_from(request(
            PatternKind::PriceSpike,
            json!({"price_change_threshold": 3}),
        ))
        .unwrap();
        let rule = Rule::new(1, draft, OffsetDateTime::UNIX_EPOCH);
        assert_eq!(rule.name, "test rule");
        assert_eq!(rule.threshold(PRICE_CHANGE_THRESHOLD, 5.0), 3.0);
        assert_eq!(rule.threshold(VOLUME_THRESHOLD, 1_000_000.0), 1_000_000.0);

        assert_eq!(
            RuleDraft::try_from(request(
                PatternKind::VolumeSurge,
                json!({"volume_threshold": "lots"})
            )),
            Err(ValidationError::InvalidCondition {
                key: VOLUME_THRESHOLD
            })
        );
        assert_eq!(
            RuleDraft::try_from(request(PatternKind::Custom, json!({}))),
            Err(ValidationError::MissingCondition)
        );
        let mut blank = request(PatternKind::PriceSpike, json!({}));
        blank.name = "   ".into();
        assert_eq!(RuleDraft::try_from(blank), Err(ValidationError::EmptyRuleName));
    }

    #[test]
    fn test_patch_is_atomic() {
        let draft = RuleDraft::try_from(request(PatternKind::PriceSpike, json!({}))).unwrap();
        let mut rule = Rule::new(1, draft, OffsetDateTime::UNIX_EPOCH);
        let before = rule.clone();

        // switching to custom without a condition must fail and leave the rule alone
        let res = rule.apply(RulePatch {
            name: Some("renamed".into()),
            pattern: Some(PatternKind::Custom),
            ..Default::default()
        });
        assert_eq!(res, Err(ValidationError::MissingCondition));
        assert_eq!(rule, before);

        rule.apply(RulePatch {
            enabled: Some(false),
            action: Some(RuleAction::LogEvent),
            ..Default::default()
        })
        .unwrap();
        assert!(!rule.enabled);
        assert_eq!(rule.action, RuleAction::LogEvent);
    }

    #[test]
    fn test_encode_decode_keeps_bookkeeping() {
        let draft = RuleDraft::try_from(request(
            PatternKind::Custom,
            json!({"custom_condition": "EUR"}),
        ))
        .unwrap();
        let mut rule = Rule::new(9, draft, time::macros::datetime!(2024-01-01 00:00 UTC));
        rule.record_trigger(time::macros::datetime!(2024-01-02 00:00 UTC));
        rule.record_trigger(time::macros::datetime!(2024-01-03 00:00 UTC));

        let decoded = Rule::decode(&rule.encode().unwrap()).unwrap();
        assert_eq!(decoded, rule);
        assert_eq!(decoded.trigger_count(), 2);
        assert!(Rule::decode("{not json").is_err());
    }
}
