//! Declarative roster rules and the rule engine.
//!
//! Tenants store rule sets as JSON definitions (`id`, `kind`, `hard`,
//! `weight`, `params`). They are parsed once per run into typed
//! [`RuleKind`] variants so evaluation never dispatches on strings.
//!
//! # Usage
//!
//! ```
//! use u_roster::rules::{RuleDefaults, RuleSet};
//!
//! let json = r#"{
//!     "id": "default", "tenant_id": "t1", "name": "Default", "version": 1,
//!     "rules": [
//!         { "id": "nights", "kind": "max_night_shifts_per_week" },
//!         { "id": "rest", "kind": "min_rest_hours", "params": { "hours": 11 } }
//!     ]
//! }"#;
//! let rules = RuleSet::from_json(json, &RuleDefaults::default()).unwrap();
//! assert_eq!(rules.len(), 2);
//! ```
//!
//! # Built-in checks
//!
//! Double-booking (`no_overlap`) and availability (`availability`) are
//! always enforced as hard checks, whether or not the rule set lists them.
//! Exceptions may waive them by those IDs.

mod context;
mod engine;

pub use context::{EvaluationContext, PriorContext, SlotRequirement};
pub use engine::{Evaluation, HardViolation, RuleEngine, SoftViolation};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// ID of the built-in double-booking check.
pub const NO_OVERLAP: &str = "no_overlap";
/// ID of the built-in availability check.
pub const AVAILABILITY: &str = "availability";
/// ID reported for unfilled demand.
pub const COVERAGE: &str = "coverage";

/// Engine-wide fallbacks for missing rule parameters, plus score weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDefaults {
    pub max_consecutive_shifts: u32,
    pub max_night_shifts_per_week: u32,
    pub min_rest_hours: f64,
    pub max_hours_per_week: f64,
    pub balance_tolerance: u32,
    /// Penalty per hard violation in the aggregate score.
    pub hard_penalty: f64,
    /// Penalty per unfilled demand slot.
    pub coverage_penalty: f64,
    /// Weight used when a definition omits one.
    pub soft_weight: f64,
}

impl Default for RuleDefaults {
    fn default() -> Self {
        Self {
            max_consecutive_shifts: 6,
            max_night_shifts_per_week: 2,
            min_rest_hours: 12.0,
            max_hours_per_week: 48.0,
            balance_tolerance: 1,
            hard_penalty: 1_000.0,
            coverage_penalty: 500.0,
            soft_weight: 1.0,
        }
    }
}

/// Typed rule kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleKind {
    /// At most `max_days` consecutive calendar days with a shift.
    MaxConsecutiveShifts { max_days: u32 },
    /// At most `max` night shifts per 7-day block of the horizon.
    MaxNightShiftsPerWeek { max: u32 },
    /// At least `hours` between the end of one shift and the next.
    MinRestHours { hours: f64 },
    /// Assignee must hold every role the slot requires.
    RequiredSkillMatch,
    /// At most `max_hours` scheduled per 7-day block.
    MaxHoursPerWeek { max_hours: f64 },
    /// Penalise shifts outside declared preferred windows.
    RespectPreferences,
    /// Keep the spread between most- and least-loaded assignees within
    /// `tolerance` shifts.
    BalancedWorkload { tolerance: u32 },
}

impl RuleKind {
    /// Parses a kind name with its raw parameters.
    ///
    /// Missing parameters fall back to `defaults`; present but malformed
    /// parameters are an error.
    pub fn parse(kind: &str, params: &Value, defaults: &RuleDefaults) -> Result<Self, RuleError> {
        let kind = kind.trim().to_ascii_lowercase().replace('-', "_");
        let parsed = match kind.as_str() {
            "max_consecutive_shifts" => RuleKind::MaxConsecutiveShifts {
                max_days: param_u32(params, "max_days", &kind)?
                    .unwrap_or(defaults.max_consecutive_shifts),
            },
            "max_night_shifts_per_week" => RuleKind::MaxNightShiftsPerWeek {
                max: param_u32(params, "max", &kind)?
                    .unwrap_or(defaults.max_night_shifts_per_week),
            },
            "min_rest_hours" | "min_rest_hours_between_shifts" => RuleKind::MinRestHours {
                hours: param_f64(params, "hours", &kind)?.unwrap_or(defaults.min_rest_hours),
            },
            "required_skill_match" => RuleKind::RequiredSkillMatch,
            "max_hours_per_week" => RuleKind::MaxHoursPerWeek {
                max_hours: param_f64(params, "max_hours", &kind)?
                    .unwrap_or(defaults.max_hours_per_week),
            },
            "respect_preferences" => RuleKind::RespectPreferences,
            "balanced_workload" => RuleKind::BalancedWorkload {
                tolerance: param_u32(params, "tolerance", &kind)?
                    .unwrap_or(defaults.balance_tolerance),
            },
            _ => return Err(RuleError::UnknownKind(kind)),
        };
        Ok(parsed)
    }
}

fn param_u32(params: &Value, key: &str, kind: &str) -> Result<Option<u32>, RuleError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .map(Some)
            .ok_or_else(|| RuleError::InvalidParameter {
                kind: kind.to_string(),
                param: key.to_string(),
            }),
    }
}

fn param_f64(params: &Value, key: &str, kind: &str) -> Result<Option<f64>, RuleError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_f64()
            .filter(|v| v.is_finite() && *v >= 0.0)
            .map(Some)
            .ok_or_else(|| RuleError::InvalidParameter {
                kind: kind.to_string(),
                param: key.to_string(),
            }),
    }
}

/// A typed rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Rule ID, unique within its set.
    pub id: String,
    /// Typed kind and parameters.
    #[serde(flatten)]
    pub kind: RuleKind,
    /// Hard rules make a candidate infeasible; soft rules cost score.
    pub hard: bool,
    /// Penalty multiplier for soft violations.
    pub weight: f64,
}

impl Rule {
    /// Creates a hard rule.
    pub fn hard(id: impl Into<String>, kind: RuleKind) -> Self {
        Self {
            id: id.into(),
            kind,
            hard: true,
            weight: 1.0,
        }
    }

    /// Creates a soft rule with a weight.
    pub fn soft(id: impl Into<String>, kind: RuleKind, weight: f64) -> Self {
        Self {
            id: id.into(),
            kind,
            hard: false,
            weight,
        }
    }
}

/// Raw rule definition as stored by the tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDefinition {
    pub id: String,
    pub kind: String,
    #[serde(default = "default_hard")]
    pub hard: bool,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub params: Value,
}

fn default_hard() -> bool {
    true
}

impl RuleDefinition {
    /// Converts into a typed rule.
    pub fn parse(&self, defaults: &RuleDefaults) -> Result<Rule, RuleError> {
        Ok(Rule {
            id: self.id.clone(),
            kind: RuleKind::parse(&self.kind, &self.params, defaults)?,
            hard: self.hard,
            weight: self.weight.unwrap_or(defaults.soft_weight),
        })
    }
}

/// Raw rule set as stored by the tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSetDefinition {
    pub id: String,
    pub tenant_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub rules: Vec<RuleDefinition>,
}

fn default_version() -> u32 {
    1
}

impl RuleSetDefinition {
    /// Parses every definition; duplicate IDs are rejected.
    pub fn parse(&self, defaults: &RuleDefaults) -> Result<RuleSet, RuleError> {
        let mut rules = Vec::with_capacity(self.rules.len());
        for def in &self.rules {
            if rules.iter().any(|r: &Rule| r.id == def.id) {
                return Err(RuleError::DuplicateId(def.id.clone()));
            }
            rules.push(def.parse(defaults)?);
        }
        Ok(RuleSet {
            id: self.id.clone(),
            tenant_id: self.tenant_id.clone(),
            name: self.name.clone(),
            version: self.version,
            rules,
        })
    }
}

/// Named, versioned, ordered collection of typed rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSet {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub version: u32,
    pub rules: Vec<Rule>,
}

impl RuleSet {
    /// Creates an empty rule set.
    pub fn new(id: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            tenant_id: tenant_id.into(),
            version: 1,
            rules: Vec::new(),
        }
    }

    /// Appends a rule.
    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Parses a JSON rule set definition.
    pub fn from_json(json: &str, defaults: &RuleDefaults) -> Result<Self, RuleError> {
        let def: RuleSetDefinition =
            serde_json::from_str(json).map_err(|e| RuleError::Malformed(e.to_string()))?;
        def.parse(defaults)
    }

    /// A typical rule set built from the engine defaults.
    pub fn standard(id: impl Into<String>, tenant_id: impl Into<String>, d: &RuleDefaults) -> Self {
        Self::new(id, tenant_id)
            .with_rule(Rule::hard(
                "max_nights",
                RuleKind::MaxNightShiftsPerWeek {
                    max: d.max_night_shifts_per_week,
                },
            ))
            .with_rule(Rule::hard(
                "min_rest",
                RuleKind::MinRestHours {
                    hours: d.min_rest_hours,
                },
            ))
            .with_rule(Rule::hard(
                "max_consecutive",
                RuleKind::MaxConsecutiveShifts {
                    max_days: d.max_consecutive_shifts,
                },
            ))
            .with_rule(Rule::hard("skills", RuleKind::RequiredSkillMatch))
            .with_rule(Rule::soft(
                "max_hours",
                RuleKind::MaxHoursPerWeek {
                    max_hours: d.max_hours_per_week,
                },
                1.0,
            ))
            .with_rule(Rule::soft("preferences", RuleKind::RespectPreferences, 2.0))
            .with_rule(Rule::soft(
                "balance",
                RuleKind::BalancedWorkload {
                    tolerance: d.balance_tolerance,
                },
                5.0,
            ))
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the set has no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Finds a rule by ID.
    pub fn rule(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == id)
    }

    /// The minimum-rest rule, preferring a hard one over a soft one.
    pub fn min_rest_rule(&self) -> Option<&Rule> {
        let mut rest = self
            .rules
            .iter()
            .filter(|r| matches!(r.kind, RuleKind::MinRestHours { .. }));
        let first = rest.next()?;
        if first.hard {
            return Some(first);
        }
        rest.find(|r| r.hard).or(Some(first))
    }
}

/// Rule parsing errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuleError {
    #[error("unknown rule kind '{0}'")]
    UnknownKind(String),
    #[error("rule kind '{kind}' has an invalid '{param}' parameter")]
    InvalidParameter { kind: String, param: String },
    #[error("duplicate rule id '{0}'")]
    DuplicateId(String),
    #[error("malformed rule set: {0}")]
    Malformed(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_params_use_defaults() {
        let d = RuleDefaults::default();
        let kind = RuleKind::parse("max_night_shifts_per_week", &Value::Null, &d).unwrap();
        assert_eq!(kind, RuleKind::MaxNightShiftsPerWeek { max: 2 });

        let kind = RuleKind::parse("min_rest_hours", &json!({}), &d).unwrap();
        assert_eq!(kind, RuleKind::MinRestHours { hours: 12.0 });
    }

    #[test]
    fn test_explicit_params() {
        let d = RuleDefaults::default();
        let kind = RuleKind::parse("max_consecutive_shifts", &json!({"max_days": 4}), &d).unwrap();
        assert_eq!(kind, RuleKind::MaxConsecutiveShifts { max_days: 4 });
        let kind = RuleKind::parse("Max-Hours-Per-Week", &json!({"max_hours": 38.5}), &d).unwrap();
        assert_eq!(kind, RuleKind::MaxHoursPerWeek { max_hours: 38.5 });
    }

    #[test]
    fn test_invalid_param_rejected() {
        let d = RuleDefaults::default();
        let err = RuleKind::parse("max_night_shifts_per_week", &json!({"max": "two"}), &d);
        assert!(matches!(err, Err(RuleError::InvalidParameter { .. })));
        let err = RuleKind::parse("min_rest_hours", &json!({"hours": -3}), &d);
        assert!(matches!(err, Err(RuleError::InvalidParameter { .. })));
    }

    #[test]
    fn test_unknown_kind() {
        let err = RuleKind::parse("max_coffee", &Value::Null, &RuleDefaults::default());
        assert_eq!(err, Err(RuleError::UnknownKind("max_coffee".into())));
    }

    #[test]
    fn test_from_json_defaults_hard_and_weight() {
        let json = r#"{
            "id": "rs1", "tenant_id": "t1",
            "rules": [
                { "id": "skills", "kind": "required_skill_match" },
                { "id": "pref", "kind": "respect_preferences", "hard": false, "weight": 3.0 }
            ]
        }"#;
        let set = RuleSet::from_json(json, &RuleDefaults::default()).unwrap();
        assert_eq!(set.version, 1);
        assert!(set.rule("skills").unwrap().hard);
        let pref = set.rule("pref").unwrap();
        assert!(!pref.hard);
        assert!((pref.weight - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let json = r#"{ "id": "rs1", "tenant_id": "t1", "rules": [
            { "id": "a", "kind": "required_skill_match" },
            { "id": "a", "kind": "min_rest_hours" }
        ]}"#;
        let err = RuleSet::from_json(json, &RuleDefaults::default()).unwrap_err();
        assert_eq!(err, RuleError::DuplicateId("a".into()));
    }

    #[test]
    fn test_standard_rule_set() {
        let set = RuleSet::standard("std", "t1", &RuleDefaults::default());
        assert_eq!(set.len(), 7);
        let rest = set.min_rest_rule().unwrap();
        assert!(rest.hard);
        assert_eq!(rest.kind, RuleKind::MinRestHours { hours: 12.0 });
    }

    #[test]
    fn test_typed_rule_serde() {
        let rule = Rule::hard("nights", RuleKind::MaxNightShiftsPerWeek { max: 3 });
        let value = serde_json::to_value(&rule).unwrap();
        assert_eq!(value["kind"], "max_night_shifts_per_week");
        assert_eq!(value["max"], 3);
        let back: Rule = serde_json::from_value(value).unwrap();
        assert_eq!(back, rule);
    }
}
