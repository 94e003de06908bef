//! Input validation for rostering problems.
//!
//! Checks structural integrity of a [`ScheduleProblem`] before a run is
//! started. Detects:
//! - Duplicate IDs (employees, teams, templates)
//! - Demand referencing unknown shift templates
//! - Inverted horizons
//! - Empty rule sets
//! - Demand no active assignee could ever fill
//!
//! Every problem is reported; callers turn the list into
//! `SchedulerError::InfeasibleInput`.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::rules::SlotRequirement;
use crate::scheduler::ScheduleProblem;

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A validation error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationErrorKind {
    /// Two entities share the same ID.
    DuplicateId,
    /// Demand references a template that doesn't exist.
    UnknownTemplate,
    /// Horizon end precedes its start.
    InvalidHorizon,
    /// The rule set has no rules.
    EmptyRuleSet,
    /// Demand exists that no active assignee is eligible for.
    NoEligibleEmployees,
}

impl ValidationError {
    pub fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Validates a rostering problem.
///
/// Checks:
/// 1. `week_end >= week_start`
/// 2. No duplicate employee, team or template IDs
/// 3. Every demand row references a known template
/// 4. The rule set is not empty
/// 5. Every demand row that applies in the horizon has at least one
///    eligible assignee (roles and team/branch scope)
///
/// # Returns
/// `Ok(())` if all checks pass, `Err(errors)` with all detected issues.
pub fn validate_problem(problem: &ScheduleProblem) -> ValidationResult {
    let mut errors = Vec::new();

    if problem.week_end < problem.week_start {
        errors.push(ValidationError::new(
            ValidationErrorKind::InvalidHorizon,
            format!(
                "Horizon ends ({}) before it starts ({})",
                problem.week_end, problem.week_start
            ),
        ));
    }

    check_unique(problem.employees.iter().map(|e| e.id.as_str()), "employee", &mut errors);
    check_unique(problem.teams.iter().map(|t| t.id.as_str()), "team", &mut errors);
    check_unique(problem.templates.iter().map(|t| t.id.as_str()), "template", &mut errors);

    let template_ids: HashSet<&str> = problem.templates.iter().map(|t| t.id.as_str()).collect();
    let mut reported: HashSet<&str> = HashSet::new();
    for req in &problem.demand {
        if !template_ids.contains(req.template_id.as_str()) && reported.insert(req.template_id.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::UnknownTemplate,
                format!("Demand references unknown template '{}'", req.template_id),
            ));
        }
    }

    if problem.rule_set.is_empty() {
        errors.push(ValidationError::new(
            ValidationErrorKind::EmptyRuleSet,
            format!("Rule set '{}' has no rules", problem.rule_set.id),
        ));
    }

    for req in &problem.demand {
        let Some(template) = problem.template(&req.template_id) else {
            continue;
        };
        if req.headcount == 0 || !problem.dates().any(|d| req.applies_on(d)) {
            continue;
        }
        let requirement = SlotRequirement {
            roles: req.required_roles.clone(),
            team_id: req.team_id.clone().or_else(|| template.team_id.clone()),
            branch_id: req.branch_id.clone().or_else(|| template.branch_id.clone()),
        };
        if problem.eligible(&requirement).is_empty() {
            errors.push(ValidationError::new(
                ValidationErrorKind::NoEligibleEmployees,
                format!(
                    "No eligible assignee for '{}' on {:?} (roles: [{}])",
                    req.template_id,
                    req.weekday,
                    req.required_roles.join(", ")
                ),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_unique<'a>(
    ids: impl Iterator<Item = &'a str>,
    entity: &str,
    errors: &mut Vec<ValidationError>,
) {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate {entity} ID: {id}"),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DemandRequirement, Employee, ShiftCategory, ShiftTemplate};
    use crate::rules::{RuleDefaults, RuleSet};
    use chrono::{NaiveDate, NaiveTime, Weekday};

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
    }

    fn day_template() -> ShiftTemplate {
        ShiftTemplate::new(
            "day",
            NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
            ShiftCategory::Day,
        )
    }

    fn valid_problem() -> ScheduleProblem {
        ScheduleProblem::new("t1", d(3), d(9), RuleSet::standard("std", "t1", &RuleDefaults::default()))
            .with_employee(Employee::new("a").with_role("nurse"))
            .with_template(day_template())
            .with_demand(DemandRequirement::every_day("day", 1))
    }

    fn kinds(result: ValidationResult) -> Vec<ValidationErrorKind> {
        result.unwrap_err().into_iter().map(|e| e.kind).collect()
    }

    #[test]
    fn test_valid_input() {
        assert!(validate_problem(&valid_problem()).is_ok());
    }

    #[test]
    fn test_duplicate_ids() {
        let p = valid_problem()
            .with_employee(Employee::new("a"))
            .with_template(day_template());
        let kinds = kinds(validate_problem(&p));
        assert_eq!(kinds.iter().filter(|k| **k == ValidationErrorKind::DuplicateId).count(), 2);
    }

    #[test]
    fn test_unknown_template_reported_once() {
        let p = valid_problem().with_demand(DemandRequirement::every_day("ghost", 1));
        assert_eq!(kinds(validate_problem(&p)), vec![ValidationErrorKind::UnknownTemplate]);
    }

    #[test]
    fn test_inverted_horizon() {
        let mut p = valid_problem();
        p.week_end = d(1);
        assert!(kinds(validate_problem(&p)).contains(&ValidationErrorKind::InvalidHorizon));
    }

    #[test]
    fn test_empty_rule_set() {
        let mut p = valid_problem();
        p.rule_set = RuleSet::new("empty", "t1");
        assert_eq!(kinds(validate_problem(&p)), vec![ValidationErrorKind::EmptyRuleSet]);
    }

    #[test]
    fn test_no_eligible_employees() {
        let p = valid_problem()
            .with_demand(vec![DemandRequirement::new("day", Weekday::Tue, 1).with_role("surgeon")]);
        let errors = validate_problem(&p).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ValidationErrorKind::NoEligibleEmployees);
        assert!(errors[0].message.contains("surgeon"));
    }

    #[test]
    fn test_out_of_horizon_demand_ignored() {
        let p = valid_problem().with_demand(vec![DemandRequirement::new("day", Weekday::Tue, 1)
            .with_role("surgeon")
            .effective(Some(d(20)), None)]);
        assert!(validate_problem(&p).is_ok());
    }
}
