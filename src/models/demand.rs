//! Demand requirements.
//!
//! A requirement states how many people a shift template needs on a given
//! weekday, optionally restricted to roles, a team or a branch, and to an
//! effective date range.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// Headcount demand for one template on one weekday.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemandRequirement {
    /// Referenced shift template.
    pub template_id: String,
    /// Weekday the demand applies to.
    pub weekday: Weekday,
    /// Number of slots to fill.
    pub headcount: u32,
    /// Roles every assignee must hold.
    #[serde(default)]
    pub required_roles: Vec<String>,
    /// Optional team restriction.
    #[serde(default)]
    pub team_id: Option<String>,
    /// Optional branch restriction.
    #[serde(default)]
    pub branch_id: Option<String>,
    /// First date the requirement applies (inclusive).
    #[serde(default)]
    pub effective_from: Option<NaiveDate>,
    /// Last date the requirement applies (inclusive).
    #[serde(default)]
    pub effective_to: Option<NaiveDate>,
}

impl DemandRequirement {
    /// Creates a requirement.
    pub fn new(template_id: impl Into<String>, weekday: Weekday, headcount: u32) -> Self {
        Self {
            template_id: template_id.into(),
            weekday,
            headcount,
            required_roles: Vec::new(),
            team_id: None,
            branch_id: None,
            effective_from: None,
            effective_to: None,
        }
    }

    /// Same requirement for every day of the week.
    pub fn every_day(template_id: impl Into<String>, headcount: u32) -> Vec<Self> {
        let template_id = template_id.into();
        [
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
            Weekday::Sat,
            Weekday::Sun,
        ]
        .into_iter()
        .map(|day| Self::new(template_id.clone(), day, headcount))
        .collect()
    }

    /// Adds a required role.
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.required_roles.push(role.into());
        self
    }

    /// Restricts to a team.
    pub fn with_team(mut self, team_id: impl Into<String>) -> Self {
        self.team_id = Some(team_id.into());
        self
    }

    /// Restricts to a branch.
    pub fn with_branch(mut self, branch_id: impl Into<String>) -> Self {
        self.branch_id = Some(branch_id.into());
        self
    }

    /// Sets the effective date range.
    pub fn effective(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.effective_from = from;
        self.effective_to = to;
        self
    }

    /// Whether the requirement generates slots on `date`.
    pub fn applies_on(&self, date: NaiveDate) -> bool {
        if date.weekday() != self.weekday {
            return false;
        }
        if self.effective_from.is_some_and(|from| date < from) {
            return false;
        }
        if self.effective_to.is_some_and(|to| date > to) {
            return false;
        }
        true
    }
}
