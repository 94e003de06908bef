//! Scheduling problem definition.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{
    Assignee, Assignment, AssignmentMode, DemandRequirement, Employee, EmployeeAvailability,
    RuleException, ShiftTemplate, Team,
};
use crate::rules::{PriorContext, RuleSet, SlotRequirement};

/// Everything a strategy needs to roster one horizon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleProblem {
    pub tenant_id: String,
    /// First day (inclusive).
    pub week_start: NaiveDate,
    /// Last day (inclusive).
    pub week_end: NaiveDate,
    #[serde(default)]
    pub mode: AssignmentMode,
    #[serde(default)]
    pub employees: Vec<Employee>,
    #[serde(default)]
    pub teams: Vec<Team>,
    #[serde(default)]
    pub templates: Vec<ShiftTemplate>,
    #[serde(default)]
    pub demand: Vec<DemandRequirement>,
    #[serde(default)]
    pub availability: Vec<EmployeeAvailability>,
    #[serde(default)]
    pub exceptions: Vec<RuleException>,
    pub rule_set: RuleSet,
    #[serde(default)]
    pub prior: PriorContext,
    /// Assignments already on the week. Locked ones are fixed givens; the
    /// manual strategy evaluates all of them.
    #[serde(default)]
    pub existing: Vec<Assignment>,
    /// Date exceptions are judged against.
    pub as_of: NaiveDate,
}

impl ScheduleProblem {
    /// Creates an empty problem; `as_of` defaults to `week_start`.
    pub fn new(
        tenant_id: impl Into<String>,
        week_start: NaiveDate,
        week_end: NaiveDate,
        rule_set: RuleSet,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            week_start,
            week_end,
            mode: AssignmentMode::Employee,
            employees: Vec::new(),
            teams: Vec::new(),
            templates: Vec::new(),
            demand: Vec::new(),
            availability: Vec::new(),
            exceptions: Vec::new(),
            rule_set,
            prior: PriorContext::default(),
            existing: Vec::new(),
            as_of: week_start,
        }
    }

    pub fn with_mode(mut self, mode: AssignmentMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_employee(mut self, employee: Employee) -> Self {
        self.employees.push(employee);
        self
    }

    pub fn with_employees(mut self, employees: impl IntoIterator<Item = Employee>) -> Self {
        self.employees.extend(employees);
        self
    }

    pub fn with_team(mut self, team: Team) -> Self {
        self.teams.push(team);
        self
    }

    pub fn with_template(mut self, template: ShiftTemplate) -> Self {
        self.templates.push(template);
        self
    }

    pub fn with_demand(mut self, demand: impl IntoIterator<Item = DemandRequirement>) -> Self {
        self.demand.extend(demand);
        self
    }

    pub fn with_availability(
        mut self,
        entries: impl IntoIterator<Item = EmployeeAvailability>,
    ) -> Self {
        self.availability.extend(entries);
        self
    }

    pub fn with_exception(mut self, exception: RuleException) -> Self {
        self.exceptions.push(exception);
        self
    }

    pub fn with_prior(mut self, prior: PriorContext) -> Self {
        self.prior = prior;
        self
    }

    pub fn with_existing(mut self, assignments: impl IntoIterator<Item = Assignment>) -> Self {
        self.existing.extend(assignments);
        self
    }

    pub fn with_as_of(mut self, as_of: NaiveDate) -> Self {
        self.as_of = as_of;
        self
    }

    pub fn template(&self, id: &str) -> Option<&ShiftTemplate> {
        self.templates.iter().find(|t| t.id == id)
    }

    pub fn employee(&self, id: &str) -> Option<&Employee> {
        self.employees.iter().find(|e| e.id == id)
    }

    pub fn team(&self, id: &str) -> Option<&Team> {
        self.teams.iter().find(|t| t.id == id)
    }

    /// Days in the horizon, in order.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.week_start
            .iter_days()
            .take_while(move |d| *d <= self.week_end)
    }

    /// Assignees that can be rostered in this mode.
    pub fn pool(&self) -> Vec<Assignee> {
        match self.mode {
            AssignmentMode::Employee => self
                .employees
                .iter()
                .filter(|e| e.active)
                .map(|e| Assignee::Employee(e.id.clone()))
                .collect(),
            AssignmentMode::Team => self
                .teams
                .iter()
                .map(|t| Assignee::Team(t.id.clone()))
                .collect(),
        }
    }

    /// Static eligibility: activity, scope and roles.
    ///
    /// Availability and rule limits are judged later by the rule engine.
    pub fn is_eligible(&self, assignee: &Assignee, req: &SlotRequirement) -> bool {
        match assignee {
            Assignee::Employee(id) => self.employee(id).is_some_and(|e| {
                e.active
                    && e.has_roles(&req.roles)
                    && scope_matches(&req.team_id, &e.team_id)
                    && scope_matches(&req.branch_id, &e.branch_id)
            }),
            Assignee::Team(id) => self.team(id).is_some_and(|team| {
                req.team_id.as_ref().map_or(true, |t| t == &team.id)
                    && scope_matches(&req.branch_id, &team.branch_id)
                    && req.roles.iter().all(|role| {
                        team.roles.contains(role)
                            || team.members.iter().any(|m| {
                                self.employee(m)
                                    .is_some_and(|e| e.active && e.roles.contains(role))
                            })
                    })
            }),
        }
    }

    /// Eligible assignees for a requirement, in pool order.
    pub fn eligible(&self, req: &SlotRequirement) -> Vec<Assignee> {
        self.pool()
            .into_iter()
            .filter(|a| self.is_eligible(a, req))
            .collect()
    }
}

fn scope_matches(required: &Option<String>, actual: &Option<String>) -> bool {
    match required {
        None => true,
        Some(r) => actual.as_ref() == Some(r),
    }
}
