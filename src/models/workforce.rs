//! Employees, teams and assignees.
//!
//! The HR and org-structure modules own these records; the roster only
//! reads them. A run schedules either individual employees or whole teams
//! ([`AssignmentMode`]); both are addressed through [`Assignee`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// An employee as seen by the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Employee {
    /// Unique employee identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Roles/skills held.
    #[serde(default)]
    pub roles: Vec<String>,
    /// Team membership.
    #[serde(default)]
    pub team_id: Option<String>,
    /// Branch membership.
    #[serde(default)]
    pub branch_id: Option<String>,
    /// Inactive employees are never scheduled.
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Employee {
    /// Creates an active employee with no roles.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            roles: Vec::new(),
            team_id: None,
            branch_id: None,
            active: true,
        }
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Adds a role.
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    /// Sets team membership.
    pub fn with_team(mut self, team_id: impl Into<String>) -> Self {
        self.team_id = Some(team_id.into());
        self
    }

    /// Sets branch membership.
    pub fn with_branch(mut self, branch_id: impl Into<String>) -> Self {
        self.branch_id = Some(branch_id.into());
        self
    }

    /// Whether the employee holds every listed role.
    pub fn has_roles(&self, required: &[String]) -> bool {
        required.iter().all(|r| self.roles.contains(r))
    }
}

/// A team that can be rostered as one unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    /// Unique team identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Branch the team belongs to.
    #[serde(default)]
    pub branch_id: Option<String>,
    /// Member employee IDs.
    #[serde(default)]
    pub members: Vec<String>,
    /// Roles the team covers as a unit.
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Team {
    /// Creates an empty team.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            branch_id: None,
            members: Vec::new(),
            roles: Vec::new(),
        }
    }

    /// Adds a member.
    pub fn with_member(mut self, employee_id: impl Into<String>) -> Self {
        self.members.push(employee_id.into());
        self
    }

    /// Adds a covered role.
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    /// Sets the branch.
    pub fn with_branch(mut self, branch_id: impl Into<String>) -> Self {
        self.branch_id = Some(branch_id.into());
        self
    }
}

/// Who holds a slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Assignee {
    Employee(String),
    Team(String),
}

impl Assignee {
    /// Underlying employee or team ID.
    pub fn id(&self) -> &str {
        match self {
            Assignee::Employee(id) | Assignee::Team(id) => id,
        }
    }

    /// Whether this is a team assignee.
    pub fn is_team(&self) -> bool {
        matches!(self, Assignee::Team(_))
    }
}

impl fmt::Display for Assignee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Assignee::Employee(id) => write!(f, "employee:{id}"),
            Assignee::Team(id) => write!(f, "team:{id}"),
        }
    }
}

/// Whether a run rosters individuals or teams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentMode {
    #[default]
    Employee,
    Team,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_roles() {
        let e = Employee::new("e1").with_role("nurse").with_role("icu");
        assert!(e.has_roles(&["nurse".into()]));
        assert!(e.has_roles(&[]));
        assert!(!e.has_roles(&["surgeon".into()]));
    }

    #[test]
    fn test_assignee_ordering_and_display() {
        let a = Assignee::Employee("a".into());
        let b = Assignee::Employee("b".into());
        assert!(a < b);
        assert_eq!(a.to_string(), "employee:a");
        assert_eq!(Assignee::Team("t1".into()).id(), "t1");
    }

    #[test]
    fn test_assignee_serde() {
        let json = serde_json::to_string(&Assignee::Team("t1".into())).unwrap();
        assert_eq!(json, r#"{"kind":"team","id":"t1"}"#);
    }
}
