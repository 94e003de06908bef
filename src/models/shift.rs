//! Shift template model.
//!
//! A template is a reusable shift definition (e.g. "Night 22:00-06:00")
//! referenced by demand requirements and assignments. Once a published
//! schedule references a template it is frozen; edits produce a new
//! version via [`ShiftTemplate::revise`].

use chrono::{Duration, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use super::ShiftWindow;

/// Shift category, used by night-shift rules and fairness weights.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftCategory {
    Day,
    Evening,
    Night,
    Custom(String),
}

impl ShiftCategory {
    /// Whether this category counts toward night-shift limits.
    #[inline]
    pub fn is_night(&self) -> bool {
        matches!(self, ShiftCategory::Night)
    }

    /// Short label for logs and conflict messages.
    pub fn label(&self) -> &str {
        match self {
            ShiftCategory::Day => "day",
            ShiftCategory::Evening => "evening",
            ShiftCategory::Night => "night",
            ShiftCategory::Custom(name) => name,
        }
    }
}

/// A reusable shift definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShiftTemplate {
    /// Unique template identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Wall-clock start.
    pub start: NaiveTime,
    /// Wall-clock end. `end <= start` means the shift crosses midnight.
    pub end: NaiveTime,
    /// Shift category.
    pub category: ShiftCategory,
    /// Optional team scope.
    #[serde(default)]
    pub team_id: Option<String>,
    /// Optional branch scope.
    #[serde(default)]
    pub branch_id: Option<String>,
    /// Ordering hint for slot iteration (higher = filled first).
    #[serde(default)]
    pub priority: i32,
    /// Template version; bumped by [`ShiftTemplate::revise`].
    #[serde(default = "default_version")]
    pub version: u32,
    /// Set once a published schedule references this template.
    #[serde(default)]
    pub published: bool,
}

fn default_version() -> u32 {
    1
}

impl ShiftTemplate {
    /// Creates a template.
    pub fn new(
        id: impl Into<String>,
        start: NaiveTime,
        end: NaiveTime,
        category: ShiftCategory,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            start,
            end,
            category,
            team_id: None,
            branch_id: None,
            priority: 0,
            version: 1,
            published: false,
        }
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Restricts the template to one team.
    pub fn with_team(mut self, team_id: impl Into<String>) -> Self {
        self.team_id = Some(team_id.into());
        self
    }

    /// Restricts the template to one branch.
    pub fn with_branch(mut self, branch_id: impl Into<String>) -> Self {
        self.branch_id = Some(branch_id.into());
        self
    }

    /// Sets the iteration priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Whether the shift ends on the following day.
    #[inline]
    pub fn crosses_midnight(&self) -> bool {
        self.end <= self.start
    }

    /// Shift length.
    pub fn duration(&self) -> Duration {
        let span = self.end - self.start;
        if self.crosses_midnight() {
            span + Duration::days(1)
        } else {
            span
        }
    }

    /// Concrete window of this shift on `date`.
    pub fn window_on(&self, date: NaiveDate) -> ShiftWindow {
        ShiftWindow::on_date(date, self.start, self.end)
    }

    /// Marks the template as referenced by a published schedule.
    pub fn publish(&mut self) {
        self.published = true;
    }

    /// Produces an edited copy.
    ///
    /// Unpublished templates are edited in place (same version); published
    /// ones yield a new unpublished version and stay untouched.
    pub fn revise(&self, edit: impl FnOnce(&mut ShiftTemplate)) -> ShiftTemplate {
        let mut next = self.clone();
        edit(&mut next);
        next.id = self.id.clone();
        if self.published {
            next.version = self.version + 1;
            next.published = false;
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, 0, 0).unwrap()
    }

    #[test]
    fn test_duration_same_day() {
        let tpl = ShiftTemplate::new("day", t(8), t(16), ShiftCategory::Day);
        assert!(!tpl.crosses_midnight());
        assert_eq!(tpl.duration(), Duration::hours(8));
    }

    #[test]
    fn test_duration_crossing_midnight() {
        let tpl = ShiftTemplate::new("night", t(22), t(6), ShiftCategory::Night);
        assert!(tpl.crosses_midnight());
        assert_eq!(tpl.duration(), Duration::hours(8));
        assert!(tpl.category.is_night());
    }

    #[test]
    fn test_revise_published_creates_new_version() {
        let mut tpl = ShiftTemplate::new("day", t(8), t(16), ShiftCategory::Day);
        tpl.publish();
        let next = tpl.revise(|t2| t2.end = t(17));
        assert_eq!(next.version, 2);
        assert!(!next.published);
        assert_eq!(tpl.end, t(16));
        assert_eq!(next.end, t(17));
    }

    #[test]
    fn test_revise_draft_keeps_version() {
        let tpl = ShiftTemplate::new("day", t(8), t(16), ShiftCategory::Day);
        let next = tpl.revise(|t2| t2.priority = 3);
        assert_eq!(next.version, 1);
        assert_eq!(next.priority, 3);
    }

    #[test]
    fn test_category_serde() {
        let json = serde_json::to_string(&ShiftCategory::Night).unwrap();
        assert_eq!(json, "\"night\"");
        let custom: ShiftCategory = serde_json::from_str("{\"custom\":\"split\"}").unwrap();
        assert_eq!(custom.label(), "split");
    }
}
