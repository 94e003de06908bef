//! Rule exceptions.
//!
//! An exception is a request to waive one hard rule for one assignee,
//! optionally on one date. Only approved exceptions within their validity
//! window suppress rule checks; expired ones are treated as absent.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::Assignee;

/// Exception approval state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionStatus {
    Pending,
    Approved,
    Rejected,
}

/// A time-bounded override of a hard rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleException {
    /// Exception ID.
    pub id: String,
    /// Owning tenant.
    pub tenant_id: String,
    /// Employee or team the override applies to.
    pub assignee: Assignee,
    /// Rule being waived (rule-set rule ID or a built-in ID).
    pub rule_id: String,
    /// Specific date the override applies to. `None` = any date until expiry.
    #[serde(default)]
    pub date: Option<NaiveDate>,
    /// Last date the override is valid (inclusive).
    #[serde(default)]
    pub valid_until: Option<NaiveDate>,
    /// Justification supplied by the requester.
    #[serde(default)]
    pub reason: String,
    /// Approval state.
    pub status: ExceptionStatus,
    /// Requesting user.
    pub requested_by: String,
    /// Deciding user.
    #[serde(default)]
    pub decided_by: Option<String>,
    /// Decision time.
    #[serde(default)]
    pub decided_at: Option<DateTime<Utc>>,
}

impl RuleException {
    /// Creates a pending exception.
    pub fn request(
        tenant_id: impl Into<String>,
        assignee: Assignee,
        rule_id: impl Into<String>,
        requested_by: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant_id.into(),
            assignee,
            rule_id: rule_id.into(),
            date: None,
            valid_until: None,
            reason: String::new(),
            status: ExceptionStatus::Pending,
            requested_by: requested_by.into(),
            decided_by: None,
            decided_at: None,
        }
    }

    /// Limits the override to one date.
    pub fn on_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    /// Sets the last valid date.
    pub fn valid_until(mut self, date: NaiveDate) -> Self {
        self.valid_until = Some(date);
        self
    }

    /// Sets the justification.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    /// Marks the exception approved (used by fixtures and the audit layer).
    pub fn approved_by(mut self, user: impl Into<String>) -> Self {
        self.status = ExceptionStatus::Approved;
        self.decided_by = Some(user.into());
        self.decided_at = Some(Utc::now());
        self
    }

    /// Whether the validity window has lapsed as of `today`.
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.valid_until.is_some_and(|until| today > until)
    }

    /// Approved and not expired.
    pub fn is_active(&self, today: NaiveDate) -> bool {
        self.status == ExceptionStatus::Approved && !self.is_expired(today)
    }

    /// Whether this exception waives `rule_id` for `assignee` on `date`.
    pub fn suppresses(
        &self,
        assignee: &Assignee,
        rule_id: &str,
        date: NaiveDate,
        today: NaiveDate,
    ) -> bool {
        self.is_active(today)
            && &self.assignee == assignee
            && self.rule_id == rule_id
            && self.date.map_or(true, |d| d == date)
            && self.valid_until.map_or(true, |until| date <= until)
    }
}
