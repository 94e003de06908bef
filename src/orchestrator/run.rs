//! Scheduler run records.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Algorithm, AssignmentMode, RunTelemetry};
use crate::scheduler::RosterKpi;

/// Run lifecycle: `queued -> running -> completed | failed`,
/// `queued -> cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn label(&self) -> &'static str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled
        )
    }
}

/// What to roster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRequest {
    pub tenant_id: String,
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    /// Rule set to apply; the tenant default when absent.
    #[serde(default)]
    pub rule_set_id: Option<String>,
    pub algorithm: Algorithm,
    #[serde(default)]
    pub mode: AssignmentMode,
    #[serde(default = "system_actor")]
    pub requested_by: String,
    /// Overrides the configured seed.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Date exceptions are judged against; today when absent.
    #[serde(default)]
    pub as_of: Option<NaiveDate>,
}

fn system_actor() -> String {
    "system".to_string()
}

impl RunRequest {
    pub fn new(
        tenant_id: impl Into<String>,
        week_start: NaiveDate,
        week_end: NaiveDate,
        algorithm: Algorithm,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            week_start,
            week_end,
            rule_set_id: None,
            algorithm,
            mode: AssignmentMode::Employee,
            requested_by: system_actor(),
            seed: None,
            as_of: None,
        }
    }

    pub fn with_rule_set(mut self, id: impl Into<String>) -> Self {
        self.rule_set_id = Some(id.into());
        self
    }

    pub fn with_mode(mut self, mode: AssignmentMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn requested_by(mut self, user: impl Into<String>) -> Self {
        self.requested_by = user.into();
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn as_of(mut self, date: NaiveDate) -> Self {
        self.as_of = Some(date);
        self
    }
}

/// One scheduling run and its result summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerRun {
    pub id: String,
    pub tenant_id: String,
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub algorithm: Algorithm,
    pub mode: AssignmentMode,
    #[serde(default)]
    pub rule_set_id: Option<String>,
    pub requested_by: String,
    pub seed: u64,
    #[serde(default)]
    pub as_of: Option<NaiveDate>,
    pub status: RunStatus,
    /// Schedule written by the run (also set for partial results).
    #[serde(default)]
    pub schedule_id: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub violated_hard: Vec<String>,
    #[serde(default)]
    pub unfilled_slots: Vec<String>,
    #[serde(default)]
    pub failure: Option<String>,
    #[serde(default)]
    pub telemetry: RunTelemetry,
    #[serde(default)]
    pub kpi: Option<RosterKpi>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

impl SchedulerRun {
    /// A new queued run.
    pub fn queued(request: RunRequest, seed: u64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: request.tenant_id,
            week_start: request.week_start,
            week_end: request.week_end,
            algorithm: request.algorithm,
            mode: request.mode,
            rule_set_id: request.rule_set_id,
            requested_by: request.requested_by,
            seed: request.seed.unwrap_or(seed),
            as_of: request.as_of,
            status: RunStatus::Queued,
            schedule_id: None,
            score: None,
            violated_hard: Vec::new(),
            unfilled_slots: Vec::new(),
            failure: None,
            telemetry: RunTelemetry::default(),
            kpi: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn start(&mut self) {
        self.status = RunStatus::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn complete(&mut self) {
        self.status = RunStatus::Completed;
        self.finished_at = Some(Utc::now());
    }

    pub fn fail(&mut self, reason: impl Into<String>) {
        self.status = RunStatus::Failed;
        self.failure = Some(reason.into());
        self.finished_at = Some(Utc::now());
    }

    pub fn cancel(&mut self) {
        self.status = RunStatus::Cancelled;
        self.finished_at = Some(Utc::now());
    }
}
