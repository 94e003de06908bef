//! Error taxonomy for rostering.
//!
//! Failures are recorded on run and conflict records for operators; none
//! of them aborts the orchestrator. Budget exhaustion is not an error: a
//! truncated search returns its best-so-far result with
//! `telemetry.truncated = true`.

use crate::models::ScheduleStatus;
use crate::validation::ValidationError;

/// Result alias for rostering operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Errors raised by the rostering subsystem.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// Demand cannot possibly be met; the run is not started.
    #[error("infeasible input: {}", summarize(.0))]
    InfeasibleInput(Vec<ValidationError>),

    /// One or more slots could not be filled within budget.
    #[error("{unfilled} slot(s) could not be filled without violating hard rules")]
    HardConstraintUnsatisfied { unfilled: usize, violated: Vec<String> },

    /// A manual edit collided with a regeneration (or vice versa).
    #[error("week {key} is locked by another operation; retry after {retry_after_ms}ms")]
    ConcurrentEditConflict { key: String, retry_after_ms: u64 },

    /// The exception's validity window has lapsed.
    #[error("exception {0} has expired")]
    ExceptionExpired(String),

    /// The exception was already approved or rejected.
    #[error("exception {0} has already been decided")]
    ExceptionDecided(String),

    /// Archived and rejected schedules accept no edits.
    #[error("schedule {id} is {status:?} and cannot be edited")]
    ScheduleClosed { id: String, status: ScheduleStatus },

    /// Entity lookup failed.
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    /// Illegal schedule lifecycle step.
    #[error("cannot move schedule from {from:?} to {to:?}")]
    InvalidTransition {
        from: ScheduleStatus,
        to: ScheduleStatus,
    },

    /// Rule definitions could not be parsed.
    #[error(transparent)]
    InvalidRuleSet(#[from] crate::rules::RuleError),

    /// No strategy registered under this name.
    #[error("unknown algorithm '{0}'")]
    UnknownAlgorithm(String),

    /// A strategy panicked or reported an internal failure.
    #[error("strategy {algorithm} failed: {message}")]
    StrategyFailed { algorithm: String, message: String },

    /// The run was cancelled before it started.
    #[error("run {0} was cancelled")]
    Cancelled(String),

    /// The run is not in a state that allows the operation.
    #[error("run {id} is {status}, expected {expected}")]
    RunState {
        id: String,
        status: String,
        expected: &'static str,
    },

    /// Persistence failure.
    #[error(transparent)]
    Store(#[from] crate::orchestrator::StoreError),
}

impl SchedulerError {
    /// Shorthand for lookups.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Suggested retry delay for lock collisions.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            SchedulerError::ConcurrentEditConflict { retry_after_ms, .. } => Some(*retry_after_ms),
            _ => None,
        }
    }
}

fn summarize(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}
