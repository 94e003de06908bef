//! Constraint-aware shift rostering.
//!
//! Builds weekly rosters that assign employees (or whole teams) to shift
//! slots under tenant-defined labour rules, tracks fairness across weeks,
//! and coordinates runs, manual edits and approvals.
//!
//! # Modules
//!
//! - **`models`**: Domain types: `Employee`, `Team`, `ShiftTemplate`,
//!   `Slot`, `Schedule`, `Assignment`, `Conflict`, `RuleException`
//! - **`rules`**: Typed rule sets and the hard/soft rule engine
//! - **`fairness`**: Cumulative night/weekend/holiday load per assignee
//! - **`ranking`**: Candidate ordering shared by the constructive strategies
//! - **`scheduler`**: Problem building, strategy trait, registry, KPIs and
//!   the greedy, constraint, annealing, genetic, score-rank and manual
//!   strategies
//! - **`ga`**: Chromosome encoding and operators for the genetic strategy
//! - **`validation`**: Input feasibility checks run before a search starts
//! - **`conflicts`**: Post-hoc conflict detection on stored schedules
//! - **`audit`**: Append-only record of who changed what
//! - **`orchestrator`**: Run lifecycle, week locks, persistence seams
//! - **`http`**: JSON API (feature `http-server`)
//!
//! # Scoring
//!
//! Scores are higher-is-better. A schedule with unfilled slots or hard
//! violations never completes a run.
//!
//! # References
//!
//! - Burke et al. (2004), "The State of the Art of Nurse Rostering"
//! - Ernst et al. (2004), "Staff scheduling and rostering: A review of
//!   applications, methods and models"
//! - Kirkpatrick et al. (1983), "Optimization by Simulated Annealing"

pub mod audit;
pub mod config;
pub mod conflicts;
pub mod error;
pub mod fairness;
pub mod ga;
#[cfg(feature = "http-server")]
pub mod http;
pub mod models;
pub mod orchestrator;
pub mod ranking;
pub mod rules;
pub mod scheduler;
pub mod telemetry;
pub mod validation;

pub use error::{SchedulerError, SchedulerResult};
