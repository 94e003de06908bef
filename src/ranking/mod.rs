//! Candidate ranking for slot filling.
//!
//! Constructive strategies ask a [`Ranker`] to order the eligible
//! assignees of a slot; the first admitted candidate wins.
//!
//! # Usage
//!
//! ```
//! use u_roster::ranking::{rules, Ranker, TieBreaker};
//!
//! let ranker = Ranker::new()
//!     .with_rule(rules::PinnedFirst)
//!     .with_rule(rules::LeastLoaded)
//!     .with_tie_breaker(rules::PreferredWindow)
//!     .with_final_tie_breaker(TieBreaker::ById);
//! ```
//!
//! # Reference
//! Priority-rule composition follows Haupt (1989), "A Survey of Priority
//! Rule-Based Scheduling", applied to people instead of jobs.

mod context;
mod engine;
pub mod rules;

pub use context::RankingContext;
pub use engine::{EvaluationMode, Ranker, TieBreaker};

use crate::models::Assignee;
use std::fmt::Debug;

/// Score returned by a ranking rule.
///
/// Lower scores = preferred candidate.
pub type RankScore = f64;

/// A rule that scores one candidate for the slot in context.
///
/// # Score Convention
/// **Lower score = better candidate.**
pub trait RankingRule: Send + Sync + Debug {
    /// Rule name (e.g., "PINNED", "LOAD").
    fn name(&self) -> &'static str;

    /// Scores a candidate for `context.slot`.
    fn evaluate(&self, candidate: &Assignee, context: &RankingContext<'_>) -> RankScore;

    /// Rule description.
    fn description(&self) -> &'static str {
        self.name()
    }
}
