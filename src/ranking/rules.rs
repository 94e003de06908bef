//! Built-in ranking rules.
//!
//! # Score Convention
//! All rules return lower scores for better candidates.

use super::{RankScore, RankingContext, RankingRule};
use crate::models::Assignee;

/// Candidates pinned on the slot date come first.
#[derive(Debug, Clone, Copy)]
pub struct PinnedFirst;

impl RankingRule for PinnedFirst {
    fn name(&self) -> &'static str {
        "PINNED"
    }

    fn evaluate(&self, candidate: &Assignee, context: &RankingContext<'_>) -> RankScore {
        if context
            .evaluation
            .assignee_pinned(candidate, context.slot.date)
        {
            -1.0
        } else {
            0.0
        }
    }

    fn description(&self) -> &'static str {
        "Pinned assignees first"
    }
}

/// Lowest running fairness load first.
#[derive(Debug, Clone, Copy)]
pub struct LeastLoaded;

impl RankingRule for LeastLoaded {
    fn name(&self) -> &'static str {
        "LOAD"
    }

    fn evaluate(&self, candidate: &Assignee, context: &RankingContext<'_>) -> RankScore {
        context.load_of(candidate)
    }

    fn description(&self) -> &'static str {
        "Least fairness load"
    }
}

/// Candidates whose preferred window covers the slot come first; those
/// who declared a different preference that day come last.
#[derive(Debug, Clone, Copy)]
pub struct PreferredWindow;

impl RankingRule for PreferredWindow {
    fn name(&self) -> &'static str {
        "PREFERENCE"
    }

    fn evaluate(&self, candidate: &Assignee, context: &RankingContext<'_>) -> RankScore {
        match context.evaluation.prefers(candidate, &context.slot.window) {
            Some(true) => -1.0,
            None => 0.0,
            Some(false) => 1.0,
        }
    }

    fn description(&self) -> &'static str {
        "Preferred availability window"
    }
}

/// For night slots, fewest nights taken in this run first.
#[derive(Debug, Clone, Copy)]
pub struct FewestNights;

impl RankingRule for FewestNights {
    fn name(&self) -> &'static str {
        "NIGHTS"
    }

    fn evaluate(&self, candidate: &Assignee, context: &RankingContext<'_>) -> RankScore {
        if context.slot.category.is_night() {
            f64::from(context.nights_of(candidate))
        } else {
            0.0
        }
    }

    fn description(&self) -> &'static str {
        "Fewest night shifts"
    }
}
