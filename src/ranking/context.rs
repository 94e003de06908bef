//! Ranking context.

use std::collections::HashMap;

use crate::models::{Assignee, Slot};
use crate::rules::EvaluationContext;

/// State visible to ranking rules while one slot is being filled.
#[derive(Debug, Clone, Copy)]
pub struct RankingContext<'a> {
    /// Slot being filled.
    pub slot: &'a Slot,
    /// Availability, pins and roles.
    pub evaluation: &'a EvaluationContext,
    /// Running fairness load per candidate (prior score plus deltas
    /// committed so far in this run).
    pub load: &'a HashMap<Assignee, f64>,
    /// Night shifts taken so far in this run.
    pub nights: &'a HashMap<Assignee, u32>,
}

impl<'a> RankingContext<'a> {
    /// Creates a context for `slot`.
    pub fn new(
        slot: &'a Slot,
        evaluation: &'a EvaluationContext,
        load: &'a HashMap<Assignee, f64>,
        nights: &'a HashMap<Assignee, u32>,
    ) -> Self {
        Self {
            slot,
            evaluation,
            load,
            nights,
        }
    }

    /// Running load of a candidate (0 when unknown).
    pub fn load_of(&self, candidate: &Assignee) -> f64 {
        self.load.get(candidate).copied().unwrap_or(0.0)
    }

    /// Nights taken so far by a candidate.
    pub fn nights_of(&self, candidate: &Assignee) -> u32 {
        self.nights.get(candidate).copied().unwrap_or(0)
    }
}
