//! Planning grid.
//!
//! Expands demand into headcount-one [`Slot`]s, separates slots already
//! held by locked assignments, and pre-computes the eligible candidates
//! of every open slot.
//!
//! # Slot Order
//! `(date, template priority desc, start, template id, index)`. Every
//! constructive strategy fills slots in this order, which keeps results
//! deterministic for a fixed input.

use std::collections::{HashMap, HashSet};

use super::ScheduleProblem;
use crate::models::{Assignee, Assignment, Slot};
use crate::rules::{EvaluationContext, SlotRequirement};

/// Expanded problem shared by all strategies.
#[derive(Debug, Clone)]
pub struct Plan {
    /// All demand slots in fill order.
    pub slots: Vec<Slot>,
    /// Locked assignments inside the horizon (fixed givens).
    pub fixed: Vec<Assignment>,
    /// Indices into `slots` that still need an assignee.
    pub open: Vec<usize>,
    /// Eligible candidates per slot (parallel to `slots`).
    pub candidates: Vec<Vec<Assignee>>,
    /// Evaluation context for the rule engine.
    pub context: EvaluationContext,
}

impl Plan {
    /// Builds the grid for a problem.
    pub fn build(problem: &ScheduleProblem) -> Self {
        let slots = expand_slots(problem);

        let fixed: Vec<Assignment> = problem
            .existing
            .iter()
            .filter(|a| a.manual_lock && a.date >= problem.week_start && a.date <= problem.week_end)
            .cloned()
            .collect();
        let held: HashSet<&str> = fixed.iter().map(|a| a.slot_id.as_str()).collect();
        let open: Vec<usize> = slots
            .iter()
            .enumerate()
            .filter(|(_, s)| !held.contains(s.id.as_str()))
            .map(|(i, _)| i)
            .collect();

        let candidates = slots
            .iter()
            .map(|s| problem.eligible(&SlotRequirement::from(s)))
            .collect();

        let context = EvaluationContext::new(problem.week_start, problem.as_of)
            .with_employees(problem.employees.iter().cloned())
            .with_teams(problem.teams.iter().cloned())
            .with_availability(problem.availability.iter().cloned())
            .with_exceptions(problem.exceptions.iter().cloned())
            .with_slots(&slots)
            .with_pool(problem.pool())
            .with_prior(problem.prior.clone());

        Self {
            slots,
            fixed,
            open,
            candidates,
            context,
        }
    }

    /// Slots with no assignment in `assignments`, in fill order.
    pub fn unfilled(&self, assignments: &[Assignment]) -> Vec<Slot> {
        let filled: HashSet<&str> = assignments.iter().map(|a| a.slot_id.as_str()).collect();
        self.slots
            .iter()
            .filter(|s| !filled.contains(s.id.as_str()))
            .cloned()
            .collect()
    }

    /// Prior fairness load per pool member.
    pub fn initial_load(&self) -> HashMap<Assignee, f64> {
        self.context
            .pool()
            .iter()
            .map(|a| (a.clone(), self.context.prior.fairness_of(a.id())))
            .collect()
    }
}

/// Expands demand over the horizon into ordered slots.
///
/// Requirements referencing unknown templates are skipped (validation
/// reports them). Demand rows for the same template and day add up.
pub fn expand_slots(problem: &ScheduleProblem) -> Vec<Slot> {
    let mut slots = Vec::new();
    for date in problem.dates() {
        let mut next_index: HashMap<&str, u32> = HashMap::new();
        for req in problem.demand.iter().filter(|r| r.applies_on(date)) {
            let Some(template) = problem.template(&req.template_id) else {
                continue;
            };
            let counter = next_index.entry(template.id.as_str()).or_insert(0);
            for _ in 0..req.headcount {
                let index = *counter;
                *counter += 1;
                slots.push(Slot {
                    id: Slot::make_id(date, &template.id, index),
                    date,
                    template_id: template.id.clone(),
                    index,
                    category: template.category.clone(),
                    window: template.window_on(date),
                    required_roles: req.required_roles.clone(),
                    team_id: req.team_id.clone().or_else(|| template.team_id.clone()),
                    branch_id: req.branch_id.clone().or_else(|| template.branch_id.clone()),
                    priority: template.priority,
                });
            }
        }
    }
    slots.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then_with(|| b.priority.cmp(&a.priority))
            .then_with(|| a.window.start.cmp(&b.window.start))
            .then_with(|| a.template_id.cmp(&b.template_id))
            .then_with(|| a.index.cmp(&b.index))
    });
    slots
}
