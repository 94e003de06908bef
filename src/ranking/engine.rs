//! Ranker for multi-criteria candidate ordering.
//!
//! Composes ranking rules with configurable evaluation modes and
//! tie-breaking strategies.

use std::sync::Arc;

use super::{rules, RankScore, RankingContext, RankingRule};
use crate::models::Assignee;

/// How multiple rules are combined.
#[derive(Debug, Clone, Default)]
pub enum EvaluationMode {
    /// Apply rules in sequence; use next rule only on ties.
    #[default]
    Sequential,
    /// Compute weighted sum of all rule scores.
    Weighted,
}

/// How ties are broken after all rules are exhausted.
#[derive(Debug, Clone, Default)]
pub enum TieBreaker {
    /// Keep input order.
    #[default]
    NextRule,
    /// Deterministic by assignee (kind, then ID).
    ById,
}

#[derive(Clone)]
struct WeightedRule {
    rule: Arc<dyn RankingRule>,
    weight: f64,
}

/// A composable candidate ranker.
///
/// # Example
/// ```
/// use u_roster::ranking::{rules, Ranker};
///
/// let ranker = Ranker::new()
///     .with_rule(rules::LeastLoaded)
///     .with_tie_breaker(rules::FewestNights);
/// ```
#[derive(Clone)]
pub struct Ranker {
    rules: Vec<WeightedRule>,
    mode: EvaluationMode,
    tie_breaker: TieBreaker,
    epsilon: f64,
}

impl Ranker {
    /// Creates an empty ranker.
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            mode: EvaluationMode::Sequential,
            tie_breaker: TieBreaker::NextRule,
            epsilon: 1e-9,
        }
    }

    /// Pinned first, then least loaded, then preference match, then ID.
    pub fn standard() -> Self {
        Self::new()
            .with_rule(rules::PinnedFirst)
            .with_rule(rules::LeastLoaded)
            .with_rule(rules::PreferredWindow)
            .with_final_tie_breaker(TieBreaker::ById)
    }

    /// Adds a primary rule (weight 1.0).
    pub fn with_rule<R: RankingRule + 'static>(mut self, rule: R) -> Self {
        self.rules.push(WeightedRule {
            rule: Arc::new(rule),
            weight: 1.0,
        });
        self
    }

    /// Adds a weighted rule.
    pub fn with_weighted_rule<R: RankingRule + 'static>(mut self, rule: R, weight: f64) -> Self {
        self.rules.push(WeightedRule {
            rule: Arc::new(rule),
            weight,
        });
        self
    }

    /// Adds a tie-breaking rule (weight 0.0, used only in Sequential mode).
    pub fn with_tie_breaker<R: RankingRule + 'static>(mut self, rule: R) -> Self {
        self.rules.push(WeightedRule {
            rule: Arc::new(rule),
            weight: 0.0,
        });
        self
    }

    /// Sets the evaluation mode.
    pub fn with_mode(mut self, mode: EvaluationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the final tie-breaking strategy.
    pub fn with_final_tie_breaker(mut self, tie_breaker: TieBreaker) -> Self {
        self.tie_breaker = tie_breaker;
        self
    }

    /// Orders candidates, best first.
    ///
    /// Returns indices into `candidates`.
    pub fn sort_indices(&self, candidates: &[Assignee], context: &RankingContext<'_>) -> Vec<usize> {
        if candidates.is_empty() {
            return Vec::new();
        }

        let mut indices: Vec<usize> = (0..candidates.len()).collect();

        match &self.mode {
            EvaluationMode::Sequential => {
                indices.sort_by(|&a, &b| {
                    self.compare_sequential(&candidates[a], &candidates[b], context)
                });
            }
            EvaluationMode::Weighted => {
                let scores: Vec<f64> = candidates
                    .iter()
                    .map(|c| self.weighted_score(c, context))
                    .collect();
                indices.sort_by(|&a, &b| {
                    scores[a]
                        .partial_cmp(&scores[b])
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then_with(|| self.final_order(&candidates[a], &candidates[b]))
                });
            }
        }

        indices
    }

    /// Orders candidates, best first.
    pub fn rank<'c>(&self, candidates: &'c [Assignee], context: &RankingContext<'_>) -> Vec<&'c Assignee> {
        self.sort_indices(candidates, context)
            .into_iter()
            .map(|i| &candidates[i])
            .collect()
    }

    /// Best candidate, if any.
    pub fn select_best<'c>(
        &self,
        candidates: &'c [Assignee],
        context: &RankingContext<'_>,
    ) -> Option<&'c Assignee> {
        self.sort_indices(candidates, context)
            .first()
            .map(|&i| &candidates[i])
    }

    /// Per-rule scores of one candidate.
    pub fn evaluate(&self, candidate: &Assignee, context: &RankingContext<'_>) -> Vec<RankScore> {
        self.rules
            .iter()
            .map(|wr| wr.rule.evaluate(candidate, context) * wr.weight)
            .collect()
    }

    fn compare_sequential(
        &self,
        a: &Assignee,
        b: &Assignee,
        context: &RankingContext<'_>,
    ) -> std::cmp::Ordering {
        for wr in &self.rules {
            let score_a = wr.rule.evaluate(a, context);
            let score_b = wr.rule.evaluate(b, context);

            if (score_a - score_b).abs() > self.epsilon {
                return score_a
                    .partial_cmp(&score_b)
                    .unwrap_or(std::cmp::Ordering::Equal);
            }
        }

        self.final_order(a, b)
    }

    fn final_order(&self, a: &Assignee, b: &Assignee) -> std::cmp::Ordering {
        match &self.tie_breaker {
            TieBreaker::NextRule => std::cmp::Ordering::Equal,
            TieBreaker::ById => a.cmp(b),
        }
    }

    fn weighted_score(&self, candidate: &Assignee, context: &RankingContext<'_>) -> f64 {
        self.rules
            .iter()
            .map(|wr| wr.rule.evaluate(candidate, context) * wr.weight)
            .sum()
    }
}

impl Default for Ranker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Ranker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ranker")
            .field(
                "rules",
                &self
                    .rules
                    .iter()
                    .map(|r| format!("{}(w={})", r.rule.name(), r.weight))
                    .collect::<Vec<_>>(),
            )
            .field("mode", &self.mode)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Employee, EmployeeAvailability, ShiftCategory, ShiftWindow, Slot};
    use crate::rules::EvaluationContext;
    use chrono::{NaiveDate, NaiveTime};
    use std::collections::HashMap;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
    }

    fn t(h: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, 0, 0).unwrap()
    }

    fn emp(id: &str) -> Assignee {
        Assignee::Employee(id.into())
    }

    fn slot() -> Slot {
        Slot {
            id: Slot::make_id(d(4), "day", 0),
            date: d(4),
            template_id: "day".into(),
            index: 0,
            category: ShiftCategory::Day,
            window: ShiftWindow::on_date(d(4), t(8), t(16)),
            required_roles: Vec::new(),
            team_id: None,
            branch_id: None,
            priority: 0,
        }
    }

    fn eval_ctx() -> EvaluationContext {
        EvaluationContext::new(d(3), d(1))
            .with_employees(["a", "b", "c"].map(Employee::new))
            .with_availability(vec![
                EmployeeAvailability::preferred("b", d(4)).with_window(t(6), t(18)),
                EmployeeAvailability::preferred("c", d(4)).with_window(t(18), t(23)),
            ])
    }

    #[test]
    fn test_least_loaded_first() {
        let s = slot();
        let ec = eval_ctx();
        let load = HashMap::from([(emp("a"), 3.0), (emp("b"), 1.0), (emp("c"), 2.0)]);
        let nights = HashMap::new();
        let ctx = RankingContext::new(&s, &ec, &load, &nights);
        let candidates = vec![emp("a"), emp("b"), emp("c")];

        let ranked = Ranker::new().with_rule(rules::LeastLoaded).rank(&candidates, &ctx);
        assert_eq!(ranked, vec![&emp("b"), &emp("c"), &emp("a")]);
    }

    #[test]
    fn test_standard_uses_preference_then_id() {
        let s = slot();
        let ec = eval_ctx();
        let load = HashMap::new();
        let nights = HashMap::new();
        let ctx = RankingContext::new(&s, &ec, &load, &nights);
        let candidates = vec![emp("c"), emp("a"), emp("b")];

        let ranked = Ranker::standard().rank(&candidates, &ctx);
        // b prefers the window, a declared nothing, c prefers another window.
        assert_eq!(ranked, vec![&emp("b"), &emp("a"), &emp("c")]);
    }

    #[test]
    fn test_pinned_beats_load() {
        let s = slot();
        let ec = eval_ctx().with_availability(vec![EmployeeAvailability::new(
            "a",
            d(4),
            crate::models::AvailabilityKind::Available,
        )
        .pinned()]);
        let load = HashMap::from([(emp("a"), 10.0)]);
        let nights = HashMap::new();
        let ctx = RankingContext::new(&s, &ec, &load, &nights);
        let candidates = vec![emp("b"), emp("a")];
        assert_eq!(Ranker::standard().select_best(&candidates, &ctx), Some(&emp("a")));
    }

    #[test]
    fn test_weighted_mode() {
        let s = slot();
        let ec = eval_ctx();
        let load = HashMap::from([(emp("a"), 1.0), (emp("b"), 2.0)]);
        let nights = HashMap::new();
        let ctx = RankingContext::new(&s, &ec, &load, &nights);
        let ranker = Ranker::new()
            .with_mode(EvaluationMode::Weighted)
            .with_weighted_rule(rules::LeastLoaded, 1.0)
            .with_weighted_rule(rules::PreferredWindow, 5.0);
        // a: 1 + 0, b: 2 - 5
        assert_eq!(
            ranker.select_best(&[emp("a"), emp("b")], &ctx),
            Some(&emp("b"))
        );
    }

    #[test]
    fn test_empty_candidates() {
        let s = slot();
        let ec = eval_ctx();
        let load = HashMap::new();
        let nights = HashMap::new();
        let ctx = RankingContext::new(&s, &ec, &load, &nights);
        assert!(Ranker::standard().sort_indices(&[], &ctx).is_empty());
        assert!(Ranker::standard().select_best(&[], &ctx).is_none());
    }

    #[test]
    fn test_evaluate_scores() {
        let s = slot();
        let ec = eval_ctx();
        let load = HashMap::from([(emp("a"), 4.0)]);
        let nights = HashMap::new();
        let ctx = RankingContext::new(&s, &ec, &load, &nights);
        let scores = Ranker::new()
            .with_rule(rules::LeastLoaded)
            .with_rule(rules::PinnedFirst)
            .evaluate(&emp("a"), &ctx);
        assert_eq!(scores, vec![4.0, 0.0]);
    }
}
