//! Fairness score tracking.
//!
//! Every committed assignment adds a weighted delta to its assignee's
//! running score; a higher score means a heavier burden so far. Scores feed
//! candidate ranking in later runs.
//!
//! # Scopes
//! Employee and team scores are independent tracks. A team assignment
//! never changes its members' employee scores, and the two are never
//! summed.
//!
//! # History
//! Each commit appends a [`ScoreHistoryEntry`]; entries are never edited
//! or removed, so the current score always equals the sum of the deltas.

use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::models::{Assignee, Assignment, ShiftCategory};

/// Per-shift score deltas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FairnessWeights {
    /// Base delta for any shift.
    pub per_shift: f64,
    /// Extra delta for night shifts.
    pub night: f64,
    /// Extra delta for evening shifts.
    pub evening: f64,
    /// Extra delta for shifts starting on Saturday or Sunday.
    pub weekend: f64,
}

impl Default for FairnessWeights {
    fn default() -> Self {
        Self {
            per_shift: 1.0,
            night: 1.0,
            evening: 0.25,
            weekend: 0.5,
        }
    }
}

/// Score track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreScope {
    Employee,
    Team,
}

/// Identifies one score.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ScoreKey {
    pub scope: ScoreScope,
    pub id: String,
}

impl ScoreKey {
    pub fn employee(id: impl Into<String>) -> Self {
        Self {
            scope: ScoreScope::Employee,
            id: id.into(),
        }
    }

    pub fn team(id: impl Into<String>) -> Self {
        Self {
            scope: ScoreScope::Team,
            id: id.into(),
        }
    }
}

impl From<&Assignee> for ScoreKey {
    fn from(assignee: &Assignee) -> Self {
        match assignee {
            Assignee::Employee(id) => ScoreKey::employee(id.clone()),
            Assignee::Team(id) => ScoreKey::team(id.clone()),
        }
    }
}

/// One committed score change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreHistoryEntry {
    pub recorded_at: DateTime<Utc>,
    pub shift_date: NaiveDate,
    pub category: ShiftCategory,
    pub delta: f64,
    pub resulting_score: f64,
    /// Run that committed the change (`None` for manual commits).
    pub run_id: Option<String>,
}

/// Running fairness state of one employee or team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FairnessScore {
    pub scope: ScoreScope,
    pub id: String,
    pub score: f64,
    pub total_shifts: u32,
    pub night_shifts: u32,
    pub history: Vec<ScoreHistoryEntry>,
}

impl FairnessScore {
    fn new(key: &ScoreKey) -> Self {
        Self {
            scope: key.scope,
            id: key.id.clone(),
            score: 0.0,
            total_shifts: 0,
            night_shifts: 0,
            history: Vec::new(),
        }
    }
}

/// Fairness scores for one tenant.
#[derive(Debug, Clone, Default)]
pub struct FairnessTracker {
    weights: FairnessWeights,
    scores: BTreeMap<ScoreKey, FairnessScore>,
}

impl FairnessTracker {
    pub fn new(weights: FairnessWeights) -> Self {
        Self {
            weights,
            scores: BTreeMap::new(),
        }
    }

    pub fn weights(&self) -> &FairnessWeights {
        &self.weights
    }

    /// Current score (0 for unseen keys).
    pub fn current_score(&self, key: &ScoreKey) -> f64 {
        self.scores.get(key).map_or(0.0, |s| s.score)
    }

    /// Full record, if any commit happened.
    pub fn get(&self, key: &ScoreKey) -> Option<&FairnessScore> {
        self.scores.get(key)
    }

    /// Delta for one shift.
    pub fn delta_for(&self, category: &ShiftCategory, weekend: bool) -> f64 {
        let w = &self.weights;
        let mut delta = w.per_shift;
        match category {
            ShiftCategory::Night => delta += w.night,
            ShiftCategory::Evening => delta += w.evening,
            ShiftCategory::Day | ShiftCategory::Custom(_) => {}
        }
        if weekend {
            delta += w.weekend;
        }
        delta
    }

    /// Delta for an assignment.
    pub fn delta_for_assignment(&self, assignment: &Assignment) -> f64 {
        self.delta_for(&assignment.category, is_weekend(assignment.date))
    }

    /// Appends a delta and returns the new score.
    pub fn commit(
        &mut self,
        key: &ScoreKey,
        delta: f64,
        shift_date: NaiveDate,
        category: ShiftCategory,
        run_id: Option<&str>,
    ) -> f64 {
        let entry = self
            .scores
            .entry(key.clone())
            .or_insert_with(|| FairnessScore::new(key));
        entry.score += delta;
        entry.total_shifts += 1;
        if category.is_night() {
            entry.night_shifts += 1;
        }
        entry.history.push(ScoreHistoryEntry {
            recorded_at: Utc::now(),
            shift_date,
            category,
            delta,
            resulting_score: entry.score,
            run_id: run_id.map(str::to_string),
        });
        entry.score
    }

    /// Commits one assignment under its assignee's track.
    pub fn commit_assignment(&mut self, assignment: &Assignment, run_id: Option<&str>) -> f64 {
        let delta = self.delta_for_assignment(assignment);
        self.commit(
            &ScoreKey::from(&assignment.assignee),
            delta,
            assignment.date,
            assignment.category.clone(),
            run_id,
        )
    }

    /// Number of commits already recorded for `key` on one shift date and
    /// category.
    pub fn committed_on(&self, key: &ScoreKey, shift_date: NaiveDate, category: &ShiftCategory) -> usize {
        self.scores.get(key).map_or(0, |s| {
            s.history
                .iter()
                .filter(|h| h.shift_date == shift_date && &h.category == category)
                .count()
        })
    }

    /// Current scores of one track, keyed by ID.
    pub fn snapshot(&self, scope: ScoreScope) -> HashMap<String, f64> {
        self.scores
            .iter()
            .filter(|(k, _)| k.scope == scope)
            .map(|(k, s)| (k.id.clone(), s.score))
            .collect()
    }

    /// Rebuilds a tracker from previously persisted scores.
    pub fn from_scores(weights: FairnessWeights, scores: impl IntoIterator<Item = FairnessScore>) -> Self {
        let scores = scores
            .into_iter()
            .map(|s| {
                (
                    ScoreKey {
                        scope: s.scope,
                        id: s.id.clone(),
                    },
                    s,
                )
            })
            .collect();
        Self { weights, scores }
    }

    /// All records in key order.
    pub fn scores(&self) -> impl Iterator<Item = &FairnessScore> {
        self.scores.values()
    }
}

/// Saturday or Sunday.
pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        // 2025-03-03 is a Monday.
        NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
    }

    #[test]
    fn test_delta_weights() {
        let t = FairnessTracker::default();
        assert!((t.delta_for(&ShiftCategory::Day, false) - 1.0).abs() < 1e-9);
        assert!((t.delta_for(&ShiftCategory::Night, false) - 2.0).abs() < 1e-9);
        assert!((t.delta_for(&ShiftCategory::Evening, false) - 1.25).abs() < 1e-9);
        assert!((t.delta_for(&ShiftCategory::Night, true) - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_weekend_detection() {
        assert!(!is_weekend(d(7)));
        assert!(is_weekend(d(8)));
        assert!(is_weekend(d(9)));
    }

    #[test]
    fn test_commit_appends_history() {
        let mut t = FairnessTracker::default();
        let key = ScoreKey::employee("e1");
        assert_eq!(t.current_score(&key), 0.0);

        let s1 = t.commit(&key, 2.0, d(3), ShiftCategory::Night, Some("r1"));
        let s2 = t.commit(&key, 1.0, d(4), ShiftCategory::Day, Some("r1"));
        assert!((s1 - 2.0).abs() < 1e-9);
        assert!((s2 - 3.0).abs() < 1e-9);

        let rec = t.get(&key).unwrap();
        assert_eq!(rec.total_shifts, 2);
        assert_eq!(rec.night_shifts, 1);
        assert_eq!(rec.history.len(), 2);
        assert!((rec.history[1].resulting_score - 3.0).abs() < 1e-9);
        let sum: f64 = rec.history.iter().map(|h| h.delta).sum();
        assert!((sum - rec.score).abs() < 1e-9);
    }

    #[test]
    fn test_scopes_are_independent() {
        let mut t = FairnessTracker::default();
        t.commit(&ScoreKey::team("x"), 5.0, d(3), ShiftCategory::Day, None);
        assert_eq!(t.current_score(&ScoreKey::employee("x")), 0.0);
        assert_eq!(t.snapshot(ScoreScope::Employee).len(), 0);
        assert_eq!(t.snapshot(ScoreScope::Team).get("x"), Some(&5.0));
    }

    #[test]
    fn test_speculative_copy_leaves_original() {
        let mut t = FairnessTracker::default();
        let key = ScoreKey::employee("e1");
        t.commit(&key, 1.0, d(3), ShiftCategory::Day, None);
        let mut trial = t.clone();
        trial.commit(&key, 1.0, d(4), ShiftCategory::Day, None);
        assert!((t.current_score(&key) - 1.0).abs() < 1e-9);
        assert!((trial.current_score(&key) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_from_scores_round_trip() {
        let mut t = FairnessTracker::default();
        t.commit(&ScoreKey::employee("e1"), 1.5, d(3), ShiftCategory::Day, None);
        let restored =
            FairnessTracker::from_scores(FairnessWeights::default(), t.scores().cloned());
        assert!((restored.current_score(&ScoreKey::employee("e1")) - 1.5).abs() < 1e-9);
    }
}
