//! Roster quality metrics (KPIs).
//!
//! Computes workforce indicators from a roster's assignments, the number
//! of demand slots and the assignee pool.
//!
//! # Metrics
//!
//! | Metric | Definition |
//! |--------|-----------|
//! | Coverage Rate | Filled slots / demand slots |
//! | Shift Spread | Max - min shifts per pool member |
//! | Night Spread | Max - min night shifts per pool member |
//! | Hours by Assignee | Rostered hours per pool member |
//! | Avg Hours | Mean rostered hours over the pool |
//!
//! Pool members without assignments count as zero, so an idle employee
//! widens the spread.
//!
//! # Reference
//! Burke et al. (2004), "The State of the Art of Nurse Rostering", §4

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::models::{Assignee, Assignment};

/// Roster performance indicators.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RosterKpi {
    /// Demand slots in the horizon.
    pub slots: usize,
    /// Slots holding an assignment.
    pub filled: usize,
    /// Fraction of slots filled (1.0 when there is no demand).
    pub coverage_rate: f64,
    /// Max minus min shift count across the pool.
    pub shift_spread: u32,
    /// Max minus min night shift count across the pool.
    pub night_spread: u32,
    /// Shift count per assignee ID.
    pub shifts_by_assignee: BTreeMap<String, u32>,
    /// Rostered hours per assignee ID.
    pub hours_by_assignee: BTreeMap<String, f64>,
    /// Mean rostered hours over the pool.
    pub avg_hours: f64,
}

impl RosterKpi {
    /// Computes KPIs for a roster.
    ///
    /// # Arguments
    /// * `assignments` - The roster's assignments (locked ones included).
    /// * `slot_count` - Demand slots in the horizon.
    /// * `pool` - Assignees eligible for the run.
    pub fn calculate(assignments: &[Assignment], slot_count: usize, pool: &[Assignee]) -> Self {
        let mut shifts: BTreeMap<String, u32> = BTreeMap::new();
        let mut nights: BTreeMap<String, u32> = BTreeMap::new();
        let mut hours: BTreeMap<String, f64> = BTreeMap::new();
        for member in pool {
            shifts.insert(member.id().to_string(), 0);
            nights.insert(member.id().to_string(), 0);
            hours.insert(member.id().to_string(), 0.0);
        }
        for a in assignments {
            let id = a.assignee.id().to_string();
            *shifts.entry(id.clone()).or_insert(0) += 1;
            if a.is_night() {
                *nights.entry(id.clone()).or_insert(0) += 1;
            }
            *hours.entry(id).or_insert(0.0) += a.hours();
        }

        let filled = assignments
            .iter()
            .map(|a| a.slot_id.as_str())
            .collect::<HashSet<_>>()
            .len()
            .min(slot_count);
        let coverage_rate = if slot_count == 0 {
            1.0
        } else {
            filled as f64 / slot_count as f64
        };
        let avg_hours = if hours.is_empty() {
            0.0
        } else {
            hours.values().sum::<f64>() / hours.len() as f64
        };

        Self {
            slots: slot_count,
            filled,
            coverage_rate,
            shift_spread: spread(&shifts),
            night_spread: spread(&nights),
            shifts_by_assignee: shifts,
            hours_by_assignee: hours,
            avg_hours,
        }
    }

    /// Whether the roster meets the given quality thresholds.
    pub fn meets_thresholds(&self, min_coverage: f64, max_shift_spread: u32) -> bool {
        self.coverage_rate >= min_coverage && self.shift_spread <= max_shift_spread
    }
}

fn spread(counts: &BTreeMap<String, u32>) -> u32 {
    let max = counts.values().max().copied().unwrap_or(0);
    let min = counts.values().min().copied().unwrap_or(0);
    max - min
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ShiftCategory, ShiftWindow, Slot};
    use chrono::{NaiveDate, NaiveTime};

    fn assignment(day: u32, tpl: &str, category: ShiftCategory, who: &str) -> Assignment {
        let date = NaiveDate::from_ymd_opt(2025, 3, day).unwrap();
        let (start, end) = if category.is_night() { (22, 6) } else { (8, 16) };
        let slot = Slot {
            id: Slot::make_id(date, tpl, 0),
            date,
            template_id: tpl.into(),
            index: 0,
            category,
            window: ShiftWindow::on_date(
                date,
                NaiveTime::from_hms_opt(start, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(end, 0, 0).unwrap(),
            ),
            required_roles: Vec::new(),
            team_id: None,
            branch_id: None,
            priority: 0,
        };
        Assignment::for_slot(&slot, Assignee::Employee(who.into()))
    }

    fn pool() -> Vec<Assignee> {
        ["a", "b", "c"].map(|id| Assignee::Employee(id.into())).to_vec()
    }

    #[test]
    fn test_kpi_basic() {
        let roster = vec![
            assignment(3, "day", ShiftCategory::Day, "a"),
            assignment(3, "night", ShiftCategory::Night, "b"),
            assignment(4, "night", ShiftCategory::Night, "a"),
        ];
        let kpi = RosterKpi::calculate(&roster, 4, &pool());

        assert_eq!(kpi.filled, 3);
        assert!((kpi.coverage_rate - 0.75).abs() < 1e-10);
        assert_eq!(kpi.shifts_by_assignee["a"], 2);
        assert_eq!(kpi.shifts_by_assignee["c"], 0);
        assert_eq!(kpi.shift_spread, 2);
        assert_eq!(kpi.night_spread, 1);
        assert!((kpi.hours_by_assignee["a"] - 16.0).abs() < 1e-10);
        assert!((kpi.avg_hours - 8.0).abs() < 1e-10);
    }

    #[test]
    fn test_kpi_empty() {
        let kpi = RosterKpi::calculate(&[], 0, &[]);
        assert!((kpi.coverage_rate - 1.0).abs() < 1e-10);
        assert_eq!(kpi.shift_spread, 0);
        assert_eq!(kpi.avg_hours, 0.0);
    }

    #[test]
    fn test_meets_thresholds() {
        let roster = vec![
            assignment(3, "day", ShiftCategory::Day, "a"),
            assignment(4, "day", ShiftCategory::Day, "b"),
        ];
        let kpi = RosterKpi::calculate(&roster, 2, &pool()[..2]);
        assert!(kpi.meets_thresholds(1.0, 0));
        let partial = RosterKpi::calculate(&roster[..1], 2, &pool()[..2]);
        assert!(!partial.meets_thresholds(0.9, 1));
    }
}
