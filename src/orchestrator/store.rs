//! Persistence seam for rostering outputs.
//!
//! The orchestrator writes runs, schedules, conflicts, exceptions and
//! fairness scores through [`ScheduleStore`]. [`InMemoryStore`] backs tests
//! and the standalone server; hosts plug their own data layer in behind the
//! same trait.

use std::collections::HashMap;

use chrono::NaiveDate;
use parking_lot::RwLock;

use super::run::{RunStatus, SchedulerRun};
use crate::fairness::FairnessScore;
use crate::models::{Conflict, RuleException, Schedule};

/// Storage failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} '{id}' already exists")]
    Duplicate { entity: &'static str, id: String },
    #[error("{entity} '{id}' does not exist")]
    Missing { entity: &'static str, id: String },
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("snapshot could not be read: {0}")]
    Snapshot(String),
}

/// Storage abstraction for everything the orchestrator produces.
///
/// Schedules are never deleted; listing methods return records in
/// insertion order.
pub trait ScheduleStore: Send + Sync {
    fn insert_run(&self, run: SchedulerRun) -> Result<(), StoreError>;
    fn update_run(&self, run: &SchedulerRun) -> Result<(), StoreError>;
    fn run(&self, id: &str) -> Result<Option<SchedulerRun>, StoreError>;
    fn runs_with_status(&self, status: RunStatus) -> Result<Vec<SchedulerRun>, StoreError>;

    /// Inserts or replaces a schedule.
    fn save_schedule(&self, schedule: &Schedule) -> Result<(), StoreError>;
    fn schedule(&self, id: &str) -> Result<Option<Schedule>, StoreError>;
    fn schedules(&self, tenant_id: &str) -> Result<Vec<Schedule>, StoreError>;
    fn schedules_for_week(
        &self,
        tenant_id: &str,
        week_start: NaiveDate,
    ) -> Result<Vec<Schedule>, StoreError>;

    /// Replaces the conflict list of a schedule.
    fn replace_conflicts(&self, schedule_id: &str, conflicts: Vec<Conflict>) -> Result<(), StoreError>;
    fn conflicts(&self, schedule_id: &str) -> Result<Vec<Conflict>, StoreError>;

    /// Inserts or replaces an exception.
    fn save_exception(&self, exception: &RuleException) -> Result<(), StoreError>;
    fn exception(&self, id: &str) -> Result<Option<RuleException>, StoreError>;
    fn exceptions(&self, tenant_id: &str) -> Result<Vec<RuleException>, StoreError>;

    fn fairness(&self, tenant_id: &str) -> Result<Vec<FairnessScore>, StoreError>;
    fn save_fairness(&self, tenant_id: &str, scores: Vec<FairnessScore>) -> Result<(), StoreError>;
}

/// Keyed records that remember insertion order.
#[derive(Debug)]
struct Table<T> {
    order: Vec<String>,
    rows: HashMap<String, T>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            order: Vec::new(),
            rows: HashMap::new(),
        }
    }
}

impl<T: Clone> Table<T> {
    fn upsert(&mut self, id: &str, row: T) {
        if self.rows.insert(id.to_string(), row).is_none() {
            self.order.push(id.to_string());
        }
    }

    fn get(&self, id: &str) -> Option<T> {
        self.rows.get(id).cloned()
    }

    fn filtered(&self, keep: impl Fn(&T) -> bool) -> Vec<T> {
        self.order
            .iter()
            .filter_map(|id| self.rows.get(id))
            .filter(|row| keep(row))
            .cloned()
            .collect()
    }
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    runs: RwLock<Table<SchedulerRun>>,
    schedules: RwLock<Table<Schedule>>,
    conflicts: RwLock<HashMap<String, Vec<Conflict>>>,
    exceptions: RwLock<Table<RuleException>>,
    fairness: RwLock<HashMap<String, Vec<FairnessScore>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ScheduleStore for InMemoryStore {
    fn insert_run(&self, run: SchedulerRun) -> Result<(), StoreError> {
        let mut runs = self.runs.write();
        if runs.rows.contains_key(&run.id) {
            return Err(StoreError::Duplicate {
                entity: "run",
                id: run.id,
            });
        }
        let id = run.id.clone();
        runs.upsert(&id, run);
        Ok(())
    }

    fn update_run(&self, run: &SchedulerRun) -> Result<(), StoreError> {
        let mut runs = self.runs.write();
        if !runs.rows.contains_key(&run.id) {
            return Err(StoreError::Missing {
                entity: "run",
                id: run.id.clone(),
            });
        }
        runs.upsert(&run.id, run.clone());
        Ok(())
    }

    fn run(&self, id: &str) -> Result<Option<SchedulerRun>, StoreError> {
        Ok(self.runs.read().get(id))
    }

    fn runs_with_status(&self, status: RunStatus) -> Result<Vec<SchedulerRun>, StoreError> {
        Ok(self.runs.read().filtered(|r| r.status == status))
    }

    fn save_schedule(&self, schedule: &Schedule) -> Result<(), StoreError> {
        self.schedules.write().upsert(&schedule.id, schedule.clone());
        Ok(())
    }

    fn schedule(&self, id: &str) -> Result<Option<Schedule>, StoreError> {
        Ok(self.schedules.read().get(id))
    }

    fn schedules(&self, tenant_id: &str) -> Result<Vec<Schedule>, StoreError> {
        Ok(self.schedules.read().filtered(|s| s.tenant_id == tenant_id))
    }

    fn schedules_for_week(
        &self,
        tenant_id: &str,
        week_start: NaiveDate,
    ) -> Result<Vec<Schedule>, StoreError> {
        Ok(self
            .schedules
            .read()
            .filtered(|s| s.tenant_id == tenant_id && s.week_start == week_start))
    }

    fn replace_conflicts(&self, schedule_id: &str, conflicts: Vec<Conflict>) -> Result<(), StoreError> {
        self.conflicts.write().insert(schedule_id.to_string(), conflicts);
        Ok(())
    }

    fn conflicts(&self, schedule_id: &str) -> Result<Vec<Conflict>, StoreError> {
        Ok(self
            .conflicts
            .read()
            .get(schedule_id)
            .cloned()
            .unwrap_or_default())
    }

    fn save_exception(&self, exception: &RuleException) -> Result<(), StoreError> {
        self.exceptions.write().upsert(&exception.id, exception.clone());
        Ok(())
    }

    fn exception(&self, id: &str) -> Result<Option<RuleException>, StoreError> {
        Ok(self.exceptions.read().get(id))
    }

    fn exceptions(&self, tenant_id: &str) -> Result<Vec<RuleException>, StoreError> {
        Ok(self.exceptions.read().filtered(|e| e.tenant_id == tenant_id))
    }

    fn fairness(&self, tenant_id: &str) -> Result<Vec<FairnessScore>, StoreError> {
        Ok(self
            .fairness
            .read()
            .get(tenant_id)
            .cloned()
            .unwrap_or_default())
    }

    fn save_fairness(&self, tenant_id: &str, scores: Vec<FairnessScore>) -> Result<(), StoreError> {
        self.fairness.write().insert(tenant_id.to_string(), scores);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Algorithm, Assignee};
    use crate::orchestrator::RunRequest;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
    }

    #[test]
    fn test_run_insert_and_update() {
        let store = InMemoryStore::new();
        let mut run = SchedulerRun::queued(RunRequest::new("t1", d(3), d(9), Algorithm::Greedy), 42);
        store.insert_run(run.clone()).unwrap();
        assert!(matches!(
            store.insert_run(run.clone()),
            Err(StoreError::Duplicate { entity: "run", .. })
        ));

        run.status = RunStatus::Running;
        store.update_run(&run).unwrap();
        assert_eq!(store.runs_with_status(RunStatus::Running).unwrap().len(), 1);
        assert!(store.runs_with_status(RunStatus::Queued).unwrap().is_empty());
    }

    #[test]
    fn test_update_missing_run() {
        let store = InMemoryStore::new();
        let run = SchedulerRun::queued(RunRequest::new("t1", d(3), d(9), Algorithm::Greedy), 42);
        assert!(matches!(store.update_run(&run), Err(StoreError::Missing { .. })));
    }

    #[test]
    fn test_schedules_keep_insertion_order() {
        let store = InMemoryStore::new();
        let first = Schedule::new("t1", d(3), d(9), Algorithm::Greedy);
        let second = Schedule::new("t1", d(3), d(9), Algorithm::Genetic);
        let other_week = Schedule::new("t1", d(10), d(16), Algorithm::Greedy);
        for s in [&first, &second, &other_week] {
            store.save_schedule(s).unwrap();
        }
        store.save_schedule(&first).unwrap();

        let week = store.schedules_for_week("t1", d(3)).unwrap();
        assert_eq!(week.len(), 2);
        assert_eq!(week[0].id, first.id);
        assert_eq!(week[1].id, second.id);
        assert_eq!(store.schedules("t1").unwrap().len(), 3);
        assert!(store.schedules("t2").unwrap().is_empty());
    }

    #[test]
    fn test_exceptions_by_tenant() {
        let store = InMemoryStore::new();
        let e1 = RuleException::request("t1", Assignee::Employee("a".into()), "min_rest", "mgr");
        let e2 = RuleException::request("t2", Assignee::Employee("b".into()), "min_rest", "mgr");
        store.save_exception(&e1).unwrap();
        store.save_exception(&e2).unwrap();
        assert_eq!(store.exceptions("t1").unwrap().len(), 1);
        assert_eq!(store.exception(&e2.id).unwrap().unwrap().tenant_id, "t2");
    }
}
