//! Run orchestration.
//!
//! Owns the lifecycle around the pure strategies: input loading and
//! validation, run records, week locks, persistence, conflict detection,
//! fairness commits, manual edits, approvals and exception decisions.
//! Every state change is written to the [`AuditLog`].
//!
//! # Run lifecycle
//!
//! 1. [`Orchestrator::submit`] validates inputs and stores a `queued` run.
//!    Infeasible input is returned to the caller and no run is created.
//! 2. [`Orchestrator::execute`] takes the week lock, marks the run
//!    `running` and dispatches the strategy inside `catch_unwind`.
//! 3. The result is persisted as a draft schedule, conflicts are detected
//!    and the run is finalised. Fairness is committed only when every slot
//!    is filled without hard violations; otherwise the run is `failed`
//!    and the partial schedule is kept for operators.
//!
//! Runs on different weeks or tenants proceed in parallel. A run or edit
//! that collides with a held week gets `ConcurrentEditConflict` with a
//! retry hint.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use chrono::NaiveDate;
//! use u_roster::config::SchedulerConfig;
//! use u_roster::models::Algorithm;
//! use u_roster::orchestrator::{InMemoryStore, Orchestrator, RunRequest, StaticDirectory};
//!
//! let directory = StaticDirectory::from_path("seed.json", &Default::default()).unwrap();
//! let orchestrator = Orchestrator::new(
//!     SchedulerConfig::default(),
//!     Arc::new(directory),
//!     Arc::new(InMemoryStore::new()),
//! );
//! let monday = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
//! let sunday = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();
//! let run = orchestrator
//!     .run(RunRequest::new("acme", monday, sunday, Algorithm::Greedy))
//!     .unwrap();
//! println!("{:?} {:?}", run.status, run.schedule_id);
//! ```

mod directory;
mod locks;
mod run;
mod store;

pub use directory::{StaticDirectory, TenantData, WorkforceDirectory};
pub use locks::{WeekGuard, WeekKey, WeekLocks};
pub use run::{RunRequest, RunStatus, SchedulerRun};
pub use store::{InMemoryStore, ScheduleStore, StoreError};

use std::any::Any;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate, Utc};
use parking_lot::Mutex;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::audit::{AuditAction, AuditEntry, AuditLog};
use crate::config::SchedulerConfig;
use crate::conflicts::{annotate, ConflictDetector};
use crate::error::{SchedulerError, SchedulerResult};
use crate::fairness::{FairnessScore, FairnessTracker, ScoreKey, ScoreScope};
use crate::models::{
    Algorithm, AssignedBy, Assignee, Assignment, AssignmentMode, Conflict, ExceptionStatus,
    RuleException, Schedule, ScheduleStatus, ShiftCategory,
};
use crate::rules::PriorContext;
use crate::scheduler::{
    expand_slots, Budget, RosterKpi, ScheduleProblem, StrategyOutcome, StrategyRegistry,
};
use crate::validation::validate_problem;

/// Horizon and inputs selector shared by runs and re-evaluations.
struct Horizon<'a> {
    tenant_id: &'a str,
    week_start: NaiveDate,
    week_end: NaiveDate,
    rule_set_id: Option<&'a str>,
    mode: AssignmentMode,
    as_of: NaiveDate,
}

/// Coordinates runs, edits and approvals for all tenants.
pub struct Orchestrator {
    config: SchedulerConfig,
    registry: StrategyRegistry,
    directory: Arc<dyn WorkforceDirectory>,
    store: Arc<dyn ScheduleStore>,
    audit: AuditLog,
    locks: WeekLocks,
    detector: ConflictDetector,
    cancel_flags: Mutex<HashMap<String, Arc<AtomicBool>>>,
    /// Serialises run status read-modify-write between cancel and execute.
    transitions: Mutex<()>,
    /// Serialises fairness read-modify-write per process.
    fairness: Mutex<()>,
}

impl Orchestrator {
    /// Creates an orchestrator with every built-in strategy registered.
    pub fn new(
        config: SchedulerConfig,
        directory: Arc<dyn WorkforceDirectory>,
        store: Arc<dyn ScheduleStore>,
    ) -> Self {
        Self {
            registry: StrategyRegistry::with_defaults(&config),
            locks: WeekLocks::new(config.retry_after_ms),
            config,
            directory,
            store,
            audit: AuditLog::new(),
            detector: ConflictDetector::new(),
            cancel_flags: Mutex::new(HashMap::new()),
            transitions: Mutex::new(()),
            fairness: Mutex::new(()),
        }
    }

    /// Replaces the strategy registry.
    pub fn with_registry(mut self, registry: StrategyRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub fn locks(&self) -> &WeekLocks {
        &self.locks
    }

    pub fn algorithms(&self) -> Vec<Algorithm> {
        self.registry.algorithms()
    }

    // ======================== Runs ========================

    /// Validates the request and stores a queued run.
    pub fn submit(&self, request: RunRequest) -> SchedulerResult<SchedulerRun> {
        self.registry.get(request.algorithm)?;
        let run = SchedulerRun::queued(request, self.config.seed);
        let problem = self.problem_for_run(&run)?;
        validate_problem(&problem).map_err(SchedulerError::InfeasibleInput)?;

        self.store.insert_run(run.clone())?;
        self.cancel_flags
            .lock()
            .insert(run.id.clone(), Arc::new(AtomicBool::new(false)));
        self.record(
            AuditEntry::new(
                &run.tenant_id,
                &run.requested_by,
                AuditAction::RunSubmitted,
                "run",
                &run.id,
            )
            .with_detail(json!({
                "algorithm": run.algorithm,
                "week_start": run.week_start,
                "week_end": run.week_end,
            })),
        );
        info!(
            run_id = %run.id,
            tenant = %run.tenant_id,
            algorithm = %run.algorithm,
            week_start = %run.week_start,
            "run queued"
        );
        Ok(run)
    }

    /// Cancels a run. Queued runs end `cancelled`; running runs have their
    /// search stopped and finish with the best result found so far.
    pub fn cancel(&self, tenant_id: &str, run_id: &str, actor: &str) -> SchedulerResult<SchedulerRun> {
        let _transition = self.transitions.lock();
        let mut run = self.load_run(tenant_id, run_id)?;
        match run.status {
            RunStatus::Queued => {
                run.cancel();
                self.store.update_run(&run)?;
                self.cancel_flags.lock().remove(&run.id);
            }
            RunStatus::Running => {
                if let Some(flag) = self.cancel_flags.lock().get(&run.id) {
                    flag.store(true, Ordering::Relaxed);
                }
            }
            status => {
                return Err(SchedulerError::RunState {
                    id: run.id,
                    status: status.label().to_string(),
                    expected: "queued or running",
                })
            }
        }
        self.record(
            AuditEntry::new(tenant_id, actor, AuditAction::RunCancelled, "run", &run.id)
                .with_detail(json!({ "status": run.status })),
        );
        info!(run_id = %run.id, status = run.status.label(), "run cancelled");
        Ok(run)
    }

    /// Executes a queued run to completion.
    ///
    /// Strategy failures and panics are recorded on the returned run; only
    /// lock collisions, lookup failures and storage errors are returned as
    /// `Err`. A run rejected by a lock collision stays queued.
    pub fn execute(&self, run_id: &str) -> SchedulerResult<SchedulerRun> {
        let (mut run, _guard) = self.claim(run_id)?;
        let flag = self.cancel_flag(&run.id);

        match self.dispatch(&run, flag) {
            Ok((problem, outcome)) => self.finish(&mut run, &problem, outcome)?,
            Err(err) => {
                warn!(run_id = %run.id, error = %err, "run failed");
                run.fail(err.to_string());
                self.store.update_run(&run)?;
                self.record(
                    AuditEntry::new(&run.tenant_id, "system", AuditAction::RunFailed, "run", &run.id)
                        .with_detail(json!({ "failure": run.failure })),
                );
            }
        }
        self.cancel_flags.lock().remove(&run.id);
        Ok(run)
    }

    /// Submits and executes in one call.
    pub fn run(&self, request: RunRequest) -> SchedulerResult<SchedulerRun> {
        let run = self.submit(request)?;
        self.execute(&run.id)
    }

    /// Executes every queued run once, oldest first. Runs whose week is
    /// busy stay queued for the next pass.
    pub fn drain(&self) -> SchedulerResult<Vec<SchedulerRun>> {
        let queued = self.store.runs_with_status(RunStatus::Queued)?;
        let mut finished = Vec::with_capacity(queued.len());
        for run in queued {
            match self.execute(&run.id) {
                Ok(done) => finished.push(done),
                Err(err @ SchedulerError::ConcurrentEditConflict { .. }) => {
                    debug!(run_id = %run.id, error = %err, "week busy, run stays queued");
                }
                Err(SchedulerError::Cancelled(_)) | Err(SchedulerError::RunState { .. }) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(finished)
    }

    fn claim(&self, run_id: &str) -> SchedulerResult<(SchedulerRun, WeekGuard<'_>)> {
        let _transition = self.transitions.lock();
        let mut run = self
            .store
            .run(run_id)?
            .ok_or_else(|| SchedulerError::not_found("run", run_id))?;
        match run.status {
            RunStatus::Queued => {}
            RunStatus::Cancelled => return Err(SchedulerError::Cancelled(run.id)),
            status => {
                return Err(SchedulerError::RunState {
                    id: run.id,
                    status: status.label().to_string(),
                    expected: "queued",
                })
            }
        }

        let guard = self
            .locks
            .try_acquire(WeekKey::new(&run.tenant_id, run.week_start))?;
        if self
            .current_schedule(&run.tenant_id, run.week_start)?
            .is_some_and(|s| s.locked_for_edit)
        {
            return Err(SchedulerError::ConcurrentEditConflict {
                key: guard.key().to_string(),
                retry_after_ms: self.config.retry_after_ms,
            });
        }

        run.start();
        self.store.update_run(&run)?;
        debug!(run_id = %run.id, "run started");
        Ok((run, guard))
    }

    fn cancel_flag(&self, run_id: &str) -> Arc<AtomicBool> {
        self.cancel_flags
            .lock()
            .entry(run_id.to_string())
            .or_insert_with(|| Arc::new(AtomicBool::new(false)))
            .clone()
    }

    fn dispatch(
        &self,
        run: &SchedulerRun,
        cancel: Arc<AtomicBool>,
    ) -> SchedulerResult<(ScheduleProblem, StrategyOutcome)> {
        let problem = self.problem_for_run(run)?;
        validate_problem(&problem).map_err(SchedulerError::InfeasibleInput)?;
        let strategy = self.registry.get(run.algorithm)?;
        let budget = Budget::new(self.config.run_budget())
            .with_seed(run.seed)
            .with_cancel(cancel);

        let result = panic::catch_unwind(AssertUnwindSafe(|| strategy.generate(&problem, &budget)));
        let outcome = match result {
            Ok(outcome) => outcome?,
            Err(payload) => {
                return Err(SchedulerError::StrategyFailed {
                    algorithm: run.algorithm.to_string(),
                    message: panic_message(payload.as_ref()),
                })
            }
        };
        Ok((problem, outcome))
    }

    fn finish(
        &self,
        run: &mut SchedulerRun,
        problem: &ScheduleProblem,
        outcome: StrategyOutcome,
    ) -> SchedulerResult<()> {
        let complete = outcome.is_complete();
        let slot_count = expand_slots(problem).len();

        let mut schedule = Schedule::new(&run.tenant_id, run.week_start, run.week_end, run.algorithm)
            .with_rule_set(problem.rule_set.id.clone(), problem.rule_set.version)
            .with_mode(run.mode);
        for assignment in outcome.assignments {
            schedule.add_assignment(assignment);
        }
        schedule.score = outcome.evaluation.score;
        schedule.violated_hard = outcome.evaluation.hard_rule_ids();
        schedule.violated_soft = outcome.evaluation.soft_rule_ids();
        schedule.telemetry = outcome.telemetry;
        schedule.unfilled = outcome.unfilled;
        self.persist_with_conflicts(&mut schedule, problem)?;

        run.schedule_id = Some(schedule.id.clone());
        run.score = Some(schedule.score);
        run.violated_hard = schedule.violated_hard.clone();
        run.unfilled_slots = schedule.unfilled.iter().map(|s| s.id.clone()).collect();
        run.telemetry = schedule.telemetry.clone();
        run.kpi = Some(RosterKpi::calculate(
            &schedule.assignments,
            slot_count,
            &problem.pool(),
        ));

        if complete {
            let committed = self.commit_fairness(run, &schedule)?;
            run.complete();
            self.store.update_run(run)?;
            self.record(
                AuditEntry::new(&run.tenant_id, "system", AuditAction::RunCompleted, "run", &run.id)
                    .with_detail(json!({
                        "schedule_id": schedule.id,
                        "score": schedule.score,
                        "truncated": schedule.telemetry.truncated,
                        "fallback": schedule.telemetry.fallback,
                        "fairness_commits": committed,
                    })),
            );
            info!(
                run_id = %run.id,
                schedule_id = %schedule.id,
                score = schedule.score,
                runtime_ms = schedule.telemetry.runtime_ms,
                iterations = schedule.telemetry.iterations,
                truncated = schedule.telemetry.truncated,
                "run completed"
            );
        } else {
            let err = SchedulerError::HardConstraintUnsatisfied {
                unfilled: schedule.unfilled.len(),
                violated: schedule.violated_hard.clone(),
            };
            warn!(
                run_id = %run.id,
                schedule_id = %schedule.id,
                unfilled = schedule.unfilled.len(),
                violated = ?schedule.violated_hard,
                "run produced a partial schedule"
            );
            run.fail(err.to_string());
            self.store.update_run(run)?;
            self.record(
                AuditEntry::new(&run.tenant_id, "system", AuditAction::RunFailed, "run", &run.id)
                    .with_detail(json!({
                        "schedule_id": schedule.id,
                        "unfilled": run.unfilled_slots,
                        "violated_hard": run.violated_hard,
                    })),
            );
        }
        Ok(())
    }

    /// Commits placements that the tenant's fairness history does not
    /// already hold. Returns the number of commits.
    fn commit_fairness(&self, run: &SchedulerRun, schedule: &Schedule) -> SchedulerResult<usize> {
        let _fairness = self.fairness.lock();
        let mut tracker = FairnessTracker::from_scores(
            self.config.fairness.clone(),
            self.store.fairness(&run.tenant_id)?,
        );
        let mut seen: HashMap<(ScoreKey, NaiveDate, ShiftCategory), usize> = HashMap::new();
        let mut committed = 0;
        for assignment in &schedule.assignments {
            let key = ScoreKey::from(&assignment.assignee);
            let recorded = tracker.committed_on(&key, assignment.date, &assignment.category);
            let seen = seen
                .entry((key, assignment.date, assignment.category.clone()))
                .or_default();
            *seen += 1;
            if *seen <= recorded {
                continue;
            }
            tracker.commit_assignment(assignment, Some(&run.id));
            committed += 1;
        }
        self.store
            .save_fairness(&run.tenant_id, tracker.scores().cloned().collect())?;
        self.record(
            AuditEntry::new(
                &run.tenant_id,
                "system",
                AuditAction::FairnessCommitted,
                "schedule",
                &schedule.id,
            )
            .with_detail(json!({ "run_id": run.id, "commits": committed })),
        );
        Ok(committed)
    }

    // ======================== Manual edits ========================

    /// Assigns `assignee` to a slot by hand and locks it against
    /// regeneration. The schedule is re-evaluated and its conflicts
    /// re-detected.
    pub fn override_assignment(
        &self,
        tenant_id: &str,
        schedule_id: &str,
        slot_id: &str,
        assignee: Assignee,
        actor: &str,
    ) -> SchedulerResult<Schedule> {
        let week_start = self.load_schedule(tenant_id, schedule_id)?.week_start;
        let _guard = self.locks.try_acquire(WeekKey::new(tenant_id, week_start))?;
        let mut schedule = self.load_schedule(tenant_id, schedule_id)?;
        ensure_editable(&schedule)?;

        let previous = match schedule.assignments.iter_mut().find(|a| a.slot_id == slot_id) {
            Some(existing) => {
                let previous = existing.assignee.clone();
                existing.assignee = assignee.clone();
                existing.assigned_by = AssignedBy::Manual;
                existing.manual_lock = true;
                Some(previous)
            }
            None => {
                let index = schedule
                    .unfilled
                    .iter()
                    .position(|s| s.id == slot_id)
                    .ok_or_else(|| SchedulerError::not_found("slot", slot_id))?;
                let slot = schedule.unfilled.remove(index);
                schedule.add_assignment(
                    Assignment::for_slot(&slot, assignee.clone())
                        .with_assigned_by(AssignedBy::Manual)
                        .locked(),
                );
                None
            }
        };

        self.reevaluate(&mut schedule)?;
        self.record(
            AuditEntry::new(tenant_id, actor, AuditAction::ManualOverride, "assignment", slot_id)
                .with_detail(json!({
                    "schedule_id": schedule.id,
                    "from": previous.map(|a| a.to_string()),
                    "to": assignee.to_string(),
                    "score": schedule.score,
                })),
        );
        info!(
            schedule_id = %schedule.id,
            slot_id,
            assignee = %assignee,
            actor,
            "manual override"
        );
        Ok(schedule)
    }

    /// Releases a manual lock so the slot can be regenerated.
    pub fn unlock_assignment(
        &self,
        tenant_id: &str,
        schedule_id: &str,
        slot_id: &str,
        actor: &str,
    ) -> SchedulerResult<Schedule> {
        let week_start = self.load_schedule(tenant_id, schedule_id)?.week_start;
        let _guard = self.locks.try_acquire(WeekKey::new(tenant_id, week_start))?;
        let mut schedule = self.load_schedule(tenant_id, schedule_id)?;
        ensure_editable(&schedule)?;

        let assignment = schedule
            .assignments
            .iter_mut()
            .find(|a| a.slot_id == slot_id)
            .ok_or_else(|| SchedulerError::not_found("assignment", slot_id))?;
        assignment.manual_lock = false;
        self.store.save_schedule(&schedule)?;
        self.record(
            AuditEntry::new(tenant_id, actor, AuditAction::AssignmentUnlocked, "assignment", slot_id)
                .with_detail(json!({ "schedule_id": schedule.id })),
        );
        Ok(schedule)
    }

    /// Holds the whole schedule for manual editing; regeneration of its
    /// week is refused until [`Orchestrator::end_edit`].
    pub fn begin_edit(&self, tenant_id: &str, schedule_id: &str, actor: &str) -> SchedulerResult<Schedule> {
        self.set_edit_lock(tenant_id, schedule_id, actor, true)
    }

    pub fn end_edit(&self, tenant_id: &str, schedule_id: &str, actor: &str) -> SchedulerResult<Schedule> {
        self.set_edit_lock(tenant_id, schedule_id, actor, false)
    }

    fn set_edit_lock(
        &self,
        tenant_id: &str,
        schedule_id: &str,
        actor: &str,
        locked: bool,
    ) -> SchedulerResult<Schedule> {
        let week_start = self.load_schedule(tenant_id, schedule_id)?.week_start;
        let _guard = self.locks.try_acquire(WeekKey::new(tenant_id, week_start))?;
        let mut schedule = self.load_schedule(tenant_id, schedule_id)?;
        if locked {
            ensure_editable(&schedule)?;
        }
        schedule.locked_for_edit = locked;
        self.store.save_schedule(&schedule)?;
        let action = if locked {
            AuditAction::EditLocked
        } else {
            AuditAction::EditReleased
        };
        self.record(AuditEntry::new(tenant_id, actor, action, "schedule", schedule_id));
        Ok(schedule)
    }

    /// Re-runs conflict detection for a schedule against current inputs.
    pub fn refresh_conflicts(&self, tenant_id: &str, schedule_id: &str) -> SchedulerResult<Vec<Conflict>> {
        let week_start = self.load_schedule(tenant_id, schedule_id)?.week_start;
        let _guard = self.locks.try_acquire(WeekKey::new(tenant_id, week_start))?;
        let mut schedule = self.load_schedule(tenant_id, schedule_id)?;
        let problem = self.problem_for_schedule(&schedule)?;
        self.persist_with_conflicts(&mut schedule, &problem)
    }

    fn reevaluate(&self, schedule: &mut Schedule) -> SchedulerResult<()> {
        let problem = self.problem_for_schedule(schedule)?;
        let manual = self.registry.get(Algorithm::Manual)?;
        let outcome = manual.generate(&problem, &Budget::unlimited())?;
        schedule.score = outcome.evaluation.score;
        schedule.violated_hard = outcome.evaluation.hard_rule_ids();
        schedule.violated_soft = outcome.evaluation.soft_rule_ids();
        schedule.unfilled = outcome.unfilled;
        self.persist_with_conflicts(schedule, &problem)?;
        Ok(())
    }

    fn persist_with_conflicts(
        &self,
        schedule: &mut Schedule,
        problem: &ScheduleProblem,
    ) -> SchedulerResult<Vec<Conflict>> {
        let conflicts = self.detector.detect(schedule, problem);
        annotate(schedule, &conflicts);
        self.store.save_schedule(schedule)?;
        self.store.replace_conflicts(&schedule.id, conflicts.clone())?;
        Ok(conflicts)
    }

    // ======================== Approval lifecycle ========================

    pub fn submit_for_approval(&self, tenant_id: &str, schedule_id: &str, actor: &str) -> SchedulerResult<Schedule> {
        self.transition(tenant_id, schedule_id, ScheduleStatus::PendingApproval, actor)
    }

    pub fn approve(&self, tenant_id: &str, schedule_id: &str, actor: &str) -> SchedulerResult<Schedule> {
        self.transition(tenant_id, schedule_id, ScheduleStatus::Approved, actor)
    }

    pub fn reject(&self, tenant_id: &str, schedule_id: &str, actor: &str) -> SchedulerResult<Schedule> {
        self.transition(tenant_id, schedule_id, ScheduleStatus::Rejected, actor)
    }

    pub fn activate(&self, tenant_id: &str, schedule_id: &str, actor: &str) -> SchedulerResult<Schedule> {
        self.transition(tenant_id, schedule_id, ScheduleStatus::Active, actor)
    }

    pub fn archive(&self, tenant_id: &str, schedule_id: &str, actor: &str) -> SchedulerResult<Schedule> {
        self.transition(tenant_id, schedule_id, ScheduleStatus::Archived, actor)
    }

    /// Reopens a rejected schedule as a draft.
    pub fn reopen(&self, tenant_id: &str, schedule_id: &str, actor: &str) -> SchedulerResult<Schedule> {
        self.transition(tenant_id, schedule_id, ScheduleStatus::Draft, actor)
    }

    fn transition(
        &self,
        tenant_id: &str,
        schedule_id: &str,
        next: ScheduleStatus,
        actor: &str,
    ) -> SchedulerResult<Schedule> {
        let week_start = self.load_schedule(tenant_id, schedule_id)?.week_start;
        let _guard = self.locks.try_acquire(WeekKey::new(tenant_id, week_start))?;
        let mut schedule = self.load_schedule(tenant_id, schedule_id)?;
        let from = schedule.status;
        schedule.transition(next)?;
        self.store.save_schedule(&schedule)?;
        self.record(
            AuditEntry::new(tenant_id, actor, AuditAction::StatusChanged, "schedule", schedule_id)
                .with_detail(json!({ "from": from, "to": next })),
        );
        info!(schedule_id, from = ?from, to = ?next, actor, "schedule status changed");
        Ok(schedule)
    }

    // ======================== Exceptions ========================

    /// Files a new exception request. It starts pending whatever status
    /// the caller supplied.
    pub fn request_exception(&self, mut exception: RuleException) -> SchedulerResult<RuleException> {
        exception.status = ExceptionStatus::Pending;
        exception.decided_by = None;
        exception.decided_at = None;
        self.store.save_exception(&exception)?;
        self.record(
            AuditEntry::new(
                &exception.tenant_id,
                &exception.requested_by,
                AuditAction::ExceptionRequested,
                "exception",
                &exception.id,
            )
            .with_detail(json!({
                "assignee": exception.assignee.to_string(),
                "rule_id": exception.rule_id,
                "date": exception.date,
                "valid_until": exception.valid_until,
            })),
        );
        Ok(exception)
    }

    /// Approves a pending exception. Requests whose validity window has
    /// already lapsed as of `today` are refused.
    pub fn approve_exception(
        &self,
        tenant_id: &str,
        exception_id: &str,
        actor: &str,
        today: NaiveDate,
    ) -> SchedulerResult<RuleException> {
        let exception = self.pending_exception(tenant_id, exception_id)?;
        if exception.is_expired(today) {
            return Err(SchedulerError::ExceptionExpired(exception.id));
        }
        let exception = exception.approved_by(actor);
        self.store.save_exception(&exception)?;
        self.record(AuditEntry::new(
            tenant_id,
            actor,
            AuditAction::ExceptionApproved,
            "exception",
            exception_id,
        ));
        Ok(exception)
    }

    pub fn reject_exception(
        &self,
        tenant_id: &str,
        exception_id: &str,
        actor: &str,
    ) -> SchedulerResult<RuleException> {
        let mut exception = self.pending_exception(tenant_id, exception_id)?;
        exception.status = ExceptionStatus::Rejected;
        exception.decided_by = Some(actor.to_string());
        exception.decided_at = Some(Utc::now());
        self.store.save_exception(&exception)?;
        self.record(AuditEntry::new(
            tenant_id,
            actor,
            AuditAction::ExceptionRejected,
            "exception",
            exception_id,
        ));
        Ok(exception)
    }

    fn pending_exception(&self, tenant_id: &str, id: &str) -> SchedulerResult<RuleException> {
        let exception = self
            .store
            .exception(id)?
            .filter(|e| e.tenant_id == tenant_id)
            .ok_or_else(|| SchedulerError::not_found("exception", id))?;
        if exception.status != ExceptionStatus::Pending {
            return Err(SchedulerError::ExceptionDecided(exception.id));
        }
        Ok(exception)
    }

    // ======================== Queries ========================

    pub fn get_run(&self, tenant_id: &str, run_id: &str) -> SchedulerResult<SchedulerRun> {
        self.load_run(tenant_id, run_id)
    }

    pub fn schedule(&self, tenant_id: &str, schedule_id: &str) -> SchedulerResult<Schedule> {
        self.load_schedule(tenant_id, schedule_id)
    }

    /// Every schedule generated for a week, oldest first.
    pub fn schedules_for_week(&self, tenant_id: &str, week_start: NaiveDate) -> SchedulerResult<Vec<Schedule>> {
        Ok(self.store.schedules_for_week(tenant_id, week_start)?)
    }

    /// Latest schedule of a week that is neither rejected nor archived.
    pub fn current_schedule(&self, tenant_id: &str, week_start: NaiveDate) -> SchedulerResult<Option<Schedule>> {
        Ok(self
            .store
            .schedules_for_week(tenant_id, week_start)?
            .into_iter()
            .rev()
            .find(|s| is_live(s.status)))
    }

    pub fn conflicts(&self, tenant_id: &str, schedule_id: &str) -> SchedulerResult<Vec<Conflict>> {
        let schedule = self.load_schedule(tenant_id, schedule_id)?;
        Ok(self.store.conflicts(&schedule.id)?)
    }

    /// Assignments of an employee in the week's current schedule,
    /// including shifts held by their team.
    pub fn assignments_for_employee(
        &self,
        tenant_id: &str,
        employee_id: &str,
        week_start: NaiveDate,
    ) -> SchedulerResult<Vec<Assignment>> {
        let teams: HashSet<String> = self
            .directory
            .teams(tenant_id)?
            .into_iter()
            .filter(|t| t.members.iter().any(|m| m == employee_id))
            .map(|t| t.id)
            .collect();
        self.current_assignments(tenant_id, week_start, |assignee| match assignee {
            Assignee::Employee(id) => id == employee_id,
            Assignee::Team(id) => teams.contains(id),
        })
    }

    /// Assignments of a team in the week's current schedule, including
    /// shifts held individually by its members.
    pub fn assignments_for_team(
        &self,
        tenant_id: &str,
        team_id: &str,
        week_start: NaiveDate,
    ) -> SchedulerResult<Vec<Assignment>> {
        let members: HashSet<String> = self
            .directory
            .teams(tenant_id)?
            .into_iter()
            .find(|t| t.id == team_id)
            .map(|t| t.members.into_iter().collect())
            .ok_or_else(|| SchedulerError::not_found("team", team_id))?;
        self.current_assignments(tenant_id, week_start, |assignee| match assignee {
            Assignee::Team(id) => id == team_id,
            Assignee::Employee(id) => members.contains(id),
        })
    }

    fn current_assignments(
        &self,
        tenant_id: &str,
        week_start: NaiveDate,
        keep: impl Fn(&Assignee) -> bool,
    ) -> SchedulerResult<Vec<Assignment>> {
        let Some(schedule) = self.current_schedule(tenant_id, week_start)? else {
            return Ok(Vec::new());
        };
        let mut found: Vec<Assignment> = schedule
            .assignments
            .into_iter()
            .filter(|a| keep(&a.assignee))
            .collect();
        found.sort_by_key(|a| a.window.start);
        Ok(found)
    }

    pub fn exceptions(&self, tenant_id: &str) -> SchedulerResult<Vec<RuleException>> {
        Ok(self.store.exceptions(tenant_id)?)
    }

    pub fn fairness(&self, tenant_id: &str) -> SchedulerResult<Vec<FairnessScore>> {
        Ok(self.store.fairness(tenant_id)?)
    }

    // ======================== Inputs ========================

    fn problem_for_run(&self, run: &SchedulerRun) -> SchedulerResult<ScheduleProblem> {
        let horizon = Horizon {
            tenant_id: &run.tenant_id,
            week_start: run.week_start,
            week_end: run.week_end,
            rule_set_id: run.rule_set_id.as_deref(),
            mode: run.mode,
            as_of: run.as_of.unwrap_or_else(|| Utc::now().date_naive()),
        };
        let mut problem = self.build_problem(&horizon)?;
        problem.existing = self.carried_assignments(&horizon)?;
        Ok(problem)
    }

    fn problem_for_schedule(&self, schedule: &Schedule) -> SchedulerResult<ScheduleProblem> {
        let horizon = Horizon {
            tenant_id: &schedule.tenant_id,
            week_start: schedule.week_start,
            week_end: schedule.week_end,
            rule_set_id: Some(&schedule.rule_set_id),
            mode: schedule.mode,
            as_of: Utc::now().date_naive(),
        };
        let mut problem = self.build_problem(&horizon)?;
        problem.existing = schedule.assignments.clone();
        Ok(problem)
    }

    fn build_problem(&self, horizon: &Horizon<'_>) -> SchedulerResult<ScheduleProblem> {
        let tenant = horizon.tenant_id;
        let rule_set = self
            .directory
            .rule_set(tenant, horizon.rule_set_id)?
            .ok_or_else(|| {
                SchedulerError::not_found("rule_set", horizon.rule_set_id.unwrap_or("default"))
            })?;

        let mut problem =
            ScheduleProblem::new(tenant, horizon.week_start, horizon.week_end, rule_set)
                .with_mode(horizon.mode)
                .with_employees(self.directory.employees(tenant)?)
                .with_demand(self.directory.demand(tenant)?)
                .with_availability(self.directory.availability(
                    tenant,
                    horizon.week_start,
                    horizon.week_end,
                )?)
                .with_as_of(horizon.as_of);
        problem.teams = self.directory.teams(tenant)?;
        problem.templates = self.directory.templates(tenant)?;
        problem.exceptions = self.store.exceptions(tenant)?;
        problem.prior = self.prior_context(horizon)?;
        Ok(problem)
    }

    /// Live schedules of a tenant, the latest per week, in week order.
    fn history(&self, tenant_id: &str) -> SchedulerResult<Vec<Schedule>> {
        let mut latest: BTreeMap<NaiveDate, Schedule> = BTreeMap::new();
        for schedule in self.store.schedules(tenant_id)? {
            if is_live(schedule.status) {
                latest.insert(schedule.week_start, schedule);
            }
        }
        Ok(latest.into_values().collect())
    }

    /// Assignments of live schedules that fall inside the horizon. Locked
    /// ones become fixed givens; the manual strategy evaluates all of them.
    fn carried_assignments(&self, horizon: &Horizon<'_>) -> SchedulerResult<Vec<Assignment>> {
        let mut by_slot: BTreeMap<String, Assignment> = BTreeMap::new();
        for schedule in self.history(horizon.tenant_id)? {
            if schedule.mode != horizon.mode {
                continue;
            }
            for a in schedule.assignments {
                if a.date >= horizon.week_start && a.date <= horizon.week_end {
                    by_slot.insert(a.slot_id.clone(), a);
                }
            }
        }
        Ok(by_slot.into_values().collect())
    }

    /// Tallies carried into the horizon from earlier live schedules.
    fn prior_context(&self, horizon: &Horizon<'_>) -> SchedulerResult<PriorContext> {
        let week_start = horizon.week_start;
        let calendar_week_start = week_start
            - Duration::days(i64::from(week_start.weekday().num_days_from_monday()));
        let wants_team = horizon.mode == AssignmentMode::Team;

        let mut prior = PriorContext::default();
        let mut worked: HashMap<String, HashSet<NaiveDate>> = HashMap::new();
        for schedule in self.history(horizon.tenant_id)? {
            for a in &schedule.assignments {
                if a.date >= week_start || a.assignee.is_team() != wants_team {
                    continue;
                }
                let id = a.assignee.id().to_string();
                let end = prior.last_shift_end.entry(id.clone()).or_insert(a.window.end);
                if a.window.end > *end {
                    *end = a.window.end;
                }
                if a.date >= calendar_week_start {
                    if a.is_night() {
                        *prior.night_shifts.entry(id.clone()).or_insert(0) += 1;
                    }
                    *prior.hours_worked.entry(id.clone()).or_insert(0.0) += a.hours();
                }
                worked.entry(id).or_default().insert(a.date);
            }
        }
        for (id, days) in worked {
            let mut streak = 0u32;
            let mut day = week_start.pred_opt();
            while let Some(current) = day.filter(|d| days.contains(d)) {
                streak += 1;
                day = current.pred_opt();
            }
            if streak > 0 {
                prior.consecutive_days.insert(id, streak);
            }
        }

        let scope = if wants_team {
            ScoreScope::Team
        } else {
            ScoreScope::Employee
        };
        let tracker = FairnessTracker::from_scores(
            self.config.fairness.clone(),
            self.store.fairness(horizon.tenant_id)?,
        );
        prior.fairness = tracker.snapshot(scope);
        Ok(prior)
    }

    // ======================== Helpers ========================

    fn load_run(&self, tenant_id: &str, run_id: &str) -> SchedulerResult<SchedulerRun> {
        self.store
            .run(run_id)?
            .filter(|r| r.tenant_id == tenant_id)
            .ok_or_else(|| SchedulerError::not_found("run", run_id))
    }

    fn load_schedule(&self, tenant_id: &str, schedule_id: &str) -> SchedulerResult<Schedule> {
        self.store
            .schedule(schedule_id)?
            .filter(|s| s.tenant_id == tenant_id)
            .ok_or_else(|| SchedulerError::not_found("schedule", schedule_id))
    }

    fn record(&self, entry: AuditEntry) {
        self.audit.record(entry);
    }
}

fn is_live(status: ScheduleStatus) -> bool {
    !matches!(status, ScheduleStatus::Rejected | ScheduleStatus::Archived)
}

fn ensure_editable(schedule: &Schedule) -> SchedulerResult<()> {
    if is_live(schedule.status) {
        Ok(())
    } else {
        Err(SchedulerError::ScheduleClosed {
            id: schedule.id.clone(),
            status: schedule.status,
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
