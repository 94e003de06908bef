//! Multi-week flows through the public orchestrator API.

use std::sync::Arc;
use std::thread;

use chrono::{NaiveDate, NaiveTime};
use u_roster::config::SchedulerConfig;
use u_roster::error::SchedulerError;
use u_roster::fairness::ScoreScope;
use u_roster::models::{
    Algorithm, Assignee, AssignmentMode, DemandRequirement, Employee, RuleException,
    ScheduleStatus, ShiftCategory, ShiftTemplate, Team,
};
use u_roster::orchestrator::{
    InMemoryStore, Orchestrator, RunRequest, RunStatus, StaticDirectory, TenantData, WeekKey,
};
use u_roster::rules::{RuleDefaults, RuleSet};

const TENANT: &str = "acme";

fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
}

fn t(h: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, 0, 0).unwrap()
}

fn ward() -> TenantData {
    TenantData::new()
        .with_employees(["a", "b", "c", "d"].map(|id| Employee::new(id).with_role("nurse")))
        .with_team(Team::new("red").with_member("a").with_member("b"))
        .with_team(Team::new("blue").with_member("c").with_member("d"))
        .with_template(ShiftTemplate::new("early", t(6), t(14), ShiftCategory::Day))
        .with_demand(DemandRequirement::every_day("early", 1))
        .with_rule_set(RuleSet::standard("std", TENANT, &RuleDefaults::default()))
}

fn orchestrator(data: TenantData) -> Arc<Orchestrator> {
    Arc::new(Orchestrator::new(
        SchedulerConfig::default(),
        Arc::new(StaticDirectory::new().with_tenant(TENANT, data)),
        Arc::new(InMemoryStore::new()),
    ))
}

fn week(start: u32, algorithm: Algorithm) -> RunRequest {
    RunRequest::new(TENANT, d(start), d(start + 6), algorithm).as_of(d(1))
}

#[test]
fn test_two_weeks_accumulate_fairness() {
    let orch = orchestrator(ward());
    let first = orch.run(week(3, Algorithm::Greedy)).unwrap();
    let second = orch.run(week(10, Algorithm::ScoreRank)).unwrap();
    assert_eq!(first.status, RunStatus::Completed);
    assert_eq!(second.status, RunStatus::Completed);

    let scores = orch.fairness(TENANT).unwrap();
    let total: u32 = scores.iter().map(|s| s.total_shifts).sum();
    assert_eq!(total, 14);
    // Score-rank favours whoever has worked least, so nobody is left out.
    assert_eq!(scores.len(), 4, "{scores:?}");
}

#[test]
fn test_team_mode_assigns_teams() {
    let orch = orchestrator(ward());
    let run = orch
        .run(week(3, Algorithm::Greedy).with_mode(AssignmentMode::Team))
        .unwrap();
    assert_eq!(run.status, RunStatus::Completed);

    let schedule = orch
        .schedule(TENANT, run.schedule_id.as_deref().unwrap())
        .unwrap();
    assert_eq!(schedule.mode, AssignmentMode::Team);
    assert!(schedule.assignments.iter().all(|a| a.assignee.is_team()));

    let scores = orch.fairness(TENANT).unwrap();
    assert!(scores.iter().all(|s| s.scope == ScoreScope::Team));
    let red = orch.assignments_for_team(TENANT, "red", d(3)).unwrap();
    let blue = orch.assignments_for_team(TENANT, "blue", d(3)).unwrap();
    assert_eq!(red.len() + blue.len(), 7);
}

#[test]
fn test_override_then_approve_and_activate() {
    let orch = orchestrator(ward());
    let run = orch.run(week(3, Algorithm::Greedy)).unwrap();
    let schedule_id = run.schedule_id.unwrap();
    let schedule = orch.schedule(TENANT, &schedule_id).unwrap();
    let slot_id = schedule.assignments[0].slot_id.clone();

    let edited = orch
        .override_assignment(TENANT, &schedule_id, &slot_id, Assignee::Employee("d".into()), "mgr")
        .unwrap();
    let locked = edited
        .assignments
        .iter()
        .find(|a| a.slot_id == slot_id)
        .unwrap();
    assert!(locked.manual_lock);
    assert_eq!(locked.assignee, Assignee::Employee("d".into()));

    orch.submit_for_approval(TENANT, &schedule_id, "mgr").unwrap();
    orch.approve(TENANT, &schedule_id, "director").unwrap();
    let active = orch.activate(TENANT, &schedule_id, "director").unwrap();
    assert_eq!(active.status, ScheduleStatus::Active);

    let archived = orch.archive(TENANT, &schedule_id, "director").unwrap();
    assert!(matches!(
        orch.override_assignment(TENANT, &archived.id, &slot_id, Assignee::Employee("a".into()), "mgr"),
        Err(SchedulerError::ScheduleClosed { .. })
    ));
}

#[test]
fn test_regeneration_keeps_locked_slot() {
    let orch = orchestrator(ward());
    let run = orch.run(week(3, Algorithm::Greedy)).unwrap();
    let schedule_id = run.schedule_id.unwrap();
    let slot_id = orch.schedule(TENANT, &schedule_id).unwrap().assignments[3]
        .slot_id
        .clone();
    orch.override_assignment(TENANT, &schedule_id, &slot_id, Assignee::Employee("c".into()), "mgr")
        .unwrap();

    let rerun = orch.run(week(3, Algorithm::Constraint)).unwrap();
    assert_eq!(rerun.status, RunStatus::Completed);
    let regenerated = orch
        .schedule(TENANT, rerun.schedule_id.as_deref().unwrap())
        .unwrap();
    let kept = regenerated
        .assignments
        .iter()
        .find(|a| a.slot_id == slot_id)
        .unwrap();
    assert_eq!(kept.assignee, Assignee::Employee("c".into()));
    assert!(kept.manual_lock);

    let current = orch.current_schedule(TENANT, d(3)).unwrap().unwrap();
    assert_eq!(current.id, regenerated.id);
}

#[test]
fn test_weeks_run_in_parallel_but_same_week_conflicts() {
    let orch = orchestrator(ward());
    let handles: Vec<_> = [3, 10, 17]
        .into_iter()
        .map(|start| {
            let orch = Arc::clone(&orch);
            thread::spawn(move || orch.run(week(start, Algorithm::Greedy)))
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap().unwrap().status, RunStatus::Completed);
    }

    let _held = orch.locks().try_acquire(WeekKey::new(TENANT, d(24))).unwrap();
    let queued = orch.submit(week(24, Algorithm::Greedy)).unwrap();
    let err = orch.execute(&queued.id).unwrap_err();
    assert!(err.retry_after_ms().is_some());
    assert_eq!(orch.get_run(TENANT, &queued.id).unwrap().status, RunStatus::Queued);
}

#[test]
fn test_expired_exception_cannot_be_approved() {
    let orch = orchestrator(ward());
    let exception = orch
        .request_exception(
            RuleException::request(TENANT, Assignee::Employee("a".into()), "max_nights", "mgr")
                .valid_until(d(5)),
        )
        .unwrap();
    assert!(matches!(
        orch.approve_exception(TENANT, &exception.id, "director", d(6)),
        Err(SchedulerError::ExceptionExpired(_))
    ));
    let approved = orch
        .approve_exception(TENANT, &exception.id, "director", d(4))
        .unwrap();
    assert_eq!(approved.decided_by.as_deref(), Some("director"));
}

#[test]
fn test_snapshot_directory_drives_a_run() {
    let json = r#"{
        "tenants": [{
            "tenant_id": "acme",
            "employees": [
                { "id": "e1", "name": "Ana" },
                { "id": "e2", "name": "Ben" }
            ],
            "templates": [
                { "id": "late", "name": "Late", "start": "14:00:00", "end": "22:00:00", "category": "evening" }
            ],
            "demand": [
                { "template_id": "late", "weekday": "Mon", "headcount": 1 },
                { "template_id": "late", "weekday": "Tue", "headcount": 1 }
            ],
            "rule_sets": [{
                "id": "std",
                "tenant_id": "acme",
                "rules": [
                    { "id": "rest", "kind": "min_rest_hours", "params": { "hours": 11 } }
                ]
            }]
        }]
    }"#;
    let directory = StaticDirectory::from_json(json, &RuleDefaults::default()).unwrap();
    let orch = Orchestrator::new(
        SchedulerConfig::default(),
        Arc::new(directory),
        Arc::new(InMemoryStore::new()),
    );
    let run = orch.run(week(3, Algorithm::Greedy)).unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.rule_set_id, None);
    let schedule = orch
        .schedule(TENANT, run.schedule_id.as_deref().unwrap())
        .unwrap();
    assert_eq!(schedule.assignments.len(), 2);
    assert_eq!(schedule.rule_set_id, "std");
}
