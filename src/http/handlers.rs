use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::error::ApiError;
use crate::error::SchedulerError;
use crate::models::{Algorithm, Assignee, AssignmentMode, Conflict, RuleException, Schedule};
use crate::orchestrator::{Orchestrator, RunRequest, SchedulerRun};

pub(crate) const TENANT_HEADER: &str = "x-tenant-id";
pub(crate) const ACTOR_HEADER: &str = "x-user-id";

/// Attempts made by a background run whose week is busy.
const EXECUTE_ATTEMPTS: u32 = 5;

type Shared = State<Arc<Orchestrator>>;

fn tenant_id(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get(TENANT_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or(ApiError::MissingTenant)
}

fn actor(headers: &HeaderMap) -> String {
    headers
        .get(ACTOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.trim().is_empty())
        .unwrap_or("api")
        .to_string()
}

/// Runs orchestrator work off the async executor.
async fn blocking<T, F>(orchestrator: &Arc<Orchestrator>, work: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&Orchestrator) -> Result<T, SchedulerError> + Send + 'static,
{
    let orchestrator = Arc::clone(orchestrator);
    tokio::task::spawn_blocking(move || work(orchestrator.as_ref()))
        .await
        .map_err(|err| ApiError::Join(err.to_string()))?
        .map_err(ApiError::from)
}

pub(crate) async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
pub(crate) struct GenerateRequest {
    pub(crate) week_start: NaiveDate,
    pub(crate) week_end: NaiveDate,
    pub(crate) algorithm: Algorithm,
    #[serde(default)]
    pub(crate) rule_set_id: Option<String>,
    #[serde(default)]
    pub(crate) mode: AssignmentMode,
    #[serde(default)]
    pub(crate) seed: Option<u64>,
    #[serde(default)]
    pub(crate) as_of: Option<NaiveDate>,
}

/// Queues a run and executes it in the background. The response carries
/// the run id to poll.
pub(crate) async fn generate(
    State(orchestrator): Shared,
    headers: HeaderMap,
    Json(body): Json<GenerateRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let mut request = RunRequest::new(
        tenant_id(&headers)?,
        body.week_start,
        body.week_end,
        body.algorithm,
    )
    .with_mode(body.mode)
    .requested_by(actor(&headers));
    if let Some(id) = body.rule_set_id {
        request = request.with_rule_set(id);
    }
    if let Some(seed) = body.seed {
        request = request.with_seed(seed);
    }
    if let Some(date) = body.as_of {
        request = request.as_of(date);
    }

    let run = orchestrator.submit(request)?;
    let run_id = run.id.clone();
    let worker = Arc::clone(&orchestrator);
    tokio::task::spawn_blocking(move || execute_with_retry(&worker, &run_id));

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "run_id": run.id, "status": run.status })),
    ))
}

fn execute_with_retry(orchestrator: &Orchestrator, run_id: &str) {
    for attempt in 1..=EXECUTE_ATTEMPTS {
        match orchestrator.execute(run_id) {
            Ok(_) => return,
            Err(SchedulerError::ConcurrentEditConflict { retry_after_ms, .. })
                if attempt < EXECUTE_ATTEMPTS =>
            {
                debug!(run_id, attempt, retry_after_ms, "week busy, retrying run");
                std::thread::sleep(Duration::from_millis(retry_after_ms));
            }
            Err(err) => {
                warn!(run_id, error = %err, "background run did not execute");
                return;
            }
        }
    }
}

pub(crate) async fn get_run(
    State(orchestrator): Shared,
    headers: HeaderMap,
    Path(run_id): Path<String>,
) -> Result<Json<SchedulerRun>, ApiError> {
    Ok(Json(orchestrator.get_run(&tenant_id(&headers)?, &run_id)?))
}

pub(crate) async fn cancel_run(
    State(orchestrator): Shared,
    headers: HeaderMap,
    Path(run_id): Path<String>,
) -> Result<Json<SchedulerRun>, ApiError> {
    let tenant = tenant_id(&headers)?;
    Ok(Json(orchestrator.cancel(&tenant, &run_id, &actor(&headers))?))
}

pub(crate) async fn get_schedule(
    State(orchestrator): Shared,
    headers: HeaderMap,
    Path(schedule_id): Path<String>,
) -> Result<Json<Schedule>, ApiError> {
    Ok(Json(orchestrator.schedule(&tenant_id(&headers)?, &schedule_id)?))
}

pub(crate) async fn get_conflicts(
    State(orchestrator): Shared,
    headers: HeaderMap,
    Path(schedule_id): Path<String>,
) -> Result<Json<Vec<Conflict>>, ApiError> {
    Ok(Json(orchestrator.conflicts(&tenant_id(&headers)?, &schedule_id)?))
}

#[derive(Debug, Deserialize)]
pub(crate) struct OverrideRequest {
    pub(crate) assignee: Assignee,
}

pub(crate) async fn override_assignment(
    State(orchestrator): Shared,
    headers: HeaderMap,
    Path((schedule_id, slot_id)): Path<(String, String)>,
    Json(body): Json<OverrideRequest>,
) -> Result<Json<Schedule>, ApiError> {
    let tenant = tenant_id(&headers)?;
    let actor = actor(&headers);
    let schedule = blocking(&orchestrator, move |o| {
        o.override_assignment(&tenant, &schedule_id, &slot_id, body.assignee, &actor)
    })
    .await?;
    Ok(Json(schedule))
}

pub(crate) async fn submit_schedule(
    State(orchestrator): Shared,
    headers: HeaderMap,
    Path(schedule_id): Path<String>,
) -> Result<Json<Schedule>, ApiError> {
    let (tenant, actor) = (tenant_id(&headers)?, actor(&headers));
    Ok(Json(orchestrator.submit_for_approval(&tenant, &schedule_id, &actor)?))
}

pub(crate) async fn approve_schedule(
    State(orchestrator): Shared,
    headers: HeaderMap,
    Path(schedule_id): Path<String>,
) -> Result<Json<Schedule>, ApiError> {
    let (tenant, actor) = (tenant_id(&headers)?, actor(&headers));
    Ok(Json(orchestrator.approve(&tenant, &schedule_id, &actor)?))
}

pub(crate) async fn reject_schedule(
    State(orchestrator): Shared,
    headers: HeaderMap,
    Path(schedule_id): Path<String>,
) -> Result<Json<Schedule>, ApiError> {
    let (tenant, actor) = (tenant_id(&headers)?, actor(&headers));
    Ok(Json(orchestrator.reject(&tenant, &schedule_id, &actor)?))
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExceptionRequest {
    pub(crate) assignee: Assignee,
    pub(crate) rule_id: String,
    #[serde(default)]
    pub(crate) date: Option<NaiveDate>,
    #[serde(default)]
    pub(crate) valid_until: Option<NaiveDate>,
    #[serde(default)]
    pub(crate) reason: String,
}

pub(crate) async fn request_exception(
    State(orchestrator): Shared,
    headers: HeaderMap,
    Json(body): Json<ExceptionRequest>,
) -> Result<(StatusCode, Json<RuleException>), ApiError> {
    let mut exception =
        RuleException::request(tenant_id(&headers)?, body.assignee, body.rule_id, actor(&headers))
            .with_reason(body.reason);
    if let Some(date) = body.date {
        exception = exception.on_date(date);
    }
    if let Some(until) = body.valid_until {
        exception = exception.valid_until(until);
    }
    let exception = orchestrator.request_exception(exception)?;
    Ok((StatusCode::CREATED, Json(exception)))
}

pub(crate) async fn approve_exception(
    State(orchestrator): Shared,
    headers: HeaderMap,
    Path(exception_id): Path<String>,
) -> Result<Json<RuleException>, ApiError> {
    let (tenant, actor) = (tenant_id(&headers)?, actor(&headers));
    let today = Utc::now().date_naive();
    Ok(Json(orchestrator.approve_exception(&tenant, &exception_id, &actor, today)?))
}

pub(crate) async fn reject_exception(
    State(orchestrator): Shared,
    headers: HeaderMap,
    Path(exception_id): Path<String>,
) -> Result<Json<RuleException>, ApiError> {
    let (tenant, actor) = (tenant_id(&headers)?, actor(&headers));
    Ok(Json(orchestrator.reject_exception(&tenant, &exception_id, &actor)?))
}
