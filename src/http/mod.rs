//! JSON API over the [`Orchestrator`].
//!
//! Every route except `/health` is tenant-scoped through the `x-tenant-id`
//! header; `x-user-id` names the acting user for the audit trail (`api`
//! when absent). Errors are returned as `{ "error": "..." }`; lock
//! collisions answer `409` with a `retry-after` header.
//!
//! | Method | Path |
//! |--------|------|
//! | GET | `/health` |
//! | POST | `/schedules/generate` |
//! | GET | `/schedules/runs/:run_id` |
//! | POST | `/schedules/runs/:run_id/cancel` |
//! | GET | `/schedules/:schedule_id` |
//! | GET | `/schedules/:schedule_id/conflicts` |
//! | POST | `/schedules/:schedule_id/assignments/:slot_id` |
//! | POST | `/schedules/:schedule_id/submit` |
//! | POST | `/schedules/:schedule_id/approve` |
//! | POST | `/schedules/:schedule_id/reject` |
//! | POST | `/exceptions` |
//! | POST | `/exceptions/:exception_id/approve` |
//! | POST | `/exceptions/:exception_id/reject` |

mod error;
mod handlers;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::orchestrator::Orchestrator;

pub use error::ApiError;

/// Builds the application router.
pub fn router(orchestrator: Arc<Orchestrator>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/schedules/generate", post(handlers::generate))
        .route("/schedules/runs/:run_id", get(handlers::get_run))
        .route("/schedules/runs/:run_id/cancel", post(handlers::cancel_run))
        .route("/schedules/:schedule_id", get(handlers::get_schedule))
        .route(
            "/schedules/:schedule_id/conflicts",
            get(handlers::get_conflicts),
        )
        .route(
            "/schedules/:schedule_id/assignments/:slot_id",
            post(handlers::override_assignment),
        )
        .route(
            "/schedules/:schedule_id/submit",
            post(handlers::submit_schedule),
        )
        .route(
            "/schedules/:schedule_id/approve",
            post(handlers::approve_schedule),
        )
        .route(
            "/schedules/:schedule_id/reject",
            post(handlers::reject_schedule),
        )
        .route("/exceptions", post(handlers::request_exception))
        .route(
            "/exceptions/:exception_id/approve",
            post(handlers::approve_exception),
        )
        .route(
            "/exceptions/:exception_id/reject",
            post(handlers::reject_exception),
        )
        .with_state(orchestrator)
}
