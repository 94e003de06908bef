use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::error::SchedulerError;
use crate::orchestrator::StoreError;

/// Failures surfaced by the HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("missing or empty x-tenant-id header")]
    MissingTenant,
    #[error("background task failed: {0}")]
    Join(String),
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingTenant => StatusCode::BAD_REQUEST,
            ApiError::Join(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Scheduler(err) => match err {
                SchedulerError::NotFound { .. }
                | SchedulerError::Store(StoreError::Missing { .. }) => StatusCode::NOT_FOUND,
                SchedulerError::InfeasibleInput(_)
                | SchedulerError::HardConstraintUnsatisfied { .. }
                | SchedulerError::InvalidRuleSet(_) => StatusCode::UNPROCESSABLE_ENTITY,
                SchedulerError::UnknownAlgorithm(_) => StatusCode::BAD_REQUEST,
                SchedulerError::ConcurrentEditConflict { .. }
                | SchedulerError::InvalidTransition { .. }
                | SchedulerError::ScheduleClosed { .. }
                | SchedulerError::ExceptionDecided(_)
                | SchedulerError::Cancelled(_)
                | SchedulerError::RunState { .. }
                | SchedulerError::Store(StoreError::Duplicate { .. }) => StatusCode::CONFLICT,
                SchedulerError::ExceptionExpired(_) => StatusCode::GONE,
                SchedulerError::StrategyFailed { .. } | SchedulerError::Store(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let retry_after_ms = match &self {
            ApiError::Scheduler(err) => err.retry_after_ms(),
            _ => None,
        };

        let body = match retry_after_ms {
            Some(ms) => json!({ "error": self.to_string(), "retry_after_ms": ms }),
            None => json!({ "error": self.to_string() }),
        };
        let mut response = (status, Json(body)).into_response();

        if let Some(ms) = retry_after_ms {
            // Retry-After carries whole seconds.
            let secs = ms.div_ceil(1000).max(1);
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}
