//! Standalone rostering service.
//!
//! Loads settings from the environment, seeds the workforce directory from
//! `ROSTER_SEED_PATH` when set, and serves the JSON API.

use std::sync::Arc;

use tracing::{info, warn};
use u_roster::config::{AppConfig, ConfigError};
use u_roster::error::SchedulerError;
use u_roster::orchestrator::{InMemoryStore, Orchestrator, StaticDirectory};
use u_roster::telemetry::{self, TelemetryError};

#[derive(Debug, thiserror::Error)]
enum ServerError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error("workforce snapshot error: {0}")]
    Snapshot(#[from] SchedulerError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

async fn run() -> Result<(), ServerError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let directory = match &config.seed_path {
        Some(path) => StaticDirectory::from_path(path, &config.scheduler.rule_defaults)?,
        None => {
            warn!("ROSTER_SEED_PATH not set; starting with an empty workforce directory");
            StaticDirectory::new()
        }
    };

    let orchestrator = Orchestrator::new(
        config.scheduler.clone(),
        Arc::new(directory),
        Arc::new(InMemoryStore::new()),
    );
    let app = u_roster::http::router(Arc::new(orchestrator));

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(?config.environment, %addr, "roster service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}
