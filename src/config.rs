//! Configuration.
//!
//! [`SchedulerConfig`] holds engine defaults and strategy budgets; it is
//! plain data with `Default` so library users can build it in code.
//! [`AppConfig::load`] reads the server process settings from the
//! environment (after loading `.env` via `dotenvy`).
//!
//! # Environment
//!
//! | Variable | Default |
//! |----------|---------|
//! | `ROSTER_ENV` | `development` |
//! | `ROSTER_HOST` | `127.0.0.1` |
//! | `ROSTER_PORT` | `3000` |
//! | `ROSTER_LOG_LEVEL` | `info` |
//! | `ROSTER_SEED_PATH` | unset |
//! | `ROSTER_RUN_BUDGET_MS` | `5000` |
//! | `ROSTER_SEED` | `42` |

use serde::{Deserialize, Serialize};
use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::fairness::FairnessWeights;
use crate::rules::RuleDefaults;

/// Simulated annealing parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnealingConfig {
    /// Maximum neighbour proposals.
    pub iterations: u64,
    /// Starting temperature.
    pub initial_temperature: f64,
    /// Geometric cooling factor per iteration (0..1).
    pub cooling_rate: f64,
    /// Floor below which the temperature stops decreasing.
    pub min_temperature: f64,
}

impl Default for AnnealingConfig {
    fn default() -> Self {
        Self {
            iterations: 20_000,
            initial_temperature: 50.0,
            cooling_rate: 0.9995,
            min_temperature: 0.01,
        }
    }
}

/// Genetic algorithm parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneticConfig {
    pub population_size: usize,
    pub generations: u64,
    pub tournament_size: usize,
    pub crossover_rate: f64,
    pub mutation_rate: f64,
    /// Best chromosomes copied unchanged into the next generation.
    pub elitism: usize,
}

impl Default for GeneticConfig {
    fn default() -> Self {
        Self {
            population_size: 40,
            generations: 150,
            tournament_size: 3,
            crossover_rate: 0.85,
            mutation_rate: 0.15,
            elitism: 2,
        }
    }
}

/// Branch-and-bound parameters for the constraint strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintConfig {
    /// Maximum search nodes before the search is truncated.
    pub node_limit: u64,
    /// Relative gap at which a solution is accepted as near-optimal.
    pub gap_tolerance: f64,
}

impl Default for ConstraintConfig {
    fn default() -> Self {
        Self {
            node_limit: 200_000,
            gap_tolerance: 0.0,
        }
    }
}

/// Engine and strategy settings shared by every run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Fallback rule parameters and score weights.
    pub rule_defaults: RuleDefaults,
    /// Fairness deltas per committed shift.
    pub fairness: FairnessWeights,
    pub annealing: AnnealingConfig,
    pub genetic: GeneticConfig,
    pub constraint: ConstraintConfig,
    /// Wall-clock budget per run (ms).
    pub run_budget_ms: u64,
    /// Seed for stochastic strategies.
    pub seed: u64,
    /// Retry hint returned on lock collisions (ms).
    pub retry_after_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            rule_defaults: RuleDefaults::default(),
            fairness: FairnessWeights::default(),
            annealing: AnnealingConfig::default(),
            genetic: GeneticConfig::default(),
            constraint: ConstraintConfig::default(),
            run_budget_ms: 5_000,
            seed: 42,
            retry_after_ms: 1_000,
        }
    }
}

impl SchedulerConfig {
    /// Run budget as a `Duration`.
    pub fn run_budget(&self) -> Duration {
        Duration::from_millis(self.run_budget_ms)
    }
}

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the server process.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub scheduler: SchedulerConfig,
    /// Optional JSON workforce snapshot loaded at startup.
    pub seed_path: Option<PathBuf>,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::parse(
            &env::var("ROSTER_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("ROSTER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("ROSTER_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("ROSTER_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let mut scheduler = SchedulerConfig::default();
        if let Ok(raw) = env::var("ROSTER_RUN_BUDGET_MS") {
            scheduler.run_budget_ms = raw
                .parse()
                .map_err(|_| ConfigError::InvalidNumber("ROSTER_RUN_BUDGET_MS"))?;
        }
        if let Ok(raw) = env::var("ROSTER_SEED") {
            scheduler.seed = raw
                .parse()
                .map_err(|_| ConfigError::InvalidNumber("ROSTER_SEED"))?;
        }

        let seed_path = env::var("ROSTER_SEED_PATH").ok().map(PathBuf::from);

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            scheduler,
            seed_path,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("ROSTER_PORT must be a valid u16")]
    InvalidPort,
    #[error("ROSTER_HOST must parse to an IPv4 or IPv6 address")]
    InvalidHost { source: std::net::AddrParseError },
    #[error("{0} must be a non-negative integer")]
    InvalidNumber(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for key in [
            "ROSTER_ENV",
            "ROSTER_HOST",
            "ROSTER_PORT",
            "ROSTER_LOG_LEVEL",
            "ROSTER_SEED_PATH",
            "ROSTER_RUN_BUDGET_MS",
            "ROSTER_SEED",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn test_load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.scheduler.run_budget_ms, 5_000);
        assert!(config.seed_path.is_none());
    }

    #[test]
    fn test_accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("ROSTER_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn test_rejects_bad_budget() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("ROSTER_RUN_BUDGET_MS", "soon");
        let err = AppConfig::load().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber("ROSTER_RUN_BUDGET_MS")));
        reset_env();
    }

    #[test]
    fn test_scheduler_defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.rule_defaults.max_night_shifts_per_week, 2);
        assert!((config.rule_defaults.min_rest_hours - 12.0).abs() < 1e-9);
        assert_eq!(config.run_budget(), Duration::from_millis(5_000));
    }
}
