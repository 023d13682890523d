//! Migration orchestrator - service start-up entry point.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use crate::config::Config;
use crate::driver::ClickhouseDriver;
use crate::error::Result;
use crate::{planner, runner};

/// Migration orchestrator. Owns the run lifecycle: connect, plan, execute.
pub struct Orchestrator {
    config: Config,
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationResult {
    /// Unique run identifier.
    pub run_id: String,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// When the run completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// Steps in the plan.
    pub steps_total: usize,

    /// Steps actually applied (zero on an up-to-date database).
    pub steps_applied: usize,
}

impl Orchestrator {
    /// Create a new orchestrator from validated configuration.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Bring the database to the schema version of the current build.
    ///
    /// Returns only once every step has been checked and, where needed,
    /// applied. Callers must not start consuming flows before this
    /// succeeds: the governed tables may not exist or may still have their
    /// old shape.
    pub async fn run(&self, cancel: CancellationToken) -> Result<MigrationResult> {
        let started_at = Utc::now();

        let driver = ClickhouseDriver::connect(&self.config.clickhouse, cancel).await?;
        let steps = planner::plan(&self.config);
        info!("running {} migration steps", steps.len());
        let report = runner::run(&driver, &steps).await?;

        let completed_at = Utc::now();
        Ok(MigrationResult {
            run_id: Uuid::new_v4().to_string(),
            started_at,
            completed_at,
            duration_seconds: (completed_at - started_at).num_milliseconds() as f64 / 1000.0,
            steps_total: report.total,
            steps_applied: report.applied,
        })
    }
}

impl MigrationResult {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = Config::from_json(r#"{"orchestrator_url": "", "kafka": {"brokers": []}}"#);
        assert!(config.is_err());
    }

    #[test]
    fn test_result_serializes() {
        let result = MigrationResult {
            run_id: "test".to_string(),
            started_at: Utc::now(),
            completed_at: Utc::now(),
            duration_seconds: 0.5,
            steps_total: 38,
            steps_applied: 0,
        };
        let json = result.to_json().unwrap();
        assert!(json.contains("\"steps_total\": 38"));
    }
}
