//! Configuration validation.

use super::Config;
use crate::error::{MigrateError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    if config.clickhouse.url.is_empty() {
        return Err(MigrateError::Config("clickhouse.url is required".into()));
    }
    if config.orchestrator_url.is_empty() {
        return Err(MigrateError::Config("orchestrator_url is required".into()));
    }
    if config.kafka.brokers.is_empty() || config.kafka.brokers.iter().any(String::is_empty) {
        return Err(MigrateError::Config(
            "kafka.brokers must list at least one non-empty broker".into(),
        ));
    }
    if config.kafka.consumers == 0 {
        return Err(MigrateError::Config("kafka.consumers must be at least 1".into()));
    }
    if config.max_partitions == 0 {
        return Err(MigrateError::Config("max_partitions must be at least 1".into()));
    }
    if config.schema_version == 0 {
        return Err(MigrateError::Config("schema_version must be at least 1".into()));
    }

    if config.resolutions.is_empty() {
        return Err(MigrateError::Config("resolutions must not be empty".into()));
    }
    let base_count = config.resolutions.iter().filter(|r| r.is_base()).count();
    if base_count != 1 {
        return Err(MigrateError::Config(format!(
            "resolutions must contain exactly one entry with interval 0, got {base_count}"
        )));
    }
    for (i, r) in config.resolutions.iter().enumerate() {
        if config.resolutions[..i].iter().any(|p| p.interval == r.interval) {
            return Err(MigrateError::Config(format!(
                "duplicate resolution interval {}s",
                r.interval
            )));
        }
    }

    Ok(())
}
