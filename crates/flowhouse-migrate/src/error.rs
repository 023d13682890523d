//! Error types for the migration engine.

use thiserror::Error;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// ClickHouse connection or query error
    #[error("Database error: {0}")]
    Database(#[from] clickhouse::error::Error),

    /// Database never accepted queries during start-up
    #[error("Database not reachable after {attempts} attempts: {source}")]
    Unavailable {
        attempts: u32,
        #[source]
        source: clickhouse::error::Error,
    },

    /// A step's check query itself failed (malformed database, permissions)
    #[error("Check failed for step \"{step}\": {source}")]
    Check {
        step: String,
        #[source]
        source: Box<MigrateError>,
    },

    /// A step's DDL failed to apply
    #[error("Step \"{step}\" failed: {source}")]
    Apply {
        step: String,
        #[source]
        source: Box<MigrateError>,
    },

    /// Migration was cancelled (SIGINT, etc.)
    #[error("Migration cancelled")]
    Cancelled,

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrateError {
    /// Wrap a check error with the identity of the failing step.
    /// Cancellation passes through untouched: it is operator-driven, not a
    /// property of the step.
    pub(crate) fn check_failed(step: &str, source: MigrateError) -> Self {
        match source {
            MigrateError::Cancelled => MigrateError::Cancelled,
            source => MigrateError::Check {
                step: step.to_string(),
                source: Box::new(source),
            },
        }
    }

    /// Wrap an apply error with the identity of the failing step.
    pub(crate) fn apply_failed(step: &str, source: MigrateError) -> Self {
        match source {
            MigrateError::Cancelled => MigrateError::Cancelled,
            source => MigrateError::Apply {
                step: step.to_string(),
                source: Box::new(source),
            },
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) => 2,
            MigrateError::Cancelled => 130,
            _ => 1,
        }
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_failed_keeps_step_identity() {
        let err = MigrateError::check_failed("create flows table", MigrateError::Config("boom".into()));
        assert!(matches!(err, MigrateError::Check { ref step, .. } if step == "create flows table"));
        assert!(err.to_string().contains("create flows table"));
    }

    #[test]
    fn test_cancelled_passes_through_wrapping() {
        let err = MigrateError::apply_failed("set TTL on flows", MigrateError::Cancelled);
        assert!(matches!(err, MigrateError::Cancelled));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(MigrateError::Config("x".into()).exit_code(), 2);
        assert_eq!(MigrateError::Cancelled.exit_code(), 130);
        assert_eq!(
            MigrateError::apply_failed("s", MigrateError::Config("x".into())).exit_code(),
            1
        );
    }

    #[test]
    fn test_format_detailed_includes_chain() {
        let err = MigrateError::apply_failed("create exporters view", MigrateError::Config("bad".into()));
        let detailed = err.format_detailed();
        assert!(detailed.contains("create exporters view"));
        assert!(detailed.contains("Caused by"));
        assert!(detailed.contains("bad"));
    }
}
