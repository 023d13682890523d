//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::{MigrateError, Result};
use std::path::Path;

impl Config {
    /// Load configuration from a file.
    ///
    /// Automatically detects the format based on file extension:
    /// - `.json` files are parsed as JSON
    /// - `.yaml` or `.yml` files are parsed as YAML
    /// - Other extensions default to YAML
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase());

        match extension.as_deref() {
            Some("json") => Self::from_json(&content),
            _ => Self::from_yaml(&content),
        }
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)
            .map_err(|e| MigrateError::Config(format!("Failed to parse JSON config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const VALID_YAML: &str = r#"
clickhouse:
  url: http://clickhouse:8123
  database: flows
  user: admin
  password: secret

orchestrator_url: http://orchestrator:8080

kafka:
  brokers:
    - kafka-1:9092
    - kafka-2:9092
  topic: flows
  consumers: 4

resolutions:
  - interval: 0
    ttl: 1296000
  - interval: 60
    ttl: 604800
  - interval: 3600
    ttl: 31536000

max_partitions: 50
"#;

    const VALID_JSON: &str = r#"{
  "orchestrator_url": "http://orchestrator:8080",
  "kafka": {
    "brokers": ["kafka-1:9092"],
    "consumers": 2
  }
}"#;

    #[test]
    fn test_from_yaml_valid() {
        let config = Config::from_yaml(VALID_YAML).unwrap();
        assert_eq!(config.clickhouse.url, "http://clickhouse:8123");
        assert_eq!(config.clickhouse.database, "flows");
        assert_eq!(config.kafka.brokers.len(), 2);
        assert_eq!(config.kafka.consumers, 4);
        assert_eq!(config.resolutions.len(), 3);
        assert_eq!(config.max_partitions, 50);
        assert_eq!(config.schema_version, 4);
    }

    #[test]
    fn test_from_json_valid_with_defaults() {
        let config = Config::from_json(VALID_JSON).unwrap();
        assert_eq!(config.clickhouse.url, "http://localhost:8123");
        assert_eq!(config.kafka.topic, "flows");
        // Default resolutions carry exactly one base entry.
        assert_eq!(config.resolutions.iter().filter(|r| r.is_base()).count(), 1);
    }

    #[test]
    fn test_from_json_invalid_syntax() {
        let result = Config::from_json(r#"{ "kafka": { invalid json }"#);
        assert!(matches!(result, Err(MigrateError::Config(_))));
    }

    #[test]
    fn test_from_yaml_rejects_invalid() {
        let invalid = r#"
orchestrator_url: http://orchestrator:8080
kafka:
  brokers: []
"#;
        assert!(Config::from_yaml(invalid).is_err());
    }

    #[test]
    fn test_load_yaml_extension() {
        let mut file = NamedTempFile::with_suffix(".yaml").unwrap();
        file.write_all(VALID_YAML.as_bytes()).unwrap();
        file.flush().unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.orchestrator_url, "http://orchestrator:8080");
    }

    #[test]
    fn test_load_json_extension() {
        let mut file = NamedTempFile::with_suffix(".json").unwrap();
        file.write_all(VALID_JSON.as_bytes()).unwrap();
        file.flush().unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.kafka.brokers, vec!["kafka-1:9092"]);
    }

    #[test]
    fn test_load_unknown_extension_defaults_to_yaml() {
        let mut file = NamedTempFile::with_suffix(".conf").unwrap();
        file.write_all(VALID_YAML.as_bytes()).unwrap();
        file.flush().unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.clickhouse.user, "admin");
    }
}
