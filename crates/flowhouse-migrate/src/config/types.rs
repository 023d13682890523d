//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::schema;

/// Seconds in a day, for default retention windows.
const DAY: u64 = 86_400;

/// Partition window for tables kept forever: with no TTL to divide by the
/// partition budget, such tables are partitioned monthly.
const KEEP_FOREVER_PARTITION_SECS: u64 = 30 * DAY;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// ClickHouse connection configuration.
    #[serde(default)]
    pub clickhouse: ClickhouseConfig,

    /// Base URL the database itself uses to fetch dictionary CSVs.
    pub orchestrator_url: String,

    /// Kafka settings for the raw flows table.
    pub kafka: KafkaConfig,

    /// Time-aggregation policies. Exactly one entry must have `interval: 0`
    /// (the unaggregated base table).
    #[serde(default = "default_resolutions")]
    pub resolutions: Vec<ResolutionConfig>,

    /// Upper bound on the number of partitions a table accumulates over its
    /// TTL window.
    #[serde(default = "default_max_partitions")]
    pub max_partitions: u64,

    /// Raw pipeline schema generation; names the raw tables, the Kafka topic
    /// suffix and the protobuf schema.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
}

/// ClickHouse connection configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct ClickhouseConfig {
    /// HTTP endpoint of the ClickHouse server.
    #[serde(default = "default_clickhouse_url")]
    pub url: String,

    /// Database owning the governed tables.
    #[serde(default = "default_clickhouse_database")]
    pub database: String,

    /// Username.
    #[serde(default = "default_clickhouse_user")]
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,
}

impl Default for ClickhouseConfig {
    fn default() -> Self {
        Self {
            url: default_clickhouse_url(),
            database: default_clickhouse_database(),
            user: default_clickhouse_user(),
            password: String::new(),
        }
    }
}

impl fmt::Debug for ClickhouseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClickhouseConfig")
            .field("url", &self.url)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Kafka settings baked into the raw table engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaConfig {
    /// Broker list.
    pub brokers: Vec<String>,

    /// Topic base name; the schema version is appended (`flows-v4`).
    #[serde(default = "default_kafka_topic")]
    pub topic: String,

    /// Number of Kafka consumers inside ClickHouse.
    #[serde(default = "default_kafka_consumers")]
    pub consumers: usize,
}

/// A time-aggregation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionConfig {
    /// Aggregation interval in seconds; 0 keeps flows unaggregated.
    #[serde(default)]
    pub interval: u64,

    /// Retention in seconds; 0 keeps rows forever.
    #[serde(default)]
    pub ttl: u64,
}

impl ResolutionConfig {
    /// Whether this resolution is the unaggregated base table.
    pub fn is_base(&self) -> bool {
        self.interval == 0
    }

    /// Name of the governed flow table for this resolution
    /// (`flows`, `flows_1m0s`, ...).
    pub fn table_name(&self) -> String {
        if self.is_base() {
            schema::BASE_TABLE.to_string()
        } else {
            format!("{}_{}", schema::BASE_TABLE, schema::interval_suffix(self.interval))
        }
    }

    /// Name of the materialized view feeding this resolution's table.
    pub fn consumer_name(&self) -> String {
        format!("{}_consumer", self.table_name())
    }

    /// Partition granularity in seconds: the TTL window divided by the
    /// partition budget (floor).
    pub fn partition_interval(&self, max_partitions: u64) -> u64 {
        if self.ttl == 0 {
            KEEP_FOREVER_PARTITION_SECS
        } else {
            self.ttl / max_partitions
        }
    }
}

fn default_resolutions() -> Vec<ResolutionConfig> {
    vec![
        ResolutionConfig { interval: 0, ttl: 15 * DAY },
        ResolutionConfig { interval: 60, ttl: 7 * DAY },
        ResolutionConfig { interval: 300, ttl: 90 * DAY },
        ResolutionConfig { interval: 3_600, ttl: 365 * DAY },
    ]
}

fn default_max_partitions() -> u64 {
    50
}

fn default_schema_version() -> u32 {
    4
}

fn default_clickhouse_url() -> String {
    "http://localhost:8123".to_string()
}

fn default_clickhouse_database() -> String {
    "default".to_string()
}

fn default_clickhouse_user() -> String {
    "default".to_string()
}

fn default_kafka_topic() -> String {
    "flows".to_string()
}

fn default_kafka_consumers() -> usize {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_names() {
        let base = ResolutionConfig { interval: 0, ttl: 0 };
        assert!(base.is_base());
        assert_eq!(base.table_name(), "flows");

        let minute = ResolutionConfig { interval: 60, ttl: 7 * DAY };
        assert_eq!(minute.table_name(), "flows_1m0s");
        assert_eq!(minute.consumer_name(), "flows_1m0s_consumer");

        let hour = ResolutionConfig { interval: 3_600, ttl: 365 * DAY };
        assert_eq!(hour.table_name(), "flows_1h0m0s");
    }

    #[test]
    fn test_partition_interval() {
        let base = ResolutionConfig { interval: 0, ttl: 15 * DAY };
        assert_eq!(base.partition_interval(50), 25_920);

        let minute = ResolutionConfig { interval: 60, ttl: 7 * DAY };
        assert_eq!(minute.partition_interval(50), 12_096);

        let hour = ResolutionConfig { interval: 3_600, ttl: 365 * DAY };
        assert_eq!(hour.partition_interval(50), 630_720);
    }

    #[test]
    fn test_partition_interval_keep_forever() {
        let forever = ResolutionConfig { interval: 3_600, ttl: 0 };
        assert_eq!(forever.partition_interval(50), KEEP_FOREVER_PARTITION_SECS);
    }

    #[test]
    fn test_clickhouse_debug_redacts_password() {
        let config = ClickhouseConfig {
            password: "super_secret_password".to_string(),
            ..Default::default()
        };
        let debug_output = format!("{:?}", config);
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_password"));
    }
}
