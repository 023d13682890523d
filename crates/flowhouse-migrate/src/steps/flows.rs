//! Steps creating the flow tables and managing their retention.

use async_trait::async_trait;
use tracing::{info, warn};

use super::{ExecSql, Step, StepApply, AGGREGATE_DROPPED_COLUMNS, TABLE_EXISTS_CHECK};
use crate::config::{Config, ResolutionConfig};
use crate::driver::Database;
use crate::error::Result;
use crate::schema;

/// Create the base or aggregate flows table for a resolution.
///
/// Creates embed the full current column set, so on a fresh database the
/// later column-addition steps find their marker columns already present.
pub(crate) fn create_flows_table(config: &Config, resolution: ResolutionConfig) -> Step {
    let partition_interval = resolution.partition_interval(config.max_partitions);
    if resolution.is_base() {
        return Step::new(
            "create flows table",
            TABLE_EXISTS_CHECK,
            vec![schema::BASE_TABLE.to_string()],
            ExecSql::new(vec![create_base_table_sql(partition_interval)]),
        );
    }

    let table = resolution.table_name();
    let view = resolution.consumer_name();
    Step::new(
        format!("create {table} table"),
        TABLE_EXISTS_CHECK,
        vec![table.clone()],
        // The consumer view writes into the table being replaced, so it goes
        // first; a later step recreates it against the new table.
        ExecSql::new(vec![
            format!("DROP TABLE IF EXISTS {view} SYNC"),
            create_aggregate_table_sql(&table, partition_interval),
        ]),
    )
}

fn create_base_table_sql(partition_interval: u64) -> String {
    format!(
        "CREATE TABLE flows (
{}
)
ENGINE = MergeTree
PARTITION BY toYYYYMMDDhhmmss(toStartOfInterval(TimeReceived, INTERVAL {partition_interval} second))
ORDER BY (TimeReceived, ExporterAddress, InIfName, OutIfName)",
        schema::flows_schema()
    )
}

// The sorting key of an aggregate leaves out columns deducible from the ones
// already present: per-exporter attributes are constant for a given
// ExporterAddress, interface attributes for a given (ExporterAddress,
// IfName). Bytes and Packets are summed, never filtered on. The primary key
// is a short prefix of the sorting key; it cannot be modified later, so the
// extendable tail lives only in ORDER BY.
fn create_aggregate_table_sql(table: &str, partition_interval: u64) -> String {
    format!(
        "CREATE TABLE {table} (
{}
)
ENGINE = SummingMergeTree((Bytes, Packets))
PARTITION BY toYYYYMMDDhhmmss(toStartOfInterval(TimeReceived, INTERVAL {partition_interval} second))
PRIMARY KEY (TimeReceived,
          ExporterAddress,
          EType, Proto,
          InIfName, SrcAS, ForwardingStatus,
          OutIfName, DstAS,
          SamplingRate)
ORDER BY (TimeReceived,
          ExporterAddress,
          EType, Proto,
          InIfName, SrcAS, ForwardingStatus,
          OutIfName, DstAS,
          SamplingRate,
          SrcNetName, DstNetName,
          SrcNetRole, DstNetRole,
          SrcNetSite, DstNetSite,
          SrcNetRegion, DstNetRegion,
          SrcNetTenant, DstNetTenant,
          SrcCountry, DstCountry,
          Dst1stAS, Dst2ndAS, Dst3rdAS)",
        schema::partial_schema(&AGGREGATE_DROPPED_COLUMNS)
    )
}

/// Apply the configured retention to a resolution's table. A zero TTL keeps
/// rows forever and leaves the table untouched.
pub(crate) fn set_ttl(resolution: ResolutionConfig) -> Step {
    let table = resolution.table_name();
    if resolution.ttl == 0 {
        info!("not changing TTL for {table} table");
        return Step::noop(format!("keep {table} forever"));
    }
    let ttl = format!("TTL TimeReceived + toIntervalSecond({})", resolution.ttl);
    Step::new(
        format!("set TTL on {table}"),
        "SELECT 1 AS applied FROM system.tables \
         WHERE name = ? AND database = currentDatabase() AND engine_full LIKE ?",
        vec![table.clone(), format!("% {ttl} %")],
        Box::new(ModifyTtl { table, ttl }),
    )
}

struct ModifyTtl {
    table: String,
    ttl: String,
}

#[async_trait]
impl StepApply for ModifyTtl {
    async fn apply(&self, db: &dyn Database) -> Result<()> {
        warn!("updating TTL of {} table, this can take a long time", self.table);
        db.exec(&format!("ALTER TABLE {} MODIFY {}", self.table, self.ttl))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_table_sql() {
        let sql = create_base_table_sql(25_920);
        assert!(sql.starts_with("CREATE TABLE flows ("));
        assert!(sql.contains("ENGINE = MergeTree"));
        assert!(sql.contains("INTERVAL 25920 second"));
        assert!(sql.contains("ORDER BY (TimeReceived, ExporterAddress, InIfName, OutIfName)"));
        // Full canonical schema, including columns later steps would add.
        assert!(sql.contains("ExporterTenant LowCardinality(String)"));
        assert!(sql.contains("DstLargeCommunities Array(UInt128)"));
        assert!(sql.contains("SrcAddr IPv6"));
    }

    #[test]
    fn test_aggregate_table_sql_excludes_address_columns() {
        let sql = create_aggregate_table_sql("flows_1m0s", 12_096);
        assert!(sql.contains("ENGINE = SummingMergeTree((Bytes, Packets))"));
        assert!(sql.contains("INTERVAL 12096 second"));
        for col in AGGREGATE_DROPPED_COLUMNS {
            assert!(
                !sql.contains(&format!("\n {col} ")),
                "aggregate schema must not define {col}"
            );
        }
        // Still summable and filterable.
        assert!(sql.contains(" Bytes UInt64"));
        assert!(sql.contains(" SrcNetName LowCardinality(String)"));
    }

    #[test]
    fn test_aggregate_sorting_key_order() {
        let sql = create_aggregate_table_sql("flows_1h0m0s", 630_720);
        let order_by = sql.split("ORDER BY").nth(1).unwrap();
        let country = order_by.find("DstCountry").unwrap();
        let net_name = order_by.find("DstNetName").unwrap();
        let first_as = order_by.find("Dst1stAS").unwrap();
        // Net names precede countries, which precede the AS columns.
        assert!(net_name < country);
        assert!(country < first_as);
        // The primary key is a prefix of the sorting key.
        let primary = sql.split("PRIMARY KEY").nth(1).unwrap().split("ORDER BY").next().unwrap();
        assert!(primary.contains("SamplingRate"));
        assert!(!primary.contains("SrcNetName"));
    }

    #[test]
    fn test_set_ttl_step() {
        let step = set_ttl(ResolutionConfig { interval: 60, ttl: 604_800 });
        assert_eq!(step.name(), "set TTL on flows_1m0s");
        assert!(step.check_query().contains("engine_full LIKE ?"));
        assert_eq!(
            step.check_args(),
            &[
                "flows_1m0s".to_string(),
                "% TTL TimeReceived + toIntervalSecond(604800) %".to_string()
            ]
        );
    }

    #[test]
    fn test_set_ttl_zero_is_noop() {
        let step = set_ttl(ResolutionConfig { interval: 0, ttl: 0 });
        assert_eq!(step.check_query(), "SELECT 1 AS applied");
    }

    #[test]
    fn test_create_aggregate_step_drops_consumer_first() {
        let config = test_config();
        let step = create_flows_table(&config, ResolutionConfig { interval: 60, ttl: 604_800 });
        assert_eq!(step.name(), "create flows_1m0s table");
        assert_eq!(step.check_args(), &["flows_1m0s".to_string()]);
    }

    fn test_config() -> Config {
        Config::from_yaml(
            r#"
orchestrator_url: http://orchestrator:8080
kafka:
  brokers: [kafka:9092]
max_partitions: 50
"#,
        )
        .unwrap()
    }
}
