//! The Kafka-fed raw table and its consumer and error views.

use super::{ExecSql, Step};
use crate::config::Config;
use crate::fingerprint;
use crate::schema;

/// Columns the raw consumer derives rather than reads from the wire:
/// dictionary lookups, AS-path slicing and large-community packing.
const RAW_DERIVED_COLUMNS: [&str; 14] = [
    "SrcNetName",
    "DstNetName",
    "SrcNetRole",
    "DstNetRole",
    "SrcNetSite",
    "DstNetSite",
    "SrcNetRegion",
    "DstNetRegion",
    "SrcNetTenant",
    "DstNetTenant",
    "Dst1stAS",
    "Dst2ndAS",
    "Dst3rdAS",
    "DstLargeCommunities",
];

const NESTED_COMMUNITY_COLUMNS: &str =
    "`DstLargeCommunities.ASN`,`DstLargeCommunities.LocalData1`,`DstLargeCommunities.LocalData2`";

pub(crate) fn raw_table_name(config: &Config) -> String {
    format!("{}_{}_raw", schema::BASE_TABLE, config.schema_version)
}

fn kafka_engine(config: &Config) -> String {
    let v = config.schema_version;
    let settings = [
        format!("kafka_broker_list = '{}'", config.kafka.brokers.join(",")),
        format!("kafka_topic_list = '{}-v{v}'", config.kafka.topic),
        "kafka_group_name = 'clickhouse'".to_string(),
        "kafka_format = 'Protobuf'".to_string(),
        format!("kafka_schema = 'flow-{v}.proto:FlowMessagev{v}'"),
        format!("kafka_num_consumers = {}", config.kafka.consumers),
        "kafka_thread_per_consumer = 1".to_string(),
        "kafka_handle_error_mode = 'stream'".to_string(),
    ];
    format!("Kafka SETTINGS {}", settings.join(", "))
}

/// (Re)create the raw table reading protobuf-encoded flows from Kafka. Any
/// engine-setting change (brokers, topic, consumer count) re-creates the
/// table; the consumer view is dropped first so nothing reads from a
/// half-replaced table.
pub(crate) fn create_raw_table(config: &Config) -> Step {
    let table = raw_table_name(config);
    let engine = kafka_engine(config);
    Step::new(
        format!("create {table} table"),
        fingerprint::table_hash_query(fingerprint::RAW_TABLE_HASH, "AND engine_full = ?"),
        vec![table.clone(), engine.clone(), table.clone()],
        ExecSql::new(vec![
            format!("DROP TABLE IF EXISTS {table}_consumer SYNC"),
            format!("DROP TABLE IF EXISTS {table} SYNC"),
            format!(
                "\
CREATE TABLE {table}
(
{},
DstLargeCommunities Nested(ASN UInt32, LocalData1 UInt32, LocalData2 UInt32)
)
ENGINE = {engine}",
                schema::partial_schema(&RAW_DERIVED_COLUMNS)
            ),
        ]),
    )
}

/// (Re)create the view projecting raw rows into the base table: compact the
/// AS path, look up network enrichment from the networks dictionary, slice
/// the first three hops and pack large communities into UInt128.
pub(crate) fn create_raw_consumer_view(config: &Config) -> Step {
    let table = raw_table_name(config);
    let view = format!("{table}_consumer");
    Step::new(
        format!("create {view} view"),
        fingerprint::table_hash_query(fingerprint::RAW_CONSUMER_VIEW_HASH, "AND as_select LIKE ?"),
        vec![
            view.clone(),
            "% WHERE length(_error) = 0".to_string(),
            view.clone(),
        ],
        ExecSql::new(vec![
            format!("DROP TABLE IF EXISTS {view} SYNC"),
            format!(
                "\
CREATE MATERIALIZED VIEW {view} TO flows
AS WITH arrayCompact(DstASPath) AS c_DstASPath SELECT
 * EXCEPT ({NESTED_COMMUNITY_COLUMNS}),
 dictGetOrDefault('networks', 'name', SrcAddr, '') AS SrcNetName,
 dictGetOrDefault('networks', 'name', DstAddr, '') AS DstNetName,
 dictGetOrDefault('networks', 'role', SrcAddr, '') AS SrcNetRole,
 dictGetOrDefault('networks', 'role', DstAddr, '') AS DstNetRole,
 dictGetOrDefault('networks', 'site', SrcAddr, '') AS SrcNetSite,
 dictGetOrDefault('networks', 'site', DstAddr, '') AS DstNetSite,
 dictGetOrDefault('networks', 'region', SrcAddr, '') AS SrcNetRegion,
 dictGetOrDefault('networks', 'region', DstAddr, '') AS DstNetRegion,
 dictGetOrDefault('networks', 'tenant', SrcAddr, '') AS SrcNetTenant,
 dictGetOrDefault('networks', 'tenant', DstAddr, '') AS DstNetTenant,
 c_DstASPath[1] AS Dst1stAS,
 c_DstASPath[2] AS Dst2ndAS,
 c_DstASPath[3] AS Dst3rdAS,
 arrayMap((asn, l1, l2) -> bitShiftLeft(asn::UInt128, 64) + bitShiftLeft(l1::UInt128, 32) + l2::UInt128, {NESTED_COMMUNITY_COLUMNS}) AS DstLargeCommunities
FROM {table}
WHERE length(_error) = 0"
            ),
        ]),
    )
}

/// (Re)create the view capturing Kafka decode errors. One day of retention
/// is enough to diagnose a bad producer; the hourly partitions keep the TTL
/// drops cheap.
pub(crate) fn create_raw_errors_view(config: &Config) -> Step {
    let table = raw_table_name(config);
    let view = format!("{table}_errors");
    Step::new(
        format!("create {view} view"),
        fingerprint::table_hash_query(fingerprint::RAW_ERRORS_VIEW_HASH, "AND as_select LIKE ?"),
        vec![
            view.clone(),
            "% WHERE length(_error) > 0".to_string(),
            view.clone(),
        ],
        ExecSql::new(vec![
            format!("DROP TABLE IF EXISTS {view} SYNC"),
            format!(
                "\
CREATE MATERIALIZED VIEW {view}
ENGINE = MergeTree
ORDER BY (timestamp, topic, partition, offset)
PARTITION BY toYYYYMMDDhhmmss(toStartOfHour(timestamp))
TTL timestamp + INTERVAL 1 DAY
AS SELECT
 now() AS timestamp,
 _topic AS topic,
 _partition AS partition,
 _offset AS offset,
 _raw_message AS raw,
 _error AS error
FROM {table}
WHERE length(_error) > 0"
            ),
        ]),
    )
}
