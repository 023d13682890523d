//! Column-addition steps.
//!
//! Each step witnesses its post-state through a marker column (the last one
//! it adds), so a table created with the full canonical schema passes every
//! check untouched while an older table picks up exactly the missing pieces.

use async_trait::async_trait;
use tracing::debug;

use super::{ExecSql, Step, StepApply, COLUMN_EXISTS_CHECK};
use crate::config::ResolutionConfig;
use crate::driver::Database;
use crate::error::Result;
use crate::schema;

/// Check query matching when a column name appears in a table's sorting key.
const SORTING_KEY_CONTAINS_CHECK: &str =
    r"SELECT 1 AS applied FROM system.tables
WHERE name = ? AND database = currentDatabase()
AND has(splitByRegexp(',\\s*', sorting_key), ?)";

/// Applier adding columns after an anchor column, appending them to the
/// sorting key on aggregate tables when asked to. The base table's sorting
/// key is never modified.
struct AddColumns {
    table: String,
    after: &'static str,
    columns: Vec<String>,
    extend_sorting_key: bool,
}

impl AddColumns {
    async fn modifications(&self, db: &dyn Database) -> Result<String> {
        let specs: Vec<&str> = self.columns.iter().map(String::as_str).collect();
        let mut modifications = schema::add_columns_after(self.after, &specs);
        if self.extend_sorting_key && self.table != schema::BASE_TABLE {
            let sorting_key = db.sorting_key(&self.table).await?;
            let names: Vec<&str> = specs.iter().map(|s| schema::column_name(s)).collect();
            modifications = format!(
                "{modifications}, MODIFY ORDER BY ({sorting_key}, {})",
                names.join(", ")
            );
        }
        Ok(modifications)
    }
}

#[async_trait]
impl StepApply for AddColumns {
    async fn apply(&self, db: &dyn Database) -> Result<()> {
        let modifications = self.modifications(db).await?;
        db.exec(&format!("ALTER TABLE {} {}", self.table, modifications))
            .await
    }
}

/// Add the exporter metadata columns after `ExporterGroup`.
///
/// These never enter the sorting key: they are constant for a given
/// `ExporterAddress`, which already leads the key.
pub(crate) fn add_exporter_columns(resolution: ResolutionConfig) -> Step {
    let table = resolution.table_name();
    Step::new(
        format!("add exporter metadata columns to {table}"),
        COLUMN_EXISTS_CHECK,
        vec![table.clone(), "ExporterTenant".to_string()],
        Box::new(AddColumns {
            table,
            after: "ExporterGroup",
            columns: vec![
                "ExporterRole LowCardinality(String)".to_string(),
                "ExporterSite LowCardinality(String)".to_string(),
                "ExporterRegion LowCardinality(String)".to_string(),
                "ExporterTenant LowCardinality(String)".to_string(),
            ],
            extend_sorting_key: false,
        }),
    )
}

/// Add the source/destination netmask columns to the base table.
pub(crate) fn add_net_mask_columns() -> Step {
    Step::new(
        "add netmask columns to flows",
        COLUMN_EXISTS_CHECK,
        vec![schema::BASE_TABLE.to_string(), "SrcNetMask".to_string()],
        Box::new(AddColumns {
            table: schema::BASE_TABLE.to_string(),
            after: "DstAddr",
            columns: vec!["SrcNetMask UInt8".to_string(), "DstNetMask UInt8".to_string()],
            extend_sorting_key: true,
        }),
    )
}

/// Add alias columns rendering the CIDR prefix of each address. IPv4 sits in
/// the IPv6 columns as `::ffff:a.b.c.d`, so its mask is offset by 96 and the
/// prefix stripped back to dotted quad.
pub(crate) fn add_net_prefix_columns() -> Step {
    let src = net_prefix_column("Src");
    let dst = net_prefix_column("Dst");
    Step::new(
        "add network prefix alias columns to flows",
        COLUMN_EXISTS_CHECK,
        vec![schema::BASE_TABLE.to_string(), "SrcNetPrefix".to_string()],
        ExecSql::new(vec![format!(
            "ALTER TABLE flows {}",
            schema::add_columns_after("DstNetMask", &[src.as_str(), dst.as_str()])
        )]),
    )
}

fn net_prefix_column(direction: &str) -> String {
    format!(
        "{direction}NetPrefix String ALIAS \
CASE \
WHEN EType = 0x800 THEN concat(replaceRegexpOne(IPv6CIDRToRange({direction}Addr, (96 + {direction}NetMask)::UInt8).1::String, '^::ffff:', ''), '/', {direction}NetMask::String) \
WHEN EType = 0x86dd THEN concat(IPv6CIDRToRange({direction}Addr, {direction}NetMask).1::String, '/', {direction}NetMask::String) \
ELSE '' \
END"
    )
}

/// Add the source/destination network name columns after `DstAS`.
pub(crate) fn add_net_name_columns(resolution: ResolutionConfig) -> Step {
    let table = resolution.table_name();
    Step::new(
        format!("add network name columns to {table}"),
        COLUMN_EXISTS_CHECK,
        vec![table.clone(), "DstNetName".to_string()],
        Box::new(AddColumns {
            table,
            after: "DstAS",
            columns: vec![
                "SrcNetName LowCardinality(String)".to_string(),
                "DstNetName LowCardinality(String)".to_string(),
            ],
            extend_sorting_key: true,
        }),
    )
}

/// Add the remaining network attribute columns after `DstNetName`.
pub(crate) fn add_net_attribute_columns(resolution: ResolutionConfig) -> Step {
    let table = resolution.table_name();
    Step::new(
        format!("add network attribute columns to {table}"),
        COLUMN_EXISTS_CHECK,
        vec![table.clone(), "DstNetRole".to_string()],
        Box::new(AddColumns {
            table,
            after: "DstNetName",
            columns: vec![
                "SrcNetRole LowCardinality(String)".to_string(),
                "DstNetRole LowCardinality(String)".to_string(),
                "SrcNetSite LowCardinality(String)".to_string(),
                "DstNetSite LowCardinality(String)".to_string(),
                "SrcNetRegion LowCardinality(String)".to_string(),
                "DstNetRegion LowCardinality(String)".to_string(),
                "SrcNetTenant LowCardinality(String)".to_string(),
                "DstNetTenant LowCardinality(String)".to_string(),
            ],
            extend_sorting_key: true,
        }),
    )
}

/// Repair aggregates whose country columns were added without entering the
/// sorting key: drop them and re-add after `DstNetTenant`, extending the key.
/// The check treats "SrcCountry already in the sorting key" as done, so both
/// fresh tables and repaired ones skip it.
pub(crate) fn fix_order_by_country(resolution: ResolutionConfig) -> Step {
    if resolution.is_base() {
        return Step::noop("country columns stay out of the flows sorting key");
    }
    let table = resolution.table_name();
    Step::new(
        format!("move country columns into {table} sorting key"),
        SORTING_KEY_CONTAINS_CHECK,
        vec![table.clone(), "SrcCountry".to_string()],
        Box::new(ReorderCountryColumns { table }),
    )
}

struct ReorderCountryColumns {
    table: String,
}

#[async_trait]
impl StepApply for ReorderCountryColumns {
    async fn apply(&self, db: &dyn Database) -> Result<()> {
        debug!("drop SrcCountry/DstCountry columns");
        db.exec(&format!(
            "ALTER TABLE {} DROP COLUMN SrcCountry, DROP COLUMN DstCountry",
            self.table
        ))
        .await?;
        debug!("add back SrcCountry/DstCountry columns");
        AddColumns {
            table: self.table.clone(),
            after: "DstNetTenant",
            columns: vec![
                "SrcCountry FixedString(2)".to_string(),
                "DstCountry FixedString(2)".to_string(),
            ],
            extend_sorting_key: true,
        }
        .apply(db)
        .await
    }
}

/// Add the destination AS path columns after `DstCountry`. The base table
/// keeps the full path; aggregates only carry the first three hops.
pub(crate) fn add_dst_as_path_columns(resolution: ResolutionConfig) -> Step {
    let table = resolution.table_name();
    let mut columns = Vec::new();
    if resolution.is_base() {
        columns.push("DstASPath Array(UInt32)".to_string());
    }
    columns.extend([
        "Dst1stAS UInt32".to_string(),
        "Dst2ndAS UInt32".to_string(),
        "Dst3rdAS UInt32".to_string(),
    ]);
    Step::new(
        format!("add AS path columns to {table}"),
        COLUMN_EXISTS_CHECK,
        vec![table.clone(), "Dst1stAS".to_string()],
        Box::new(AddColumns {
            table,
            after: "DstCountry",
            columns,
            extend_sorting_key: true,
        }),
    )
}

/// Add the destination communities column to the base table.
pub(crate) fn add_dst_communities_column() -> Step {
    Step::new(
        "add communities column to flows",
        COLUMN_EXISTS_CHECK,
        vec![schema::BASE_TABLE.to_string(), "DstCommunities".to_string()],
        Box::new(AddColumns {
            table: schema::BASE_TABLE.to_string(),
            after: "Dst3rdAS",
            columns: vec!["DstCommunities Array(UInt32)".to_string()],
            extend_sorting_key: true,
        }),
    )
}

/// Add the destination large communities column to the base table.
pub(crate) fn add_dst_large_communities_column() -> Step {
    Step::new(
        "add large communities column to flows",
        COLUMN_EXISTS_CHECK,
        vec![schema::BASE_TABLE.to_string(), "DstLargeCommunities".to_string()],
        Box::new(AddColumns {
            table: schema::BASE_TABLE.to_string(),
            after: "DstCommunities",
            columns: vec!["DstLargeCommunities Array(UInt128)".to_string()],
            extend_sorting_key: true,
        }),
    )
}

/// Packet-size histogram boundaries, in bytes. 1501 and the power-of-two
/// ladder above it separate standard-MTU traffic from jumbo frames.
const PACKET_SIZE_BOUNDARIES: [u64; 16] = [
    64, 128, 256, 512, 768, 1024, 1280, 1501, 2048, 3072, 4096, 8192, 10240, 16384, 32768, 65536,
];

/// Add the packet size alias columns after `Packets`.
pub(crate) fn add_packet_size_columns(resolution: ResolutionConfig) -> Step {
    let table = resolution.table_name();
    let bucket = packet_size_bucket_column();
    Step::new(
        format!("add packet size alias columns to {table}"),
        COLUMN_EXISTS_CHECK,
        vec![table.clone(), "PacketSizeBucket".to_string()],
        ExecSql::new(vec![format!(
            "ALTER TABLE {table} {}",
            schema::add_columns_after(
                "Packets",
                &["PacketSize UInt64 ALIAS intDiv(Bytes, Packets)", bucket.as_str()]
            )
        )]),
    )
}

fn packet_size_bucket_column() -> String {
    let mut conditions = Vec::with_capacity(PACKET_SIZE_BOUNDARIES.len() + 1);
    let mut last = 0;
    for boundary in PACKET_SIZE_BOUNDARIES {
        conditions.push(format!("PacketSize < {boundary}, '{last}-{}'", boundary - 1));
        last = boundary;
    }
    conditions.push(format!("'{last}-Inf'"));
    format!(
        "PacketSizeBucket LowCardinality(String) ALIAS multiIf({})",
        conditions.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exporter_columns_check() {
        let step = add_exporter_columns(ResolutionConfig { interval: 60, ttl: 0 });
        assert_eq!(step.check_query(), COLUMN_EXISTS_CHECK);
        assert_eq!(
            step.check_args(),
            &["flows_1m0s".to_string(), "ExporterTenant".to_string()]
        );
    }

    #[test]
    fn test_net_prefix_column_sql() {
        let sql = net_prefix_column("Src");
        assert!(sql.starts_with("SrcNetPrefix String ALIAS"));
        assert!(sql.contains("WHEN EType = 0x800"));
        assert!(sql.contains("WHEN EType = 0x86dd"));
        assert!(sql.contains("96 + SrcNetMask"));
        assert!(sql.contains("'^::ffff:'"));
        assert_eq!(schema::column_name(&sql), "SrcNetPrefix");
    }

    #[test]
    fn test_packet_size_bucket_boundaries() {
        let sql = packet_size_bucket_column();
        assert!(sql.starts_with("PacketSizeBucket LowCardinality(String) ALIAS multiIf("));
        assert!(sql.contains("PacketSize < 64, '0-63'"));
        assert!(sql.contains("PacketSize < 128, '64-127'"));
        assert!(sql.contains("PacketSize < 1501, '1280-1500'"));
        assert!(sql.contains("PacketSize < 2048, '1501-2047'"));
        assert!(sql.contains("PacketSize < 65536, '32768-65535'"));
        assert!(sql.ends_with("'65536-Inf')"));
    }

    #[test]
    fn test_as_path_columns_per_table() {
        let base = add_dst_as_path_columns(ResolutionConfig { interval: 0, ttl: 0 });
        assert_eq!(base.check_args()[0], "flows");

        let aggregate = add_dst_as_path_columns(ResolutionConfig { interval: 3_600, ttl: 0 });
        assert_eq!(aggregate.check_args()[0], "flows_1h0m0s");
        assert_eq!(aggregate.check_args()[1], "Dst1stAS");
    }

    #[test]
    fn test_fix_order_by_country_base_is_noop() {
        let step = fix_order_by_country(ResolutionConfig { interval: 0, ttl: 0 });
        assert_eq!(step.check_query(), "SELECT 1 AS applied");
    }

    #[test]
    fn test_fix_order_by_country_check() {
        let step = fix_order_by_country(ResolutionConfig { interval: 60, ttl: 0 });
        assert!(step.check_query().contains(r"splitByRegexp(',\\s*', sorting_key)"));
        assert_eq!(
            step.check_args(),
            &["flows_1m0s".to_string(), "SrcCountry".to_string()]
        );
    }
}
