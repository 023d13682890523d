//! Canonical physical schema for the flow tables.
//!
//! The column list below is the single source of truth for every governed
//! table: the base table uses it whole, aggregates and the raw Kafka table
//! use subsets derived with [`partial_schema`]. Everything in this module is
//! a pure string function, testable by equality.

/// Name of the unaggregated base table.
pub const BASE_TABLE: &str = "flows";

/// Canonical column DDL for the base flows table, one column per line.
/// Order matters: it is the physical order the migration steps maintain.
const FLOWS_SCHEMA: &str = "\
 TimeReceived DateTime CODEC(DoubleDelta, LZ4),
 SamplingRate UInt64,
 ExporterAddress LowCardinality(IPv6),
 ExporterName LowCardinality(String),
 ExporterGroup LowCardinality(String),
 ExporterRole LowCardinality(String),
 ExporterSite LowCardinality(String),
 ExporterRegion LowCardinality(String),
 ExporterTenant LowCardinality(String),
 SrcAddr IPv6,
 DstAddr IPv6,
 SrcNetMask UInt8,
 DstNetMask UInt8,
 SrcAS UInt32,
 DstAS UInt32,
 SrcNetName LowCardinality(String),
 DstNetName LowCardinality(String),
 SrcNetRole LowCardinality(String),
 DstNetRole LowCardinality(String),
 SrcNetSite LowCardinality(String),
 DstNetSite LowCardinality(String),
 SrcNetRegion LowCardinality(String),
 DstNetRegion LowCardinality(String),
 SrcNetTenant LowCardinality(String),
 DstNetTenant LowCardinality(String),
 SrcCountry FixedString(2),
 DstCountry FixedString(2),
 DstASPath Array(UInt32),
 Dst1stAS UInt32,
 Dst2ndAS UInt32,
 Dst3rdAS UInt32,
 DstCommunities Array(UInt32),
 DstLargeCommunities Array(UInt128),
 InIfName LowCardinality(String),
 OutIfName LowCardinality(String),
 InIfDescription String,
 OutIfDescription String,
 InIfSpeed UInt32,
 OutIfSpeed UInt32,
 InIfConnectivity LowCardinality(String),
 OutIfConnectivity LowCardinality(String),
 InIfProvider LowCardinality(String),
 OutIfProvider LowCardinality(String),
 InIfBoundary Enum8('undefined' = 0, 'external' = 1, 'internal' = 2),
 OutIfBoundary Enum8('undefined' = 0, 'external' = 1, 'internal' = 2),
 EType UInt32,
 Proto UInt32,
 SrcPort UInt32,
 DstPort UInt32,
 Bytes UInt64,
 Packets UInt64,
 ForwardingStatus UInt32";

/// The full canonical column DDL for the base table.
pub fn flows_schema() -> &'static str {
    FLOWS_SCHEMA
}

/// The canonical schema minus the named columns.
///
/// A line is removed when its first whitespace-delimited token matches one of
/// the names in `remove`.
pub fn partial_schema(remove: &[&str]) -> String {
    FLOWS_SCHEMA
        .lines()
        .filter(|line| {
            let trimmed = line.trim_start();
            !remove
                .iter()
                .any(|col| trimmed.starts_with(&format!("{col} ")))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Extract the column name from its creation spec: strips an optional
/// `IF NOT EXISTS ` prefix and returns the first token.
pub fn column_name(spec: &str) -> &str {
    let spec = spec.trim_start();
    let spec = spec.strip_prefix("IF NOT EXISTS ").unwrap_or(spec);
    spec.split_whitespace().next().unwrap_or(spec)
}

/// Build an `ADD COLUMN ... AFTER ...` clause adding columns after an anchor,
/// chaining each new column after the previous one so the final physical
/// order matches the argument order.
pub fn add_columns_after(after: &str, columns: &[&str]) -> String {
    let mut clauses = Vec::with_capacity(columns.len());
    let mut last = after;
    for column in columns {
        clauses.push(format!("ADD COLUMN {column} AFTER {last}"));
        last = column_name(column);
    }
    clauses.join(", ")
}

/// Render an interval in seconds the way table names embed it: an
/// hours/minutes/seconds suffix where smaller units stay visible once a
/// larger one is present (60 is "1m0s", 3600 is "1h0m0s").
pub fn interval_suffix(seconds: u64) -> String {
    let h = seconds / 3600;
    let m = (seconds % 3600) / 60;
    let s = seconds % 60;
    if h > 0 {
        format!("{h}h{m}m{s}s")
    } else if m > 0 {
        format!("{m}m{s}s")
    } else {
        format!("{s}s")
    }
}
