//! Materialized views: per-resolution consumers and the exporters view.

use super::{ExecSql, Step, AGGREGATE_DROPPED_COLUMNS};
use crate::config::ResolutionConfig;
use crate::fingerprint;
use crate::schema;

/// (Re)create the materialized view feeding an aggregate table from the base
/// table. Views hold no durable data, so drop-and-recreate is safe; the
/// fingerprint plus a predicate on the stored SELECT make the check survive
/// re-creation.
pub(crate) fn create_consumer_view(resolution: ResolutionConfig) -> Step {
    if resolution.is_base() {
        // The base table is fed by the raw consumer, created later.
        return Step::noop("no aggregation consumer for flows");
    }
    let table = resolution.table_name();
    let view = resolution.consumer_name();
    let select_clause = consumer_select_clause(resolution.interval);
    Step::new(
        format!("create {view} view"),
        fingerprint::table_hash_query(fingerprint::CONSUMER_VIEW_HASH, "AND as_select LIKE ?"),
        vec![
            view.clone(),
            format!("{select_clause} FROM %"),
            view.clone(),
        ],
        // No GROUP BY: the SummingMergeTree folds rows sharing a sorting key.
        ExecSql::new(vec![
            format!("DROP TABLE IF EXISTS {view} SYNC"),
            format!(
                "CREATE MATERIALIZED VIEW {view} TO {table}\nAS {select_clause}\nFROM {}",
                schema::BASE_TABLE
            ),
        ]),
    )
}

fn consumer_select_clause(interval: u64) -> String {
    format!(
        "SELECT * EXCEPT ({}) REPLACE toStartOfInterval(TimeReceived, toIntervalSecond({interval})) AS TimeReceived",
        AGGREGATE_DROPPED_COLUMNS.join(", ")
    )
}

/// (Re)create the exporters view: one row per exporter and interface,
/// deduplicated by the ReplacingMergeTree on the latest TimeReceived. The
/// In/Out column pairs are unpivoted with an ARRAY JOIN over both indices.
pub(crate) fn create_exporters_view() -> Step {
    Step::new(
        "create exporters view",
        fingerprint::table_hash_query(fingerprint::EXPORTERS_VIEW_HASH, ""),
        vec!["exporters".to_string(), "exporters".to_string()],
        ExecSql::new(vec![
            "DROP TABLE IF EXISTS exporters SYNC".to_string(),
            "\
CREATE MATERIALIZED VIEW exporters
ENGINE = ReplacingMergeTree(TimeReceived)
ORDER BY (ExporterAddress, IfName)
AS
SELECT DISTINCT
 TimeReceived,
 ExporterAddress,
 ExporterName,
 ExporterGroup,
 ExporterRole,
 ExporterSite,
 ExporterRegion,
 ExporterTenant,
 [InIfName, OutIfName][num] AS IfName,
 [InIfDescription, OutIfDescription][num] AS IfDescription,
 [InIfSpeed, OutIfSpeed][num] AS IfSpeed,
 [InIfConnectivity, OutIfConnectivity][num] AS IfConnectivity,
 [InIfProvider, OutIfProvider][num] AS IfProvider,
 [InIfBoundary, OutIfBoundary][num] AS IfBoundary
FROM flows
ARRAY JOIN arrayEnumerate([1,2]) AS num"
                .to_string(),
        ]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consumer_select_clause() {
        let clause = consumer_select_clause(60);
        assert_eq!(
            clause,
            "SELECT * EXCEPT (SrcAddr, DstAddr, SrcNetMask, DstNetMask, SrcPort, DstPort, \
             DstASPath, DstCommunities, DstLargeCommunities) \
             REPLACE toStartOfInterval(TimeReceived, toIntervalSecond(60)) AS TimeReceived"
        );
    }

    #[test]
    fn test_consumer_view_step() {
        let step = create_consumer_view(ResolutionConfig { interval: 60, ttl: 604_800 });
        assert_eq!(step.name(), "create flows_1m0s_consumer view");
        assert!(step.check_query().contains("as_select LIKE ?"));
        assert_eq!(step.check_args().len(), 3);
        assert_eq!(step.check_args()[0], "flows_1m0s_consumer");
        assert!(step.check_args()[1].starts_with("SELECT * EXCEPT"));
        assert!(step.check_args()[1].ends_with("AS TimeReceived FROM %"));
        assert_eq!(step.check_args()[2], "flows_1m0s_consumer");
    }

    #[test]
    fn test_consumer_view_base_is_noop() {
        let step = create_consumer_view(ResolutionConfig { interval: 0, ttl: 1_296_000 });
        assert_eq!(step.check_query(), "SELECT 1 AS applied");
    }

    #[test]
    fn test_exporters_view_check() {
        let step = create_exporters_view();
        assert!(step
            .check_query()
            .contains("== 9989732154180416521"));
        assert_eq!(
            step.check_args(),
            &["exporters".to_string(), "exporters".to_string()]
        );
    }
}
