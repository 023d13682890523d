//! Column-set fingerprinting for idempotence checks.
//!
//! ClickHouse does not version DDL, and comparing `create_table_query` text
//! is brittle (whitespace, default reordering). The column set reported by
//! the system catalog is stable across re-creation, so a 64-bit XOR over
//! per-column hashes identifies a table shape. Steps that govern views and
//! dictionaries (objects with no single marker column) compare the live
//! hash against one of the golden constants below, optionally narrowed by a
//! predicate on the stored create/select text.

/// Expected hash of the per-resolution consumer view columns.
pub(crate) const CONSUMER_VIEW_HASH: u64 = 10874532506016793032;

/// Expected hash of the exporters view columns.
pub(crate) const EXPORTERS_VIEW_HASH: u64 = 9989732154180416521;

/// Expected hash of the networks dictionary columns.
pub(crate) const NETWORKS_DICTIONARY_HASH: u64 = 5246378884861475308;

/// Expected hash of the raw Kafka table columns.
pub(crate) const RAW_TABLE_HASH: u64 = 8163754828379578018;

/// Expected hash of the raw consumer view columns.
pub(crate) const RAW_CONSUMER_VIEW_HASH: u64 = 7925127510274634003;

/// Expected hash of the raw errors view columns.
pub(crate) const RAW_ERRORS_VIEW_HASH: u64 = 9120662669408051900;

/// Build a check query returning 1 iff the named object exists, its
/// column-set hash equals `hash`, and `extra_predicate` (possibly empty)
/// holds on the `system.tables` row.
///
/// The object name must be bound twice, once per subquery; any `?` in
/// `extra_predicate` binds between the two.
pub(crate) fn table_hash_query(hash: u64, extra_predicate: &str) -> String {
    format!(
        "\
SELECT bitAnd(v1, v2) AS applied FROM (
 SELECT 1 AS v1
 FROM system.tables
 WHERE name = ? AND database = currentDatabase() {extra_predicate}
) t1, (
 SELECT groupBitXor(cityHash64(name,type,position)) == {hash} AS v2
 FROM system.columns
 WHERE table = ? AND database = currentDatabase()
) t2"
    )
}
