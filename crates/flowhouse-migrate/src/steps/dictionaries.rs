//! Enrichment dictionaries loaded over HTTP from the orchestrator service.
//!
//! The database itself fetches the CSVs; this module only embeds the URLs in
//! the dictionary DDL. `CREATE OR REPLACE` keeps re-creation atomic, so no
//! drop is needed.

use super::{ExecSql, Step};
use crate::config::Config;
use crate::fingerprint;

const CSV_SETTINGS: &str = "SETTINGS(format_csv_allow_single_quotes = 0)";

const DICTIONARY_CHECK: &str =
    "SELECT 1 AS applied FROM system.tables \
     WHERE name = ? AND database = currentDatabase() AND create_table_query LIKE ?";

/// HTTP source clause for a dictionary CSV, plus the LIKE pattern matching
/// it inside the stored create text.
fn http_source(config: &Config, file: &str) -> (String, String) {
    let source = format!(
        "SOURCE(HTTP(URL '{}/api/v0/orchestrator/clickhouse/{file}' FORMAT 'CSVWithNames'))",
        config.orchestrator_url
    );
    let like = format!("% {source}% {CSV_SETTINGS}%");
    (source, like)
}

/// Create the IP protocol lookup dictionary.
pub(crate) fn create_protocols_dictionary(config: &Config) -> Step {
    let (source, like) = http_source(config, "protocols.csv");
    Step::new(
        "create protocols dictionary",
        DICTIONARY_CHECK,
        vec!["protocols".to_string(), like],
        ExecSql::new(vec![format!(
            "\
CREATE OR REPLACE DICTIONARY protocols (
 proto UInt8 INJECTIVE,
 name String,
 description String
)
PRIMARY KEY proto
{source}
LIFETIME(MIN 0 MAX 3600)
LAYOUT(HASHED())
{CSV_SETTINGS}"
        )]),
    )
}

/// Create the AS number lookup dictionary.
pub(crate) fn create_asns_dictionary(config: &Config) -> Step {
    let (source, like) = http_source(config, "asns.csv");
    Step::new(
        "create asns dictionary",
        DICTIONARY_CHECK,
        vec!["asns".to_string(), like],
        ExecSql::new(vec![format!(
            "\
CREATE OR REPLACE DICTIONARY asns (
 asn UInt32 INJECTIVE,
 name String
)
PRIMARY KEY asn
{source}
LIFETIME(MIN 0 MAX 3600)
LAYOUT(HASHED())
{CSV_SETTINGS}"
        )]),
    )
}

/// Create the networks lookup dictionary. Its column set has grown over
/// releases, so the check compares the column fingerprint on top of the
/// source predicate.
pub(crate) fn create_networks_dictionary(config: &Config) -> Step {
    let (source, like) = http_source(config, "networks.csv");
    Step::new(
        "create networks dictionary",
        fingerprint::table_hash_query(
            fingerprint::NETWORKS_DICTIONARY_HASH,
            "AND create_table_query LIKE ?",
        ),
        vec!["networks".to_string(), like, "networks".to_string()],
        ExecSql::new(vec![format!(
            "\
CREATE OR REPLACE DICTIONARY networks (
 network String,
 name String,
 role String,
 site String,
 region String,
 tenant String
)
PRIMARY KEY network
{source}
LIFETIME(MIN 0 MAX 3600)
LAYOUT(IP_TRIE())
{CSV_SETTINGS}"
        )]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config::from_yaml(
            r#"
orchestrator_url: http://orchestrator:8080
kafka:
  brokers: [kafka:9092]
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_http_source_urls() {
        let config = test_config();
        let (source, like) = http_source(&config, "protocols.csv");
        assert_eq!(
            source,
            "SOURCE(HTTP(URL 'http://orchestrator:8080/api/v0/orchestrator/clickhouse/protocols.csv' FORMAT 'CSVWithNames'))"
        );
        assert!(like.starts_with("% SOURCE(HTTP(URL "));
        assert!(like.ends_with("% SETTINGS(format_csv_allow_single_quotes = 0)%"));
    }

    #[test]
    fn test_protocols_dictionary_step() {
        let step = create_protocols_dictionary(&test_config());
        assert_eq!(step.check_query(), DICTIONARY_CHECK);
        assert_eq!(step.check_args()[0], "protocols");
        assert!(step.check_args()[1].contains("protocols.csv"));
    }

    #[test]
    fn test_networks_dictionary_uses_fingerprint() {
        let step = create_networks_dictionary(&test_config());
        assert!(step.check_query().contains("== 5246378884861475308"));
        assert!(step.check_query().contains("create_table_query LIKE ?"));
        assert_eq!(step.check_args().len(), 3);
        assert_eq!(step.check_args()[0], "networks");
        assert_eq!(step.check_args()[2], "networks");
    }
}
