//! Migration step library.
//!
//! Each step is an atomic migration action: a check query witnessing the
//! post-state and an applier that brings the database there. The factories
//! in the submodules bind steps to the configuration; the runner executes
//! them in the order produced by the planner.

mod columns;
mod dictionaries;
mod flows;
mod raw;
mod views;

pub(crate) use columns::{
    add_dst_as_path_columns, add_dst_communities_column, add_dst_large_communities_column,
    add_exporter_columns, add_net_attribute_columns, add_net_mask_columns,
    add_net_name_columns, add_net_prefix_columns, add_packet_size_columns,
    fix_order_by_country,
};
pub(crate) use dictionaries::{
    create_asns_dictionary, create_networks_dictionary, create_protocols_dictionary,
};
pub(crate) use flows::{create_flows_table, set_ttl};
pub(crate) use raw::{create_raw_consumer_view, create_raw_errors_view, create_raw_table};
pub(crate) use views::{create_consumer_view, create_exporters_view};

use async_trait::async_trait;

use crate::driver::Database;
use crate::error::Result;

/// Check query matching when a table of the given name exists.
pub(crate) const TABLE_EXISTS_CHECK: &str =
    "SELECT 1 AS applied FROM system.tables WHERE name = ? AND database = currentDatabase()";

/// Check query matching when a table carries a column of the given name.
pub(crate) const COLUMN_EXISTS_CHECK: &str =
    "SELECT 1 AS applied FROM system.columns \
     WHERE table = ? AND database = currentDatabase() AND name = ?";

/// Columns present on the base table but absent from the aggregates: without
/// the addresses the derived columns are meaningless, and the per-packet
/// discriminators do not sum.
pub(crate) const AGGREGATE_DROPPED_COLUMNS: [&str; 9] = [
    "SrcAddr",
    "DstAddr",
    "SrcNetMask",
    "DstNetMask",
    "SrcPort",
    "DstPort",
    "DstASPath",
    "DstCommunities",
    "DstLargeCommunities",
];

/// Applies a step's DDL against a live connection.
#[async_trait]
pub(crate) trait StepApply: Send + Sync {
    async fn apply(&self, db: &dyn Database) -> Result<()>;
}

/// One atomic migration action, consumed once by the runner.
pub struct Step {
    name: String,
    check_query: String,
    check_args: Vec<String>,
    applier: Box<dyn StepApply>,
}

impl Step {
    pub(crate) fn new(
        name: impl Into<String>,
        check_query: impl Into<String>,
        check_args: Vec<String>,
        applier: Box<dyn StepApply>,
    ) -> Self {
        Self {
            name: name.into(),
            check_query: check_query.into(),
            check_args,
            applier,
        }
    }

    /// Placeholder for resolution/step combinations with nothing to do: the
    /// check always passes and the applier is never invoked.
    pub(crate) fn noop(name: impl Into<String>) -> Self {
        Self::new(name, "SELECT 1 AS applied", Vec::new(), Box::new(Noop))
    }

    /// Human-readable step identity, used in logs and errors.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// SQL witnessing whether the step has already been applied.
    pub fn check_query(&self) -> &str {
        &self.check_query
    }

    /// Positional arguments for the check query.
    pub fn check_args(&self) -> &[String] {
        &self.check_args
    }

    /// Bring the database to this step's post-state.
    pub async fn apply(&self, db: &dyn Database) -> Result<()> {
        self.applier.apply(db).await
    }
}

struct Noop;

#[async_trait]
impl StepApply for Noop {
    async fn apply(&self, _db: &dyn Database) -> Result<()> {
        Ok(())
    }
}

/// Applier executing a fixed sequence of DDL statements.
pub(crate) struct ExecSql {
    statements: Vec<String>,
}

impl ExecSql {
    pub(crate) fn new(statements: Vec<String>) -> Box<Self> {
        Box::new(Self { statements })
    }
}

#[async_trait]
impl StepApply for ExecSql {
    async fn apply(&self, db: &dyn Database) -> Result<()> {
        for sql in &self.statements {
            db.exec(sql).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_step_always_passes() {
        let step = Step::noop("nothing to do");
        assert_eq!(step.check_query(), "SELECT 1 AS applied");
        assert!(step.check_args().is_empty());
    }
}
