//! # flowhouse-migrate
//!
//! Schema-migration engine for the ClickHouse backend of a network-flow
//! observability platform. On every service start it brings a live database
//! from any previously-deployed schema version to the version the current
//! build expects: idempotently, without data loss, and without operator
//! intervention.
//!
//! The engine owns the DDL of the flow pipeline: the base `flows` table fed
//! from a Kafka-backed raw table through a materialized view, one time-rolled
//! aggregate table per configured resolution with its own consumer view, and
//! the enrichment dictionaries the database loads over HTTP.
//!
//! State lives only in the database: every migration step carries a check
//! query witnessing its post-state, and its DDL runs only when the check
//! fails. Interrupted runs resume from the first still-unapplied step.
//!
//! ## Example
//!
//! ```rust,no_run
//! use flowhouse_migrate::{Config, Orchestrator};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> flowhouse_migrate::Result<()> {
//!     let config = Config::load("flowhouse.yaml")?;
//!     let orchestrator = Orchestrator::new(config)?;
//!     let result = orchestrator.run(CancellationToken::new()).await?;
//!     println!("{} steps applied", result.steps_applied);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod orchestrator;
pub mod planner;
pub mod runner;
pub mod schema;
pub mod steps;

mod fingerprint;

// Re-exports for convenient access
pub use config::{ClickhouseConfig, Config, KafkaConfig, ResolutionConfig};
pub use driver::{ClickhouseDriver, Database};
pub use error::{MigrateError, Result};
pub use orchestrator::{MigrationResult, Orchestrator};
pub use runner::RunReport;
pub use steps::Step;
