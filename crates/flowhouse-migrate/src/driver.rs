//! ClickHouse driver adapter.
//!
//! The rest of the engine depends only on the [`Database`] capability trait;
//! [`ClickhouseDriver`] implements it over a live connection with the run's
//! cancellation token woven into every call.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use clickhouse::Client;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::ClickhouseConfig;
use crate::error::{MigrateError, Result};

/// Connection attempts before start-up gives up on the database.
const CONNECT_ATTEMPTS: u32 = 10;

/// Base delay between connection attempts in milliseconds.
/// Backoff is linear: 500ms, 1000ms, 1500ms, ... (delay * attempt).
const CONNECT_BASE_DELAY_MS: u64 = 500;

/// Capability surface the migration engine needs from the database.
#[async_trait]
pub trait Database: Send + Sync {
    /// Execute a DDL statement.
    async fn exec(&self, sql: &str) -> Result<()>;

    /// Run an idempotence check query with positional arguments. Returns
    /// true iff the query yields a row whose single column is truthy; a
    /// missing row counts as false.
    async fn check(&self, sql: &str, args: &[String]) -> Result<bool>;

    /// Current sorting key of a table, from the system catalog.
    async fn sorting_key(&self, table: &str) -> Result<String>;
}

#[derive(Debug, serde::Deserialize, clickhouse::Row)]
struct CheckRow {
    applied: u8,
}

#[derive(Debug, serde::Deserialize, clickhouse::Row)]
struct SortingKeyRow {
    sorting_key: String,
}

/// [`Database`] implementation over a live ClickHouse connection.
pub struct ClickhouseDriver {
    client: Client,
    cancel: CancellationToken,
}

impl ClickhouseDriver {
    /// Open a client and wait for the database to accept queries, retrying
    /// with bounded linear backoff. Only start-up connectivity is retried;
    /// later failures surface immediately.
    pub async fn connect(config: &ClickhouseConfig, cancel: CancellationToken) -> Result<Self> {
        let client = Client::default()
            .with_url(&config.url)
            .with_database(&config.database)
            .with_user(&config.user)
            .with_password(&config.password);
        let driver = Self { client, cancel };

        let mut attempt = 1u32;
        loop {
            match driver.ping().await {
                Ok(()) => {
                    debug!("database ready after {attempt} attempt(s)");
                    return Ok(driver);
                }
                Err(MigrateError::Database(source)) if attempt < CONNECT_ATTEMPTS => {
                    warn!(
                        "database not ready (attempt {attempt}/{CONNECT_ATTEMPTS}): {source}"
                    );
                    driver
                        .sleep(Duration::from_millis(CONNECT_BASE_DELAY_MS * u64::from(attempt)))
                        .await?;
                    attempt += 1;
                }
                Err(MigrateError::Database(source)) => {
                    return Err(MigrateError::Unavailable { attempts: attempt, source });
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn ping(&self) -> Result<()> {
        self.guard(self.client.query("SELECT 1 AS applied").fetch_one::<CheckRow>())
            .await?;
        Ok(())
    }

    async fn sleep(&self, delay: Duration) -> Result<()> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(MigrateError::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }

    /// Run a driver future unless the run is cancelled first.
    async fn guard<T>(
        &self,
        fut: impl Future<Output = clickhouse::error::Result<T>>,
    ) -> Result<T> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(MigrateError::Cancelled),
            res = fut => res.map_err(MigrateError::from),
        }
    }
}

#[async_trait]
impl Database for ClickhouseDriver {
    async fn exec(&self, sql: &str) -> Result<()> {
        let preview: String = sql.chars().take(72).collect();
        debug!("exec: {preview}...");
        self.guard(self.client.query(sql).execute()).await
    }

    async fn check(&self, sql: &str, args: &[String]) -> Result<bool> {
        let mut query = self.client.query(sql);
        for arg in args {
            query = query.bind(arg);
        }
        match self.guard(query.fetch_one::<CheckRow>()).await {
            Ok(row) => Ok(row.applied != 0),
            Err(MigrateError::Database(clickhouse::error::Error::RowNotFound)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn sorting_key(&self, table: &str) -> Result<String> {
        let row = self
            .guard(
                self.client
                    .query(
                        "SELECT sorting_key FROM system.tables \
                         WHERE name = ? AND database = currentDatabase()",
                    )
                    .bind(table)
                    .fetch_one::<SortingKeyRow>(),
            )
            .await?;
        Ok(row.sorting_key)
    }
}
