//! SQLite settings store: per-user and per-group preferences plus the
//! profile fields the bot sees on incoming updates.

mod migrations;
mod models;
mod queries;

pub use models::*;
pub use queries::*;

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use tracing::{debug, info};

/// Concurrent update handlers share this many connections.
const MAX_CONNECTIONS: u32 = 5;

/// Handlers write profile rows concurrently; SQLite serializes the writes.
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open the settings store for the bot, creating and migrating it as
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or written, or a
    /// migration fails.
    pub async fn new(path: &Path) -> Result<Self> {
        let options = connect_options(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);
        let db = Self::connect(options, path).await?;

        migrations::run(&db.pool).await?;
        info!(version = migrations::LATEST_VERSION, "Settings store schema up to date");

        // A read-only mount only fails on the first write otherwise
        let tx = db.pool.begin().await.with_context(|| {
            format!(
                "Settings store {} is not writable. Check file permissions",
                path.display()
            )
        })?;
        tx.commit().await.context("Failed to commit writability check")?;

        Ok(db)
    }

    /// Open an existing store read-only, without migrating it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or was written by a newer
    /// schema than this build knows.
    pub async fn open_existing(path: &Path) -> Result<Self> {
        if !path.is_file() {
            bail!("Settings store {} does not exist", path.display());
        }
        let db = Self::connect(connect_options(path).read_only(true), path).await?;

        let version = migrations::current_version(&db.pool).await?;
        if version > migrations::LATEST_VERSION {
            bail!(
                "Settings store {} has schema v{version}, newer than supported v{}",
                path.display(),
                migrations::LATEST_VERSION
            );
        }
        debug!(version, "Opened settings store read-only");
        Ok(db)
    }

    async fn connect(options: SqliteConnectOptions, path: &Path) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open settings store {}", path.display()))?;
        Ok(Self { pool })
    }

    /// Schema version recorded in the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the version table cannot be read.
    pub async fn schema_version(&self) -> Result<i32> {
        migrations::current_version(&self.pool).await
    }

    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Wait for in-flight queries and close every connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn connect_options(path: &Path) -> SqliteConnectOptions {
    SqliteConnectOptions::new()
        .filename(path)
        .busy_timeout(BUSY_TIMEOUT)
}
