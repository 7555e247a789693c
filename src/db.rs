//! Primary database connection management.
//!
//! Provides a connection pool to the relational store with WAL mode
//! enabled so request handlers can read while another request writes. The
//! database file and its parent directories are created if missing.
//!
//! Pool acquisition is bounded by the same timeout the hybrid coordinator
//! applies to every primary call, so a saturated pool surfaces as a
//! transient failure instead of a hang.

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::config::Config;

/// Create a connection pool to the configured primary database.
///
/// # Errors
///
/// Returns an error if the database cannot be created or connected to.
pub async fn connect(config: &Config) -> Result<SqlitePool> {
    if let Some(parent) = config.db.path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let pool = pool_options(config)
        .connect_with(connect_options(config)?)
        .await?;

    Ok(pool)
}

/// Create a pool that opens connections on first use.
///
/// Used by the server so that an unreachable primary at startup degrades
/// requests to the fallback store instead of refusing to start.
pub fn connect_lazy(config: &Config) -> Result<SqlitePool> {
    Ok(pool_options(config).connect_lazy_with(connect_options(config)?))
}

fn connect_options(config: &Config) -> Result<SqliteConnectOptions> {
    let options =
        SqliteConnectOptions::from_str(&format!("sqlite:{}", config.db.path.display()))?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);
    Ok(options)
}

fn pool_options(config: &Config) -> SqlitePoolOptions {
    SqlitePoolOptions::new()
        .max_connections(config.db.max_connections)
        .acquire_timeout(config.db.timeout())
}
