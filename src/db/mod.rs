//! Database module for feedhook.
//!
//! This module provides the sqlx connection pool and migration management.
//! The backend is chosen at compile time with the `sqlite` (default) or
//! `postgres` feature.

mod schema;

pub use schema::MIGRATIONS;

use std::time::Duration;

use sqlx::Connection;
use tracing::{debug, info, warn};

use crate::config::DatabaseConfig;
use crate::{FeedhookError, Result};

/// Database backend selected by cargo feature.
#[cfg(feature = "sqlite")]
pub type DbBackend = sqlx::Sqlite;
/// Database backend selected by cargo feature.
#[cfg(feature = "postgres")]
pub type DbBackend = sqlx::Postgres;

/// Connection pool for the selected backend.
pub type DbPool = sqlx::Pool<DbBackend>;

/// SQL literal for boolean true.
#[cfg(feature = "sqlite")]
pub const SQL_TRUE: &str = "1";
/// SQL literal for boolean false.
#[cfg(feature = "sqlite")]
pub const SQL_FALSE: &str = "0";
/// SQL literal for boolean true.
#[cfg(feature = "postgres")]
pub const SQL_TRUE: &str = "TRUE";
/// SQL literal for boolean false.
#[cfg(feature = "postgres")]
pub const SQL_FALSE: &str = "FALSE";

#[cfg(feature = "sqlite")]
const SCHEMA_VERSION_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version     BIGINT PRIMARY KEY,
    applied_at  TEXT NOT NULL DEFAULT (datetime('now'))
)"#;
#[cfg(feature = "postgres")]
const SCHEMA_VERSION_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version     BIGINT PRIMARY KEY,
    applied_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
)"#;

/// How long to wait for a pooled connection before giving up.
const ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// Database wrapper owning the connection pool.
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Connect to the configured database, verify it and apply migrations.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = build_pool(config).await?;
        let db = Self { pool };

        db.ping().await?;
        db.log_identity().await;
        db.migrate().await?;

        Ok(db)
    }

    /// Open an in-memory database for testing.
    ///
    /// The pool holds exactly one connection that never expires, since
    /// every SQLite memory connection is its own database.
    #[cfg(feature = "sqlite")]
    pub async fn open_in_memory() -> Result<Self> {
        use std::str::FromStr;

        use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

        debug!("Opening in-memory database");
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| FeedhookError::Config(format!("invalid database url: {e}")))?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Check that a connection can be acquired and answers.
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        conn.ping().await?;
        Ok(())
    }

    /// Close every connection in the pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Get the current schema version.
    pub async fn schema_version(&self) -> Result<i64> {
        sqlx::query(SCHEMA_VERSION_TABLE)
            .execute(&self.pool)
            .await?;

        let version: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_version")
            .fetch_one(&self.pool)
            .await?;
        Ok(version)
    }

    /// Apply pending migrations.
    pub async fn migrate(&self) -> Result<()> {
        let current_version = self.schema_version().await?;

        if current_version as usize >= MIGRATIONS.len() {
            debug!("Database is up to date (version {})", current_version);
            return Ok(());
        }

        info!(
            "Migrating database from version {} to {}",
            current_version,
            MIGRATIONS.len()
        );

        for (i, migration) in MIGRATIONS.iter().enumerate().skip(current_version as usize) {
            let version = (i + 1) as i64;
            info!("Applying migration v{}", version);

            let mut tx = self.pool.begin().await?;
            sqlx::raw_sql(migration).execute(&mut *tx).await?;
            sqlx::query("INSERT INTO schema_version (version) VALUES ($1)")
                .bind(version)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
        }

        Ok(())
    }

    #[cfg(feature = "postgres")]
    async fn log_identity(&self) {
        match sqlx::query_scalar::<_, String>("SELECT current_database()")
            .fetch_one(&self.pool)
            .await
        {
            Ok(name) => info!(database = %name, "Connected to database"),
            Err(e) => warn!("Could not get current database name: {}", e),
        }
    }

    #[cfg(feature = "sqlite")]
    async fn log_identity(&self) {
        match sqlx::query_scalar::<_, String>("SELECT file FROM pragma_database_list WHERE name = 'main'")
            .fetch_one(&self.pool)
            .await
        {
            Ok(file) => info!(database = %file, "Connected to database"),
            Err(e) => warn!("Could not get database file name: {}", e),
        }
    }
}

#[cfg(feature = "sqlite")]
async fn build_pool(config: &DatabaseConfig) -> Result<DbPool> {
    use std::str::FromStr;

    use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

    let options = SqliteConnectOptions::from_str(&config.url)
        .map_err(|e| FeedhookError::Config(format!("invalid database url: {e}")))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    // Create parent directories if they don't exist
    if let Some(parent) = options.get_filename().parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }

    info!("Opening database at {:?}", options.get_filename());
    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections.max(1))
        .acquire_timeout(Duration::from_secs(ACQUIRE_TIMEOUT_SECS))
        .connect_with(options)
        .await?;
    Ok(pool)
}

#[cfg(feature = "postgres")]
async fn build_pool(config: &DatabaseConfig) -> Result<DbPool> {
    use sqlx::postgres::PgPoolOptions;

    info!("Connecting to PostgreSQL");
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections.max(1))
        .acquire_timeout(Duration::from_secs(ACQUIRE_TIMEOUT_SECS))
        .connect(&config.url)
        .await?;
    Ok(pool)
}
