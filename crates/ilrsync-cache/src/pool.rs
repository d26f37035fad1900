//! SQLite pool shared by the lock registry and the stores
//!
//! Every ilrsync instance that should coordinate through the sync lock must
//! open the same database file. File-backed pools run in WAL mode with a
//! busy timeout so that a peer instance taking the lock or writing an import
//! record makes us wait briefly instead of failing outright.

use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use crate::CacheError;

/// Upper bound on waiting for a write held by another connection or instance
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Connections for a file-backed pool
const FILE_POOL_SIZE: u32 = 5;

/// Schema scripts in the order they are applied. Each script is idempotent.
const MIGRATIONS: &[(&str, &str)] = &[(
    "20260101_initial",
    include_str!("migrations/20260101_initial.sql"),
)];

/// Owns the SQLite connections used by every ilrsync adapter
pub struct DatabasePool {
    pool: SqlitePool,
}

impl DatabasePool {
    /// Opens (creating if needed) the database at `db_path` and brings its
    /// schema up to date.
    ///
    /// # Errors
    ///
    /// `CacheError::ConnectionFailed` when the parent directory cannot be
    /// created or the file cannot be opened, `CacheError::MigrationFailed`
    /// when a schema script fails.
    pub async fn new(db_path: &Path) -> Result<Self, CacheError> {
        ensure_parent_dir(db_path)?;

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(FILE_POOL_SIZE)
            .connect_with(options)
            .await
            .map_err(|e| {
                CacheError::ConnectionFailed(format!("{}: {}", db_path.display(), e))
            })?;

        apply_migrations(&pool).await?;
        info!(path = %db_path.display(), "Opened ilrsync database");

        Ok(Self { pool })
    }

    /// Opens a private in-memory database with the full schema.
    ///
    /// An in-memory SQLite database lives and dies with its connection, so
    /// the pool is pinned to a single one.
    pub async fn in_memory() -> Result<Self, CacheError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| CacheError::ConnectionFailed(format!("in-memory database: {}", e)))?;

        apply_migrations(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Waits for checked-out connections to return, then closes them all
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn ensure_parent_dir(db_path: &Path) -> Result<(), CacheError> {
    match db_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            std::fs::create_dir_all(parent).map_err(|e| {
                CacheError::ConnectionFailed(format!(
                    "cannot create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })
        }
        _ => Ok(()),
    }
}

async fn apply_migrations(pool: &SqlitePool) -> Result<(), CacheError> {
    for &(name, script) in MIGRATIONS {
        sqlx::raw_sql(script)
            .execute(pool)
            .await
            .map_err(|e| CacheError::MigrationFailed(format!("{}: {}", name, e)))?;
        debug!(migration = name, "Applied schema migration");
    }
    Ok(())
}
