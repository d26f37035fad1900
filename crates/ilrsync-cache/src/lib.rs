//! ilrsync Cache - SQLite persistence
//!
//! SQLite-backed adapters for:
//! - The distributed sync lock shared by every instance
//! - Feature flag overrides
//! - Secrets encrypted at rest
//! - Data import records and funding summary rows
//!
//! ## Architecture
//!
//! This crate implements the `ILockRegistry`, `IFeatureStore`,
//! `ISecretStore` and `IImportRepository` ports from `ilrsync-core`. It is
//! a driven (secondary) adapter in the hexagonal architecture.
//!
//! ## Key Components
//!
//! - [`DatabasePool`] - Shared SQLite pool, schema applied on open
//! - [`SqliteLockRegistry`] - Non-blocking named locks with expiry
//! - [`SqliteFeatureStore`] - Feature flags over configured defaults
//! - [`TextEncryptor`] / [`SqliteSecretStore`] - Encrypted secrets
//! - [`SqliteImportRepository`] - Import records and funding rows
//! - [`CacheError`] - Adapter failures, wrapped in `anyhow` at the ports
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use std::time::Duration;
//! use ilrsync_cache::{DatabasePool, SqliteLockRegistry};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = DatabasePool::new(Path::new("/var/lib/ilrsync/ilrsync.db")).await?;
//! let locks = SqliteLockRegistry::new(pool.pool().clone(), Duration::from_secs(3600));
//! // Use locks as ILockRegistry...
//! # Ok(())
//! # }
//! ```

pub mod crypto;
pub mod features;
pub mod lock;
pub mod pool;
pub mod repository;
pub mod secrets;

pub use crypto::TextEncryptor;
pub use features::SqliteFeatureStore;
pub use lock::SqliteLockRegistry;
pub use pool::DatabasePool;
pub use repository::SqliteImportRepository;
pub use secrets::SqliteSecretStore;

/// Failures of the SQLite adapters
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The database file could not be opened or created
    #[error("Database unavailable: {0}")]
    ConnectionFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// A schema script failed to apply
    #[error("Schema migration failed: {0}")]
    MigrationFailed(String),

    /// A stored column does not map back to a domain value (bad timestamp,
    /// unknown import type code, out-of-range duration)
    #[error("Invalid stored value: {0}")]
    InvalidValue(String),

    /// Key derivation, encryption or decryption of a secret failed
    #[error("Secret encryption error: {0}")]
    Crypto(String),
}

impl From<sqlx::Error> for CacheError {
    fn from(e: sqlx::Error) -> Self {
        CacheError::QueryFailed(e.to_string())
    }
}
