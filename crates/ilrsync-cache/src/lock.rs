//! SQLite implementation of ILockRegistry
//!
//! Locks live in the `sync_lock` table of the shared database, so every
//! instance pointing at the same database file coordinates through it.
//!
//! ## Acquisition
//!
//! A single conditional upsert either inserts the row or takes over an
//! existing one whose `expires_at` has passed. Exactly one row is affected
//! when the lock was obtained. Every acquisition carries a fresh owner
//! token, so two cycles in the same process contend like two processes.
//!
//! ## Release
//!
//! Deletes the row only if it still carries our owner token. A lock that
//! already expired and was taken over is left alone.

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use ilrsync_core::domain::SyncLock;
use ilrsync_core::ports::ILockRegistry;

use crate::CacheError;

/// Named locks backed by the `sync_lock` table
pub struct SqliteLockRegistry {
    pool: SqlitePool,
    ttl: Duration,
}

impl SqliteLockRegistry {
    /// Creates a registry whose locks expire `ttl` after acquisition
    pub fn new(pool: SqlitePool, ttl: Duration) -> Self {
        Self { pool, ttl }
    }

    fn new_owner() -> String {
        format!("pid-{}-{}", std::process::id(), Uuid::new_v4())
    }

    /// Returns the current holder of `name`, if any row exists
    pub async fn holder(&self, name: &str) -> anyhow::Result<Option<SyncLock>> {
        let row: Option<(String, String, i64, i64)> = sqlx::query_as(
            "SELECT name, owner, acquired_at, expires_at FROM sync_lock WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        let lock = row
            .map(|(name, owner, acquired_at, expires_at)| {
                Ok::<_, CacheError>(SyncLock {
                    name,
                    owner,
                    acquired_at: from_millis(acquired_at)?,
                    expires_at: from_millis(expires_at)?,
                })
            })
            .transpose()?;
        Ok(lock)
    }
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>, CacheError> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| CacheError::InvalidValue(format!("Invalid timestamp: {}", ms)))
}

#[async_trait::async_trait]
impl ILockRegistry for SqliteLockRegistry {
    async fn try_acquire(&self, name: &str) -> anyhow::Result<Option<SyncLock>> {
        let now = Utc::now();
        let ttl = chrono::Duration::from_std(self.ttl)
            .map_err(|e| CacheError::InvalidValue(format!("Invalid lock TTL: {}", e)))?;
        let lock = SyncLock {
            name: name.to_string(),
            owner: Self::new_owner(),
            acquired_at: now,
            expires_at: now + ttl,
        };

        let result = sqlx::query(
            "INSERT INTO sync_lock (name, owner, acquired_at, expires_at) \
             VALUES (?, ?, ?, ?) \
             ON CONFLICT(name) DO UPDATE SET \
                owner = excluded.owner, \
                acquired_at = excluded.acquired_at, \
                expires_at = excluded.expires_at \
             WHERE sync_lock.expires_at <= ?",
        )
        .bind(&lock.name)
        .bind(&lock.owner)
        .bind(lock.acquired_at.timestamp_millis())
        .bind(lock.expires_at.timestamp_millis())
        .bind(now.timestamp_millis())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            tracing::debug!(lock = %name, owner = %lock.owner, "Lock acquired");
            Ok(Some(lock))
        } else {
            tracing::debug!(lock = %name, "Lock held by another owner");
            Ok(None)
        }
    }

    async fn release(&self, lock: &SyncLock) -> anyhow::Result<()> {
        let result = sqlx::query("DELETE FROM sync_lock WHERE name = ? AND owner = ?")
            .bind(&lock.name)
            .bind(&lock.owner)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            tracing::debug!(
                lock = %lock.name,
                owner = %lock.owner,
                "Lock already expired or released"
            );
        } else {
            tracing::debug!(lock = %lock.name, owner = %lock.owner, "Lock released");
        }
        Ok(())
    }
}
