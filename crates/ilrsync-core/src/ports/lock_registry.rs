//! Distributed lock port (driven/secondary port)
//!
//! Implementations must be backed by a store shared by every process
//! instance; a purely in-memory registry does not provide cross-instance
//! exclusion.

use anyhow::Result;

use crate::domain::SyncLock;

/// Named, non-blocking mutual exclusion
#[async_trait::async_trait]
pub trait ILockRegistry: Send + Sync {
    /// Attempts to take the lock `name` without waiting
    ///
    /// # Returns
    ///
    /// `Some(lock)` when acquired, `None` when another holder owns an
    /// unexpired lock of that name.
    async fn try_acquire(&self, name: &str) -> Result<Option<SyncLock>>;

    /// Releases a lock previously returned by `try_acquire`
    ///
    /// Succeeds without effect when the lock has already expired, been
    /// taken over, or been released.
    async fn release(&self, lock: &SyncLock) -> Result<()>;
}
