//! Distributed sync lock token

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Name of the lock guarding remote sync cycles
pub const SYNC_LOCK_NAME: &str = "SFA_FTP_SYNC";

/// A held, named mutual-exclusion token
///
/// Returned by a successful try-acquire. The `owner` token is unique per
/// acquisition; only the holder of that token can release the lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncLock {
    /// Lock name shared by all instances (e.g. `SFA_FTP_SYNC`)
    pub name: String,
    /// Identity of this acquisition
    pub owner: String,
    /// When the lock was acquired
    pub acquired_at: DateTime<Utc>,
    /// After this instant other holders may take the lock over
    pub expires_at: DateTime<Utc>,
}

impl SyncLock {
    /// Returns true if the lock has passed its expiry at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
