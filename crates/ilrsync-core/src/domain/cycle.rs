//! Sync cycle records
//!
//! A [`SyncCycle`] summarizes one execution of the remote-pull operation.
//! It is ephemeral: the synchronizer keeps only the most recent one for
//! diagnostics and never persists it.
//!
//! ## Outcomes
//!
//! ```text
//! Idle ─→ CheckingFeature ─┬─→ SkippedDisabled
//!                          └─→ AcquiringLock ─┬─→ SkippedLockContention
//!                                             └─→ Transferring ─┬─→ Completed
//!                                                               └─→ FailedWithError
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// SyncPhase
// ============================================================================

/// Phases a sync cycle moves through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Idle,
    CheckingFeature,
    AcquiringLock,
    Transferring,
    Completed,
    SkippedDisabled,
    SkippedLockContention,
    FailedWithError,
}

impl SyncPhase {
    /// Returns true if the phase ends a cycle
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SyncPhase::Completed
                | SyncPhase::SkippedDisabled
                | SyncPhase::SkippedLockContention
                | SyncPhase::FailedWithError
        )
    }

    /// Returns true if moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: SyncPhase) -> bool {
        use SyncPhase::*;
        matches!(
            (self, next),
            (Idle, CheckingFeature)
                | (CheckingFeature, SkippedDisabled)
                | (CheckingFeature, AcquiringLock)
                | (AcquiringLock, SkippedLockContention)
                | (AcquiringLock, Transferring)
                | (Transferring, Completed)
                | (Transferring, FailedWithError)
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            SyncPhase::Idle => "Idle",
            SyncPhase::CheckingFeature => "CheckingFeature",
            SyncPhase::AcquiringLock => "AcquiringLock",
            SyncPhase::Transferring => "Transferring",
            SyncPhase::Completed => "Completed",
            SyncPhase::SkippedDisabled => "SkippedDisabled",
            SyncPhase::SkippedLockContention => "SkippedLockContention",
            SyncPhase::FailedWithError => "FailedWithError",
        }
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// CycleStats
// ============================================================================

/// Per-phase file counters for one cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleStats {
    /// Files fetched from the remote directory
    pub files_transferred: u32,
    /// Remote files skipped because they were already staged or accepted
    pub files_skipped_remote: u32,
    /// Archives that could not be extracted
    pub archives_failed: u32,
    /// Entries written out of archives
    pub files_extracted: u32,
    /// Files handed to the importer successfully
    pub files_ingested: u32,
    /// Files skipped as unrecognized or of the wrong format
    pub files_skipped: u32,
    /// Files whose import failed
    pub files_failed: u32,
    /// Local files left in the staging directory after the cycle
    pub local_files: u32,
}

// ============================================================================
// SyncCycle
// ============================================================================

/// Summary of one sync cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCycle {
    /// When the cycle started
    pub attempted_at: DateTime<Utc>,
    /// Terminal phase the cycle ended in
    pub outcome: SyncPhase,
    /// File counters
    pub stats: CycleStats,
    /// Error message for failed cycles
    pub error_message: Option<String>,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
}

impl SyncCycle {
    /// Creates a record for a cycle that ended in `outcome`
    pub fn new(attempted_at: DateTime<Utc>, outcome: SyncPhase) -> Self {
        Self {
            attempted_at,
            outcome,
            stats: CycleStats::default(),
            error_message: None,
            duration_ms: 0,
        }
    }

    /// Returns true only for `Completed` cycles
    pub fn succeeded(&self) -> bool {
        self.outcome == SyncPhase::Completed
    }

    /// Returns true when the cycle was skipped without attempting a transfer
    pub fn skipped(&self) -> bool {
        matches!(
            self.outcome,
            SyncPhase::SkippedDisabled | SyncPhase::SkippedLockContention
        )
    }

    /// Number of files transferred from the remote host
    pub fn files_transferred(&self) -> u32 {
        self.stats.files_transferred
    }
}
