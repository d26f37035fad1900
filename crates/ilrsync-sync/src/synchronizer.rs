//! Sync cycle state machine
//!
//! [`Synchronizer::run_cycle`] performs one remote pull. Timer ticks and
//! operator triggers both go through it, so a manual sync obeys the same
//! feature flag and lock as a scheduled one.
//!
//! ## Phases
//!
//! ```text
//! Idle → CheckingFeature ─┬→ SkippedDisabled
//!                         └→ AcquiringLock ─┬→ SkippedLockContention
//!                                           └→ Transferring ─┬→ Completed
//!                                                            └→ FailedWithError
//! ```
//!
//! ## Transfer
//!
//! 1. Open (or reuse) the endpoint's session and list the remote directory.
//! 2. Skip names already staged or accepted earlier in this process, then
//!    keep at most `max_files_per_cycle` of the rest.
//! 3. Fetch each file into staging, optionally deleting it remotely.
//! 4. Extract every transferred `.zip` and dispatch its entries. A failed
//!    archive is counted and logged; the cycle carries on.
//!
//! Connection, listing and fetch failures end the cycle in
//! `FailedWithError`. Files fetched before the failure are still processed.
//!
//! The lock is released before `run_cycle` returns. If the cycle future is
//! dropped mid-transfer, the release is spawned onto the runtime instead.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, error, info, trace, warn};

use ilrsync_core::config::Config;
use ilrsync_core::domain::{
    CycleStats, Feature, PipelineError, RemoteEndpoint, SecretType, StagedFile, SyncCycle,
    SyncLock, SyncPhase, SYNC_LOCK_NAME,
};
use ilrsync_core::ports::{
    IFeatureStore, IFileImporter, ILockRegistry, IRemoteSessionFactory, ISecretStore,
};

use crate::dispatcher::IngestionDispatcher;
use crate::extractor;
use crate::staging::StagingArea;

/// Hosts containing this marker get a canned listing from
/// [`list_remote_files`]
pub const MOCK_HOST_MARKER: &str = "mock";

const MOCK_LISTING: [&str; 3] = ["Mock File 1", "Mock File 2", "Mock File 3"];

// ============================================================================
// Settings
// ============================================================================

/// Tunables of the sync cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynchronizerSettings {
    /// Name of the distributed lock guarding the cycle
    pub lock_name: String,
    /// Upper bound on files fetched per cycle (`None` = unbounded)
    pub max_files_per_cycle: Option<u32>,
    /// Delete remote files once fetched
    pub delete_remote_files: bool,
    /// Delete staged files once ingested
    pub delete_local_files: bool,
}

impl Default for SynchronizerSettings {
    fn default() -> Self {
        Self {
            lock_name: SYNC_LOCK_NAME.to_string(),
            max_files_per_cycle: None,
            delete_remote_files: false,
            delete_local_files: true,
        }
    }
}

impl SynchronizerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            lock_name: config.sync.lock_name.clone(),
            max_files_per_cycle: config.sync.max_files_per_cycle,
            delete_remote_files: config.remote.delete_remote_files,
            delete_local_files: config.remote.delete_local_files,
        }
    }
}

// ============================================================================
// Lock guard
// ============================================================================

/// A held lock that is released on every exit path
struct LockGuard {
    locks: Arc<dyn ILockRegistry>,
    lock: Option<SyncLock>,
}

impl LockGuard {
    fn new(locks: Arc<dyn ILockRegistry>, lock: SyncLock) -> Self {
        Self {
            locks,
            lock: Some(lock),
        }
    }

    async fn release(mut self) {
        if let Some(lock) = self.lock.take() {
            release_logged(self.locks.as_ref(), &lock).await;
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let Some(lock) = self.lock.take() else {
            return;
        };
        let locks = self.locks.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { release_logged(locks.as_ref(), &lock).await });
            }
            Err(_) => {
                warn!(lock = %lock.name, "No runtime to release lock, leaving it to expire");
            }
        }
    }
}

async fn release_logged(locks: &dyn ILockRegistry, lock: &SyncLock) {
    match locks.release(lock).await {
        Ok(()) => debug!(lock = %lock.name, "Sync lock released"),
        Err(e) => warn!(lock = %lock.name, error = %e, "Failed to release sync lock"),
    }
}

// ============================================================================
// Synchronizer
// ============================================================================

/// Runs sync cycles against a remote endpoint
///
/// Holds the process-local diagnostics: the cumulative count of completed
/// cycles, the most recent cycle, and the names accepted so far.
pub struct Synchronizer {
    sessions: Arc<dyn IRemoteSessionFactory>,
    locks: Arc<dyn ILockRegistry>,
    features: Arc<dyn IFeatureStore>,
    secrets: Arc<dyn ISecretStore>,
    dispatcher: IngestionDispatcher,
    settings: SynchronizerSettings,
    sync_count: AtomicU64,
    last_cycle: Mutex<Option<SyncCycle>>,
    accepted: Mutex<HashSet<String>>,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn advance(phase: &mut SyncPhase, next: SyncPhase) {
    debug_assert!(phase.can_transition_to(next), "{} -> {}", phase, next);
    trace!(from = %phase, to = %next, "sync phase");
    *phase = next;
}

impl Synchronizer {
    /// Creates a synchronizer
    ///
    /// # Arguments
    /// * `sessions` - Remote session factory
    /// * `locks` - Shared lock registry
    /// * `features` - Feature flag store, read once per cycle
    /// * `secrets` - Secret store holding the archive password
    /// * `importer` - Downstream import operation
    /// * `settings` - Cycle tunables
    pub fn new(
        sessions: Arc<dyn IRemoteSessionFactory>,
        locks: Arc<dyn ILockRegistry>,
        features: Arc<dyn IFeatureStore>,
        secrets: Arc<dyn ISecretStore>,
        importer: Arc<dyn IFileImporter>,
        settings: SynchronizerSettings,
    ) -> Self {
        let dispatcher = IngestionDispatcher::new(importer, settings.delete_local_files);
        Self {
            sessions,
            locks,
            features,
            secrets,
            dispatcher,
            settings,
            sync_count: AtomicU64::new(0),
            last_cycle: Mutex::new(None),
            accepted: Mutex::new(HashSet::new()),
        }
    }

    pub fn settings(&self) -> &SynchronizerSettings {
        &self.settings
    }

    /// Number of cycles that completed since this instance was created
    pub fn sync_count(&self) -> u64 {
        self.sync_count.load(Ordering::Acquire)
    }

    /// The most recent cycle, if any ran
    pub fn last_cycle(&self) -> Option<SyncCycle> {
        locked(&self.last_cycle).clone()
    }

    /// Runs one sync cycle and returns its summary
    ///
    /// Never fails: every outcome, including errors, is described by the
    /// returned [`SyncCycle`].
    #[tracing::instrument(skip(self, endpoint), fields(endpoint = %endpoint.session_key()))]
    pub async fn run_cycle(&self, endpoint: &RemoteEndpoint) -> SyncCycle {
        let started = Instant::now();
        let mut cycle = SyncCycle::new(Utc::now(), SyncPhase::Idle);
        let mut phase = SyncPhase::Idle;

        advance(&mut phase, SyncPhase::CheckingFeature);
        let enabled = match self.features.is_active(Feature::SfaFtpSync).await {
            Ok(active) => active,
            Err(e) => {
                warn!(error = %e, "Cannot read sync feature flag, treating it as off");
                cycle.error_message = Some(format!("{:#}", e));
                false
            }
        };
        if !enabled {
            advance(&mut phase, SyncPhase::SkippedDisabled);
            info!(feature = %Feature::SfaFtpSync, "Sync disabled, skipping cycle");
            return self.finish(cycle, phase, started);
        }

        advance(&mut phase, SyncPhase::AcquiringLock);
        let lock = match self.locks.try_acquire(&self.settings.lock_name).await {
            Ok(Some(lock)) => lock,
            Ok(None) => {
                advance(&mut phase, SyncPhase::SkippedLockContention);
                info!("{}, skipping cycle", PipelineError::LockContention(self.settings.lock_name.clone()));
                return self.finish(cycle, phase, started);
            }
            Err(e) => {
                advance(&mut phase, SyncPhase::SkippedLockContention);
                error!(lock = %self.settings.lock_name, error = %e, "Cannot acquire sync lock");
                cycle.error_message = Some(format!("{:#}", e));
                return self.finish(cycle, phase, started);
            }
        };

        advance(&mut phase, SyncPhase::Transferring);
        let guard = LockGuard::new(self.locks.clone(), lock);
        let result = self.transfer_and_ingest(endpoint, &mut cycle.stats).await;
        guard.release().await;

        match result {
            Ok(()) => {
                advance(&mut phase, SyncPhase::Completed);
                let total = self.sync_count.fetch_add(1, Ordering::AcqRel) + 1;
                info!(
                    transferred = cycle.stats.files_transferred,
                    ingested = cycle.stats.files_ingested,
                    local_files = cycle.stats.local_files,
                    sync_count = total,
                    "Sync cycle completed"
                );
            }
            Err(e) => {
                advance(&mut phase, SyncPhase::FailedWithError);
                let message = format!("{:#}", e);
                error!(error = %message, "Sync cycle failed");
                cycle.error_message = Some(message);
            }
        }
        self.finish(cycle, phase, started)
    }

    fn finish(&self, mut cycle: SyncCycle, outcome: SyncPhase, started: Instant) -> SyncCycle {
        cycle.outcome = outcome;
        cycle.duration_ms = started.elapsed().as_millis() as u64;
        *locked(&self.last_cycle) = Some(cycle.clone());
        cycle
    }

    fn is_accepted(&self, name: &str) -> bool {
        locked(&self.accepted).contains(name)
    }

    fn accept(&self, name: &str) {
        locked(&self.accepted).insert(name.to_string());
    }

    async fn transfer_and_ingest(
        &self,
        endpoint: &RemoteEndpoint,
        stats: &mut CycleStats,
    ) -> Result<()> {
        let staging = StagingArea::new(endpoint.local_directory());
        staging
            .ensure()
            .await
            .with_context(|| format!("Cannot create staging directory {}", staging.root().display()))?;

        let session = self.sessions.open(endpoint).await?;
        let listed = session.list(endpoint.remote_directory()).await?;

        let mut candidates = Vec::new();
        for name in listed {
            if self.is_accepted(&name) || staging.contains(&name).await {
                trace!(file = %name, "already staged or accepted");
                stats.files_skipped_remote += 1;
                continue;
            }
            candidates.push(name);
        }
        if let Some(max) = self.settings.max_files_per_cycle {
            if candidates.len() > max as usize {
                debug!(available = candidates.len(), max, "limiting files fetched this cycle");
                candidates.truncate(max as usize);
            }
        }

        let mut transferred = Vec::new();
        let mut transfer_error = None;
        for name in candidates {
            let local = match staging.path_for(&name) {
                Ok(path) => path,
                Err(e) => {
                    warn!(file = %name, error = %e, "Skipping remote file with unusable name");
                    stats.files_skipped_remote += 1;
                    continue;
                }
            };
            let remote_path = endpoint.remote_path(&name);
            match session.fetch(&remote_path, &local).await {
                Ok(bytes) => {
                    info!(file = %name, bytes, "File transferred");
                    self.accept(&name);
                    stats.files_transferred += 1;
                    if self.settings.delete_remote_files {
                        if let Err(e) = session.delete(&remote_path).await {
                            warn!(file = %name, error = %e, "Failed to delete remote file");
                        }
                    }
                    transferred.push(StagedFile::new(name, local, bytes));
                }
                Err(e) => {
                    transfer_error = Some(e.context(format!("Failed to transfer {}", name)));
                    break;
                }
            }
        }

        self.process_transferred(&staging, &transferred, stats).await;

        stats.local_files = match staging.list().await {
            Ok(files) => files.len() as u32,
            Err(e) => {
                warn!(error = %e, "Cannot list staging directory");
                0
            }
        };

        match transfer_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn process_transferred(
        &self,
        staging: &StagingArea,
        transferred: &[StagedFile],
        stats: &mut CycleStats,
    ) {
        for file in transferred {
            if !file.is_archive() {
                if self.settings.delete_local_files {
                    info!(file = %file.name, "Transferred file is not an archive, discarding it");
                    staging.discard(&file.name).await;
                } else {
                    info!(file = %file.name, "Transferred file is not an archive, leaving it staged");
                }
                continue;
            }

            let password = self.archive_password().await;
            match extractor::extract(&file.path, password.as_deref(), staging.root()).await {
                Ok(names) => {
                    stats.files_extracted += names.len() as u32;
                    let report = self.dispatcher.dispatch(staging, &names).await;
                    stats.files_ingested += report.ingested();
                    stats.files_skipped += report.skipped();
                    stats.files_failed += report.failed();
                    if self.settings.delete_local_files {
                        staging.discard(&file.name).await;
                    }
                }
                Err(e) => {
                    stats.archives_failed += 1;
                    let e = PipelineError::Extraction(e.to_string());
                    error!(archive = %file.name, error = %e, "Archive skipped");
                }
            }
        }
    }

    /// Reads the archive password; read per archive so rotation applies
    async fn archive_password(&self) -> Option<String> {
        match self
            .secrets
            .get_secret(SecretType::ArchiveDecryptionPassword)
            .await
        {
            Ok(password) => password,
            Err(e) => {
                warn!(error = %e, "Cannot read archive password");
                None
            }
        }
    }

    /// Lists the files in an endpoint's remote directory
    ///
    /// See [`list_remote_files`]. Not gated by the feature flag or the lock.
    pub async fn list_remote_files(&self, endpoint: &RemoteEndpoint) -> Result<Vec<String>> {
        list_remote_files(self.sessions.as_ref(), endpoint).await
    }
}

/// Lists the files in an endpoint's remote directory
///
/// Used by operators to test an endpoint. Hosts containing `mock` return a
/// canned listing without any network access. A dedicated uncached session
/// is opened and closed afterwards, leaving any session a cycle holds alone.
///
/// # Errors
///
/// Fails with [`PipelineError::Connection`] or [`PipelineError::Listing`]
/// (inside the `anyhow` chain) when the endpoint cannot be listed.
#[tracing::instrument(skip(sessions, endpoint), fields(endpoint = %endpoint.session_key()))]
pub async fn list_remote_files(
    sessions: &dyn IRemoteSessionFactory,
    endpoint: &RemoteEndpoint,
) -> Result<Vec<String>> {
    if endpoint.host().contains(MOCK_HOST_MARKER) {
        debug!("mock host, returning canned listing");
        return Ok(MOCK_LISTING.iter().map(|s| s.to_string()).collect());
    }

    let session = sessions.open_uncached(endpoint).await?;
    let listed = session.list(endpoint.remote_directory()).await;
    if let Err(e) = session.close().await {
        debug!(error = %e, "closing test session failed");
    }
    listed
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tempfile::TempDir;

    use ilrsync_core::config::ConfigBuilder;
    use ilrsync_core::domain::ImportTypeCode;

    use super::*;
    use crate::testutil::{
        sqlite_locks, zip_bytes, CountingLocks, FakeRemote, FixedFeatures, MemorySecrets,
        RecordingImporter,
    };

    const LOCK: &str = "TEST_SYNC_LOCK";

    struct Harness {
        sync: Arc<Synchronizer>,
        remote: Arc<FakeRemote>,
        locks: Arc<CountingLocks>,
        features: Arc<FixedFeatures>,
        secrets: Arc<MemorySecrets>,
        importer: Arc<RecordingImporter>,
        staging: TempDir,
    }

    impl Harness {
        async fn new(settings: SynchronizerSettings) -> Self {
            let remote = Arc::new(FakeRemote::default());
            let locks = Arc::new(CountingLocks::new(sqlite_locks().await));
            let features = Arc::new(FixedFeatures::new(true));
            let secrets = Arc::new(MemorySecrets::default());
            let importer = Arc::new(RecordingImporter::default());
            let sync = Arc::new(Synchronizer::new(
                remote.clone(),
                locks.clone(),
                features.clone(),
                secrets.clone(),
                importer.clone(),
                settings,
            ));
            Self {
                sync,
                remote,
                locks,
                features,
                secrets,
                importer,
                staging: TempDir::new().unwrap(),
            }
        }

        async fn default() -> Self {
            Self::new(SynchronizerSettings {
                lock_name: LOCK.to_string(),
                ..Default::default()
            })
            .await
        }

        fn endpoint(&self) -> RemoteEndpoint {
            RemoteEndpoint::new(
                "sftp.example.org",
                22,
                "ilr",
                "pw",
                "/outbound",
                self.staging.path(),
                Duration::from_secs(1),
            )
        }

        fn staged(&self, name: &str) -> bool {
            self.staging.path().join(name).exists()
        }
    }

    fn ilr_archive() -> Vec<u8> {
        zip_bytes(
            &[
                ("Funding Summary Report Sept.csv", b"UKPRN\n1\n"),
                ("notes.txt", b"hello"),
            ],
            None,
        )
    }

    #[tokio::test]
    async fn test_disabled_skips_without_lock_or_network() {
        let h = Harness::default().await;
        h.features.set(false);
        h.remote.put("ILR.zip", ilr_archive());

        let cycle = h.sync.run_cycle(&h.endpoint()).await;

        assert_eq!(cycle.outcome, SyncPhase::SkippedDisabled);
        assert_eq!(h.locks.attempts(), 0);
        assert_eq!(h.remote.opens(), 0);
        assert_eq!(h.sync.sync_count(), 0);
        assert_eq!(h.sync.last_cycle(), Some(cycle));
    }

    #[tokio::test]
    async fn test_lock_contention_skips() {
        let h = Harness::default().await;
        let held = h.locks.try_acquire(LOCK).await.unwrap().unwrap();

        let cycle = h.sync.run_cycle(&h.endpoint()).await;

        assert_eq!(cycle.outcome, SyncPhase::SkippedLockContention);
        assert!(cycle.error_message.is_none());
        assert_eq!(h.remote.opens(), 0);
        assert_eq!(h.sync.sync_count(), 0);
        h.locks.release(&held).await.unwrap();
    }

    #[tokio::test]
    async fn test_completed_cycle_extracts_and_ingests() {
        let h = Harness::default().await;
        h.remote.put("ILR-2019-R03.zip", ilr_archive());
        h.remote.put("readme.pdf", b"%PDF".to_vec());

        let cycle = h.sync.run_cycle(&h.endpoint()).await;

        assert_eq!(cycle.outcome, SyncPhase::Completed, "{:?}", cycle.error_message);
        assert_eq!(cycle.stats.files_transferred, 2);
        assert_eq!(cycle.stats.files_extracted, 2);
        assert_eq!(cycle.stats.files_ingested, 1);
        assert_eq!(cycle.stats.files_skipped, 1);
        assert_eq!(cycle.stats.archives_failed, 0);
        assert_eq!(
            h.importer.calls(),
            vec![(
                "Funding Summary Report Sept.csv".to_string(),
                ImportTypeCode::FundingSummary
            )]
        );
        // Processed transfers and the ingested file are gone; the skipped
        // extracted entry stays staged
        assert!(!h.staged("ILR-2019-R03.zip"));
        assert!(!h.staged("Funding Summary Report Sept.csv"));
        assert!(!h.staged("readme.pdf"));
        assert!(h.staged("notes.txt"));
        assert_eq!(cycle.stats.local_files, 1);

        assert_eq!(h.sync.sync_count(), 1);
        assert_eq!(h.sync.last_cycle(), Some(cycle));
        assert!(h.locks.try_acquire(LOCK).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_accepted_files_are_not_fetched_again() {
        let h = Harness::default().await;
        h.remote.put("ILR-2019-R03.zip", ilr_archive());

        let first = h.sync.run_cycle(&h.endpoint()).await;
        let second = h.sync.run_cycle(&h.endpoint()).await;

        assert_eq!(first.stats.files_transferred, 1);
        assert_eq!(second.outcome, SyncPhase::Completed);
        assert_eq!(second.stats.files_transferred, 0);
        assert_eq!(second.stats.files_skipped_remote, 1);
        assert_eq!(h.importer.calls().len(), 1);
        assert_eq!(h.sync.sync_count(), 2);
    }

    #[tokio::test]
    async fn test_files_already_staged_are_skipped() {
        let h = Harness::default().await;
        h.remote.put("SILR Learner.csv", b"a\n".to_vec());
        std::fs::write(h.staging.path().join("SILR Learner.csv"), b"old").unwrap();

        let cycle = h.sync.run_cycle(&h.endpoint()).await;

        assert_eq!(cycle.stats.files_transferred, 0);
        assert_eq!(cycle.stats.files_skipped_remote, 1);
        assert_eq!(std::fs::read(h.staging.path().join("SILR Learner.csv")).unwrap(), b"old");
    }

    #[tokio::test]
    async fn test_listing_failure_releases_lock() {
        let h = Harness::default().await;
        h.remote.fail_listing();

        let cycle = h.sync.run_cycle(&h.endpoint()).await;

        assert_eq!(cycle.outcome, SyncPhase::FailedWithError);
        let message = cycle.error_message.unwrap();
        assert!(message.starts_with("Listing error"), "{message}");
        assert_eq!(h.sync.sync_count(), 0);
        assert!(h.locks.try_acquire(LOCK).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_connection_failure_is_reported() {
        let h = Harness::default().await;
        h.remote.fail_open();

        let cycle = h.sync.run_cycle(&h.endpoint()).await;

        assert_eq!(cycle.outcome, SyncPhase::FailedWithError);
        assert!(cycle.error_message.unwrap().starts_with("Connection error"));
        assert_eq!(h.sync.sync_count(), 0);
        assert!(h.locks.try_acquire(LOCK).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_fetch_failure_still_processes_earlier_files() {
        let h = Harness::default().await;
        h.remote.put("A.zip", ilr_archive());
        h.remote.put("B.zip", ilr_archive());
        h.remote.fail_fetch_of("B.zip");

        let cycle = h.sync.run_cycle(&h.endpoint()).await;

        assert_eq!(cycle.outcome, SyncPhase::FailedWithError);
        assert!(cycle.error_message.unwrap().contains("Failed to transfer B.zip"));
        assert_eq!(cycle.stats.files_transferred, 1);
        assert_eq!(cycle.stats.files_ingested, 1);
        assert_eq!(h.sync.sync_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_cycles_one_transfers() {
        let h = Harness::default().await;
        h.remote.put("ILR.zip", ilr_archive());
        h.remote.set_fetch_delay(Duration::from_millis(200));
        let endpoint = h.endpoint();

        let (a, b) = tokio::join!(h.sync.run_cycle(&endpoint), h.sync.run_cycle(&endpoint));

        let mut outcomes = vec![a.outcome, b.outcome];
        outcomes.sort_by_key(|p| p.name());
        assert_eq!(
            outcomes,
            vec![SyncPhase::Completed, SyncPhase::SkippedLockContention]
        );
        assert_eq!(h.remote.fetches(), 1);
        assert_eq!(h.sync.sync_count(), 1);
    }

    #[tokio::test]
    async fn test_max_files_per_cycle() {
        let h = Harness::new(SynchronizerSettings {
            lock_name: LOCK.to_string(),
            max_files_per_cycle: Some(2),
            ..Default::default()
        })
        .await;
        for name in ["a.csv", "b.csv", "c.csv"] {
            h.remote.put(name, b"x".to_vec());
        }

        let first = h.sync.run_cycle(&h.endpoint()).await;
        let second = h.sync.run_cycle(&h.endpoint()).await;

        assert_eq!(first.stats.files_transferred, 2);
        assert_eq!(second.stats.files_transferred, 1);
        assert_eq!(second.stats.files_skipped_remote, 2);
    }

    #[tokio::test]
    async fn test_encrypted_archive_uses_current_password() {
        let h = Harness::default().await;
        h.remote.put(
            "secure.zip",
            zip_bytes(&[("SILR Learner.csv", b"a\n1\n")], Some("rotated")),
        );
        h.remote.put(
            "old.zip",
            zip_bytes(&[("GLA OCC 2019 03.csv", b"a\n1\n")], Some("previous")),
        );
        h.secrets.set("rotated");

        let cycle = h.sync.run_cycle(&h.endpoint()).await;

        assert_eq!(cycle.outcome, SyncPhase::Completed);
        assert_eq!(cycle.stats.archives_failed, 1);
        assert_eq!(cycle.stats.files_ingested, 1);
        assert_eq!(h.secrets.reads(), 2);
        // A failed archive stays staged
        assert!(h.staged("old.zip"));
    }

    #[tokio::test]
    async fn test_delete_remote_files() {
        let h = Harness::new(SynchronizerSettings {
            lock_name: LOCK.to_string(),
            delete_remote_files: true,
            delete_local_files: false,
            ..Default::default()
        })
        .await;
        h.remote.put("ILR.zip", ilr_archive());

        let cycle = h.sync.run_cycle(&h.endpoint()).await;

        assert_eq!(cycle.outcome, SyncPhase::Completed);
        assert_eq!(h.remote.deleted(), vec!["/outbound/ILR.zip".to_string()]);
        assert!(h.staged("ILR.zip"));
        assert!(h.staged("Funding Summary Report Sept.csv"));
    }

    #[tokio::test]
    async fn test_non_archive_transfer_follows_local_delete_policy() {
        let keep = Harness::new(SynchronizerSettings {
            lock_name: LOCK.to_string(),
            delete_local_files: false,
            ..Default::default()
        })
        .await;
        keep.remote.put("readme.pdf", b"%PDF".to_vec());
        let cycle = keep.sync.run_cycle(&keep.endpoint()).await;
        assert_eq!(cycle.outcome, SyncPhase::Completed);
        assert!(keep.staged("readme.pdf"));

        let discard = Harness::default().await;
        discard.remote.put("readme.pdf", b"%PDF".to_vec());
        let cycle = discard.sync.run_cycle(&discard.endpoint()).await;
        assert_eq!(cycle.outcome, SyncPhase::Completed);
        assert_eq!(cycle.stats.files_transferred, 1);
        assert!(!discard.staged("readme.pdf"));
        assert!(discard.importer.calls().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_cycle_releases_lock() {
        let h = Harness::default().await;
        h.remote.put("ILR.zip", ilr_archive());
        h.remote.set_fetch_delay(Duration::from_secs(30));

        let sync = h.sync.clone();
        let endpoint = h.endpoint();
        let task = tokio::spawn(async move { sync.run_cycle(&endpoint).await });
        h.remote.wait_for_fetch().await;
        task.abort();
        let _ = task.await;

        let mut reacquired = None;
        for _ in 0..50 {
            reacquired = h.locks.try_acquire(LOCK).await.unwrap();
            if reacquired.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(reacquired.is_some(), "lock must be released after cancellation");
    }

    #[tokio::test]
    async fn test_list_remote_files_mock_host() {
        let h = Harness::default().await;
        let endpoint = RemoteEndpoint::for_test("mock.sftp.local", "u", "p", "/");

        let files = h.sync.list_remote_files(&endpoint).await.unwrap();

        assert_eq!(files, vec!["Mock File 1", "Mock File 2", "Mock File 3"]);
        assert_eq!(h.remote.opens(), 0);
    }

    #[tokio::test]
    async fn test_list_remote_files_without_synchronizer() {
        let remote = FakeRemote::default();
        remote.put("ILR Returns.zip", vec![]);
        let endpoint = RemoteEndpoint::for_test("sftp.example.org", "u", "p", "/in");

        let files = list_remote_files(&remote, &endpoint).await.unwrap();

        assert_eq!(files, vec!["ILR Returns.zip"]);
        assert_eq!(remote.opens(), 1);
        assert_eq!(remote.uncached_opens(), 1);
    }

    #[tokio::test]
    async fn test_list_remote_files_leaves_cycle_session_open() {
        let remote = FakeRemote::default();
        remote.put("ILR Returns.zip", vec![]);
        let endpoint = RemoteEndpoint::for_test("sftp.example.org", "u", "p", "/in");
        let cycle_session = remote.open(&endpoint).await.unwrap();

        list_remote_files(&remote, &endpoint).await.unwrap();

        assert!(cycle_session.is_open());
        assert_eq!(remote.uncached_opens(), 1);
        assert_eq!(remote.opens(), 2);
    }

    #[tokio::test]
    async fn test_list_remote_files_ignores_feature_flag() {
        let h = Harness::default().await;
        h.features.set(false);
        h.remote.put("b.csv", vec![]);
        h.remote.put("a.csv", vec![]);

        let files = h.sync.list_remote_files(&h.endpoint()).await.unwrap();

        assert_eq!(files, vec!["a.csv", "b.csv"]);
        assert_eq!(h.locks.attempts(), 0);
    }

    #[test]
    fn test_settings_from_config() {
        let config = ConfigBuilder::new()
            .sync_max_files_per_cycle(Some(5))
            .sync_lock_name("OTHER")
            .delete_remote_files(true)
            .delete_local_files(false)
            .build();
        let settings = SynchronizerSettings::from_config(&config);
        assert_eq!(
            settings,
            SynchronizerSettings {
                lock_name: "OTHER".to_string(),
                max_files_per_cycle: Some(5),
                delete_remote_files: true,
                delete_local_files: false,
            }
        );
    }

    #[test]
    fn test_synchronizer_is_shareable() {
        fn is_send_sync<T: Send + Sync>() {}
        is_send_sync::<Synchronizer>();
    }
}
