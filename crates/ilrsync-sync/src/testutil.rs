//! Fixtures and fake ports shared by unit tests

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use tokio::sync::Notify;
use zip::unstable::write::FileOptionsExt;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use ilrsync_cache::{DatabasePool, SqliteLockRegistry};
use ilrsync_core::domain::{
    Feature, FeatureState, ImportType, ImportTypeCode, PipelineError, RemoteEndpoint, SecretType,
    SyncLock,
};
use ilrsync_core::ports::{
    IFeatureStore, IFileImporter, ILockRegistry, IRemoteSession, IRemoteSessionFactory,
    ISecretStore,
};

// ============================================================================
// Zip fixtures
// ============================================================================

/// Writes a zip archive with the given entries, ZipCrypto-encrypted when a
/// password is supplied
pub(crate) fn write_zip(path: &Path, entries: &[(&str, &[u8])], password: Option<&str>) {
    let mut writer = ZipWriter::new(File::create(path).unwrap());
    let mut options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    if let Some(password) = password {
        options = options.with_deprecated_encryption(password.as_bytes());
    }
    for (name, data) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap();
}

/// Builds a zip archive in memory
pub(crate) fn zip_bytes(entries: &[(&str, &[u8])], password: Option<&str>) -> Vec<u8> {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("fixture.zip");
    write_zip(&path, entries, password);
    std::fs::read(path).unwrap()
}

// ============================================================================
// Importer
// ============================================================================

/// Importer that records calls and fails for one chosen file name
#[derive(Default)]
pub(crate) struct RecordingImporter {
    calls: Mutex<Vec<(String, ImportTypeCode)>>,
    fail_on: Option<String>,
}

impl RecordingImporter {
    pub(crate) fn failing_on(name: &str) -> Self {
        Self {
            fail_on: Some(name.to_string()),
            ..Default::default()
        }
    }

    pub(crate) fn calls(&self) -> Vec<(String, ImportTypeCode)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl IFileImporter for RecordingImporter {
    async fn import_file(
        &self,
        file_name: &str,
        import_type: &'static ImportType,
        content: Vec<u8>,
    ) -> Result<u64> {
        self.calls
            .lock()
            .unwrap()
            .push((file_name.to_string(), import_type.code));
        if self.fail_on.as_deref() == Some(file_name) {
            bail!("bad header in {}", file_name);
        }
        Ok(content.iter().filter(|b| **b == b'\n').count() as u64)
    }
}

// ============================================================================
// Remote host
// ============================================================================

#[derive(Default)]
struct RemoteState {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
    deleted: Mutex<Vec<String>>,
    fail_open: AtomicBool,
    fail_list: AtomicBool,
    fail_fetch: Mutex<Option<String>>,
    fetch_delay: Mutex<Option<Duration>>,
    fetch_started: Notify,
    opens: AtomicUsize,
    uncached_opens: AtomicUsize,
    fetches: AtomicUsize,
}

/// In-memory remote directory standing in for an SFTP host
#[derive(Default)]
pub(crate) struct FakeRemote {
    state: Arc<RemoteState>,
}

impl FakeRemote {
    pub(crate) fn put(&self, name: &str, data: Vec<u8>) {
        self.state.files.lock().unwrap().insert(name.to_string(), data);
    }

    pub(crate) fn fail_open(&self) {
        self.state.fail_open.store(true, Ordering::SeqCst);
    }

    pub(crate) fn fail_listing(&self) {
        self.state.fail_list.store(true, Ordering::SeqCst);
    }

    pub(crate) fn fail_fetch_of(&self, name: &str) {
        *self.state.fail_fetch.lock().unwrap() = Some(name.to_string());
    }

    pub(crate) fn set_fetch_delay(&self, delay: Duration) {
        *self.state.fetch_delay.lock().unwrap() = Some(delay);
    }

    pub(crate) async fn wait_for_fetch(&self) {
        self.state.fetch_started.notified().await;
    }

    pub(crate) fn opens(&self) -> usize {
        self.state.opens.load(Ordering::SeqCst)
    }

    pub(crate) fn uncached_opens(&self) -> usize {
        self.state.uncached_opens.load(Ordering::SeqCst)
    }

    pub(crate) fn fetches(&self) -> usize {
        self.state.fetches.load(Ordering::SeqCst)
    }

    pub(crate) fn deleted(&self) -> Vec<String> {
        self.state.deleted.lock().unwrap().clone()
    }
}

struct FakeSession {
    state: Arc<RemoteState>,
    open: AtomicBool,
}

fn base_name(remote_path: &str) -> String {
    remote_path.rsplit('/').next().unwrap_or(remote_path).to_string()
}

#[async_trait::async_trait]
impl IRemoteSession for FakeSession {
    async fn list(&self, remote_directory: &str) -> Result<Vec<String>> {
        if self.state.fail_list.load(Ordering::SeqCst) {
            return Err(PipelineError::Listing(format!("{}: no such directory", remote_directory)).into());
        }
        Ok(self.state.files.lock().unwrap().keys().cloned().collect())
    }

    async fn fetch(&self, remote_path: &str, local_path: &Path) -> Result<u64> {
        let name = base_name(remote_path);
        self.state.fetches.fetch_add(1, Ordering::SeqCst);
        self.state.fetch_started.notify_one();

        let delay = *self.state.fetch_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.state.fail_fetch.lock().unwrap().as_deref() == Some(name.as_str()) {
            bail!("connection reset by peer");
        }

        let data = self
            .state
            .files
            .lock()
            .unwrap()
            .get(&name)
            .cloned()
            .ok_or_else(|| anyhow!("no such file: {}", remote_path))?;
        std::fs::write(local_path, &data)?;
        Ok(data.len() as u64)
    }

    async fn delete(&self, remote_path: &str) -> Result<()> {
        self.state.files.lock().unwrap().remove(&base_name(remote_path));
        self.state.deleted.lock().unwrap().push(remote_path.to_string());
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.open.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IRemoteSessionFactory for FakeRemote {
    async fn open(&self, _endpoint: &RemoteEndpoint) -> Result<Arc<dyn IRemoteSession>> {
        self.state.opens.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_open.load(Ordering::SeqCst) {
            return Err(PipelineError::Connection("authentication failed".to_string()).into());
        }
        Ok(Arc::new(FakeSession {
            state: self.state.clone(),
            open: AtomicBool::new(true),
        }))
    }

    async fn open_uncached(&self, endpoint: &RemoteEndpoint) -> Result<Arc<dyn IRemoteSession>> {
        self.state.uncached_opens.fetch_add(1, Ordering::SeqCst);
        self.open(endpoint).await
    }

    async fn close_all(&self) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// Locks, features, secrets
// ============================================================================

/// SQLite lock registry on a fresh in-memory database
pub(crate) async fn sqlite_locks() -> Arc<dyn ILockRegistry> {
    let db = DatabasePool::in_memory().await.unwrap();
    Arc::new(SqliteLockRegistry::new(db.pool().clone(), Duration::from_secs(60)))
}

/// Lock registry wrapper counting acquisition attempts
pub(crate) struct CountingLocks {
    inner: Arc<dyn ILockRegistry>,
    attempts: AtomicUsize,
}

impl CountingLocks {
    pub(crate) fn new(inner: Arc<dyn ILockRegistry>) -> Self {
        Self {
            inner,
            attempts: AtomicUsize::new(0),
        }
    }

    pub(crate) fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ILockRegistry for CountingLocks {
    async fn try_acquire(&self, name: &str) -> Result<Option<SyncLock>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.inner.try_acquire(name).await
    }

    async fn release(&self, lock: &SyncLock) -> Result<()> {
        self.inner.release(lock).await
    }
}

/// Feature store whose sync flag is set directly by the test
pub(crate) struct FixedFeatures {
    sync_enabled: AtomicBool,
}

impl FixedFeatures {
    pub(crate) fn new(sync_enabled: bool) -> Self {
        Self {
            sync_enabled: AtomicBool::new(sync_enabled),
        }
    }

    pub(crate) fn set(&self, sync_enabled: bool) {
        self.sync_enabled.store(sync_enabled, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl IFeatureStore for FixedFeatures {
    async fn is_active(&self, feature: Feature) -> Result<bool> {
        Ok(feature == Feature::SfaFtpSync && self.sync_enabled.load(Ordering::SeqCst))
    }

    async fn set_active(&self, feature: Feature, active: bool) -> Result<()> {
        if feature == Feature::SfaFtpSync {
            self.set(active);
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<FeatureState>> {
        let mut states = Vec::new();
        for feature in Feature::ALL {
            states.push(FeatureState {
                feature,
                active: self.is_active(feature).await?,
                overridden: false,
            });
        }
        Ok(states)
    }

    async fn reset_defaults(&self) -> Result<()> {
        Ok(())
    }
}

/// Secret store holding the archive password in memory
#[derive(Default)]
pub(crate) struct MemorySecrets {
    password: Mutex<Option<String>>,
    reads: AtomicUsize,
}

impl MemorySecrets {
    pub(crate) fn set(&self, password: &str) {
        *self.password.lock().unwrap() = Some(password.to_string());
    }

    pub(crate) fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ISecretStore for MemorySecrets {
    async fn get_secret(&self, secret_type: SecretType) -> Result<Option<String>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        match secret_type {
            SecretType::ArchiveDecryptionPassword => Ok(self.password.lock().unwrap().clone()),
        }
    }

    async fn set_secret(&self, secret_type: SecretType, plaintext: &str) -> Result<()> {
        match secret_type {
            SecretType::ArchiveDecryptionPassword => self.set(plaintext),
        }
        Ok(())
    }
}
