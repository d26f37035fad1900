//! ilrsync Daemon - Background sync service
//!
//! This binary runs as a system service and handles:
//! - Periodic sync cycles against the remote SFTP drop location
//! - Immediate cycles on SIGUSR1
//! - Graceful shutdown on SIGTERM/SIGINT
//!
//! # Architecture
//!
//! The daemon wires the SQLite stores and the SFTP adapter into a
//! `Synchronizer`, then enters a loop driven by the `SyncScheduler`. The loop
//! is controlled by a `CancellationToken` that is triggered on receipt of
//! SIGTERM or SIGINT. A cycle already in flight is allowed to finish.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use ilrsync_cache::{
    DatabasePool, SqliteFeatureStore, SqliteImportRepository, SqliteLockRegistry,
    SqliteSecretStore, TextEncryptor,
};
use ilrsync_core::config::{Config, LoggingConfig};
use ilrsync_core::domain::SyncPhase;
use ilrsync_core::ports::IRemoteSessionFactory;
use ilrsync_sftp::SftpSessionFactory;
use ilrsync_sync::{CsvFileImporter, SyncScheduler, SyncTrigger, Synchronizer, SynchronizerSettings};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Environment variable overriding the configuration file location
const CONFIG_ENV: &str = "ILRSYNC_CONFIG";

// ============================================================================
// DaemonService
// ============================================================================

/// Main daemon service that owns the adapters and runs the sync loop
struct DaemonService {
    /// Validated application configuration
    config: Config,
    /// SQLite pool shared by every store
    db_pool: DatabasePool,
    /// SFTP sessions, closed on shutdown
    sessions: Arc<SftpSessionFactory>,
    synchronizer: Synchronizer,
    /// Token for signalling graceful shutdown to all async tasks
    shutdown: CancellationToken,
}

impl DaemonService {
    /// Creates a new DaemonService
    ///
    /// Validates the configuration, opens the database and builds the
    /// synchronizer over the SQLite stores and the SFTP adapter.
    ///
    /// # Errors
    ///
    /// Fails when the configuration is invalid, the database cannot be
    /// opened, or the encryption key cannot be derived.
    async fn new(config: Config, shutdown: CancellationToken) -> Result<Self> {
        let errors = config.validate();
        if !errors.is_empty() {
            for e in &errors {
                error!(field = %e.field, "Invalid configuration: {}", e.message);
            }
            bail!("Invalid configuration: {} error(s)", errors.len());
        }

        let db_pool = DatabasePool::new(&config.database.path)
            .await
            .context("Failed to open database")?;
        let pool = db_pool.pool().clone();

        let encryptor = TextEncryptor::new(&config.encryption.password, &config.encryption.salt)
            .context("Failed to derive the secret encryption key")?;

        let sessions = Arc::new(SftpSessionFactory::new());
        let locks = Arc::new(SqliteLockRegistry::new(
            pool.clone(),
            Duration::from_secs(config.sync.lock_ttl),
        ));
        let features = Arc::new(SqliteFeatureStore::new(pool.clone(), config.features.clone()));
        let secrets = Arc::new(SqliteSecretStore::new(pool.clone(), encryptor));
        let importer = Arc::new(CsvFileImporter::new(Arc::new(SqliteImportRepository::new(
            pool,
        ))));

        let synchronizer = Synchronizer::new(
            sessions.clone(),
            locks,
            features,
            secrets,
            importer,
            SynchronizerSettings::from_config(&config),
        );

        Ok(Self {
            config,
            db_pool,
            sessions,
            synchronizer,
            shutdown,
        })
    }

    /// Runs the daemon's main loop until shutdown, then releases resources
    async fn run(&self) -> Result<()> {
        let (mut scheduler, trigger) =
            SyncScheduler::new(Duration::from_secs(self.config.sync.poll_interval));
        spawn_sync_request_listener(trigger, self.shutdown.clone());

        self.sync_loop(&mut scheduler).await;

        if let Err(e) = self.sessions.close_all().await {
            warn!(error = %e, "Failed to close SFTP sessions");
        }
        self.db_pool.close().await;
        Ok(())
    }

    // ========================================================================
    // Periodic sync loop
    // ========================================================================

    /// Runs one cycle per scheduler trigger until shutdown
    ///
    /// Outcomes are logged here; the synchronizer never returns an error, so
    /// a failed cycle does not stop the loop.
    async fn sync_loop(&self, scheduler: &mut SyncScheduler) {
        info!(
            poll_interval_secs = scheduler.poll_interval().as_secs(),
            host = %self.config.remote.host,
            remote_directory = %self.config.remote.remote_directory,
            "Starting sync loop"
        );

        let endpoint = self.config.remote_endpoint();

        while let Some(reason) = scheduler.next(&self.shutdown).await {
            debug!(?reason, "Sync triggered");

            let cycle = self.synchronizer.run_cycle(&endpoint).await;
            let stats = &cycle.stats;

            match cycle.outcome {
                SyncPhase::Completed => info!(
                    transferred = stats.files_transferred,
                    extracted = stats.files_extracted,
                    ingested = stats.files_ingested,
                    skipped = stats.files_skipped,
                    failed = stats.files_failed,
                    duration_ms = cycle.duration_ms,
                    sync_count = self.synchronizer.sync_count(),
                    "Sync cycle completed"
                ),
                SyncPhase::FailedWithError => error!(
                    error = cycle.error_message.as_deref().unwrap_or_default(),
                    transferred = stats.files_transferred,
                    duration_ms = cycle.duration_ms,
                    "Sync cycle failed"
                ),
                outcome => debug!(outcome = outcome.name(), "Sync cycle skipped"),
            }

            match serde_json::to_string(&cycle) {
                Ok(json) => debug!(cycle = %json, "Cycle summary"),
                Err(e) => warn!(error = %e, "Failed to serialize cycle summary"),
            }
        }

        info!("Sync loop terminated");
    }
}

// ============================================================================
// Signal handling
// ============================================================================

/// Waits for SIGTERM or SIGINT and triggers the cancellation token
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

/// Requests an immediate sync cycle on every SIGUSR1
#[cfg(unix)]
fn spawn_sync_request_listener(trigger: SyncTrigger, shutdown: CancellationToken) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut usr1 = match signal(SignalKind::user_defined1()) {
        Ok(usr1) => usr1,
        Err(e) => {
            warn!(error = %e, "Failed to install SIGUSR1 handler, manual sync disabled");
            return;
        }
    };

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                received = usr1.recv() => match received {
                    Some(()) => trigger.request_sync(),
                    None => break,
                },
            }
        }
    });
}

#[cfg(not(unix))]
fn spawn_sync_request_listener(_trigger: SyncTrigger, _shutdown: CancellationToken) {}

// ============================================================================
// Startup
// ============================================================================

/// Picks the configuration file: `$ILRSYNC_CONFIG` when set, else the
/// platform default
fn config_path(env_override: Option<OsString>) -> PathBuf {
    env_override
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_path)
}

/// Loads the configuration file, or defaults when it does not exist
fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        Config::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))
    } else {
        Ok(Config::default())
    }
}

/// Installs the global subscriber; `RUST_LOG` wins over `logging.level`
fn init_tracing(logging: &LoggingConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true);

    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let path = config_path(std::env::var_os(CONFIG_ENV));
    let config = load_config(&path)?;

    init_tracing(&config.logging);

    info!(config_path = %path.display(), "ilrsync daemon starting (ilrsyncd)");

    let shutdown_token = CancellationToken::new();

    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    let service = DaemonService::new(config, shutdown_token.clone()).await?;

    let result = service.run().await;

    match &result {
        Ok(()) => info!("ilrsync daemon shut down gracefully"),
        Err(e) => error!(error = %e, "ilrsync daemon exiting with error"),
    }

    result
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use ilrsync_core::config::ConfigBuilder;
    use tempfile::TempDir;

    use super::*;

    fn test_config(dir: &TempDir) -> Config {
        ConfigBuilder::new()
            .remote_host("sftp.example.org")
            .remote_username("provider")
            .local_directory(dir.path().join("staging"))
            .database_path(dir.path().join("db").join("ilrsync.db"))
            .encryption_password("daemon-test")
            .encryption_salt("00112233")
            .build()
    }

    #[test]
    fn test_cancellation_token_child_propagation() {
        let parent = CancellationToken::new();
        let child1 = parent.child_token();
        let child2 = parent.child_token();

        assert!(!child1.is_cancelled());
        assert!(!child2.is_cancelled());

        parent.cancel();

        assert!(child1.is_cancelled());
        assert!(child2.is_cancelled());
    }

    #[test]
    fn test_config_path_prefers_env_override() {
        let path = config_path(Some(OsString::from("/etc/ilrsync/config.yaml")));
        assert_eq!(path, PathBuf::from("/etc/ilrsync/config.yaml"));

        assert_eq!(config_path(None), Config::default_path());
        assert_eq!(config_path(Some(OsString::new())), Config::default_path());
    }

    #[test]
    fn test_load_config_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = load_config(&dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config.sync.poll_interval, 300);
    }

    #[test]
    fn test_load_config_malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "sync: [not, a, map").unwrap();

        let err = load_config(&path).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to load configuration"));
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir);
        config.encryption.password.clear();

        let result = DaemonService::new(config, CancellationToken::new()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_service_runs_disabled_cycle() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let endpoint = config.remote_endpoint();

        let service = DaemonService::new(config, CancellationToken::new())
            .await
            .unwrap();
        assert!(dir.path().join("db").join("ilrsync.db").exists());

        let cycle = service.synchronizer.run_cycle(&endpoint).await;
        assert_eq!(cycle.outcome, SyncPhase::SkippedDisabled);
        assert_eq!(service.synchronizer.sync_count(), 0);
    }

    #[tokio::test]
    async fn test_run_returns_after_shutdown() {
        let dir = TempDir::new().unwrap();
        let token = CancellationToken::new();
        let service = DaemonService::new(test_config(&dir), token.clone())
            .await
            .unwrap();

        token.cancel();
        tokio::time::timeout(Duration::from_secs(5), service.run())
            .await
            .expect("daemon should stop once cancelled")
            .unwrap();
        assert!(service.synchronizer.last_cycle().is_none());
    }
}
