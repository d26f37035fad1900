//! CLI subcommands
//!
//! Every command receives a [`CliContext`] carrying the global flags and
//! opens only the adapters it needs. Commands return an error for anything
//! that should produce a non-zero exit status; `main` prints it.

pub mod config;
pub mod feature;
pub mod imports;
pub mod local;
pub mod push;
pub mod remote;
pub mod secret;
pub mod sync;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use ilrsync_cache::{
    DatabasePool, SqliteFeatureStore, SqliteImportRepository, SqliteLockRegistry,
    SqliteSecretStore, TextEncryptor,
};
use ilrsync_core::config::Config;
use ilrsync_core::ports::IRemoteSessionFactory;
use ilrsync_sync::{CsvFileImporter, Synchronizer, SynchronizerSettings};

use crate::output::{get_formatter, OutputFormat, OutputFormatter};

/// Global flags shared by every command
#[derive(Debug, Clone)]
pub struct CliContext {
    /// Configuration file in use
    pub config_path: PathBuf,
    /// True when the path came from `--config`
    explicit_config: bool,
    pub format: OutputFormat,
    pub quiet: bool,
}

impl CliContext {
    /// # Arguments
    /// * `config` - Value of `--config`, if given
    /// * `format` - Output format from `--json`
    /// * `quiet` - Value of `--quiet`
    pub fn new(config: Option<&str>, format: OutputFormat, quiet: bool) -> Self {
        let (config_path, explicit_config) = match config {
            Some(path) => (PathBuf::from(path), true),
            None => (Config::default_path(), false),
        };
        Self {
            config_path,
            explicit_config,
            format,
            quiet,
        }
    }

    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    pub fn formatter(&self) -> Box<dyn OutputFormatter> {
        get_formatter(self.is_json(), self.quiet)
    }

    /// Loads the configuration file
    ///
    /// A missing default file yields the built-in defaults; a missing file
    /// named with `--config` is an error.
    pub fn load_config(&self) -> Result<Config> {
        if self.config_path.exists() {
            Config::load(&self.config_path).with_context(|| {
                format!(
                    "Failed to load configuration from {}",
                    self.config_path.display()
                )
            })
        } else if self.explicit_config {
            bail!(
                "Configuration file not found: {}",
                self.config_path.display()
            )
        } else {
            Ok(Config::default())
        }
    }

    /// Loads the configuration and rejects it when validation fails
    pub fn load_valid_config(&self) -> Result<Config> {
        let config = self.load_config()?;
        let errors = config.validate();
        if !errors.is_empty() {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            bail!(
                "Invalid configuration in {}: {}. Run 'ilrsync config validate' for details.",
                self.config_path.display(),
                messages.join("; ")
            );
        }
        Ok(config)
    }
}

// ============================================================================
// Adapter wiring
// ============================================================================

/// Opens (and migrates) the configured database
pub async fn open_database(config: &Config) -> Result<DatabasePool> {
    DatabasePool::new(&config.database.path)
        .await
        .context("Failed to open database")
}

pub fn feature_store(pool: &DatabasePool, config: &Config) -> Arc<SqliteFeatureStore> {
    Arc::new(SqliteFeatureStore::new(
        pool.pool().clone(),
        config.features.clone(),
    ))
}

/// Builds the encrypted secret store from the `encryption` section
pub fn secret_store(pool: &DatabasePool, config: &Config) -> Result<Arc<SqliteSecretStore>> {
    let encryptor = TextEncryptor::new(&config.encryption.password, &config.encryption.salt)
        .context("Failed to derive the secret encryption key; check the encryption section")?;
    Ok(Arc::new(SqliteSecretStore::new(
        pool.pool().clone(),
        encryptor,
    )))
}

pub fn import_repository(pool: &DatabasePool) -> Arc<SqliteImportRepository> {
    Arc::new(SqliteImportRepository::new(pool.pool().clone()))
}

/// Builds a synchronizer over the SQLite stores, sharing the daemon's lock
pub fn build_synchronizer(
    config: &Config,
    pool: &DatabasePool,
    sessions: Arc<dyn IRemoteSessionFactory>,
) -> Result<Synchronizer> {
    let locks = Arc::new(SqliteLockRegistry::new(
        pool.pool().clone(),
        Duration::from_secs(config.sync.lock_ttl),
    ));
    let importer = Arc::new(CsvFileImporter::new(import_repository(pool)));

    Ok(Synchronizer::new(
        sessions,
        locks,
        feature_store(pool, config),
        secret_store(pool, config)?,
        importer,
        SynchronizerSettings::from_config(config),
    ))
}

#[cfg(test)]
pub(crate) mod testutil {
    use ilrsync_core::config::ConfigBuilder;
    use tempfile::TempDir;

    use super::*;

    /// Writes a valid configuration into `dir` and returns a context for it
    pub(crate) fn context_in(dir: &TempDir) -> CliContext {
        let config = ConfigBuilder::new()
            .remote_host("mock.sftp.local")
            .remote_username("provider")
            .remote_directory("/ILR")
            .local_directory(dir.path().join("staging"))
            .database_path(dir.path().join("ilrsync.db"))
            .encryption_password("cli-test")
            .encryption_salt("a1b2c3d4")
            .build();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, serde_yaml::to_string(&config).unwrap()).unwrap();

        CliContext::new(path.to_str(), OutputFormat::Human, true)
    }
}
