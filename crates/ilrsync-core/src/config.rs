//! Configuration module for ilrsync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::lock::SYNC_LOCK_NAME;
use crate::domain::RemoteEndpoint;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for ilrsync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub remote: RemoteConfig,
    pub sync: SyncConfig,
    pub partner: PartnerConfig,
    pub features: FeaturesConfig,
    pub encryption: EncryptionConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

/// Remote SFTP drop location.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Directory listed on the remote host.
    pub remote_directory: String,
    /// Local staging directory files are transferred into.
    pub local_directory: PathBuf,
    /// Bound on session establishment, in milliseconds.
    pub timeout_ms: u64,
    /// Delete remote files once fetched.
    pub delete_remote_files: bool,
    /// Delete staged files once ingested.
    pub delete_local_files: bool,
}

/// Sync cycle scheduling and locking.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Seconds between scheduled sync cycles.
    pub poll_interval: u64,
    /// Upper bound on files transferred per cycle; unbounded when absent.
    pub max_files_per_cycle: Option<u32>,
    /// Name of the distributed lock guarding cycles.
    pub lock_name: String,
    /// Seconds after which an unreleased lock may be taken over.
    pub lock_ttl: u64,
}

/// Partner HTTP API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PartnerConfig {
    pub base_url: String,
    /// Path of the funding summary endpoint, appended to `base_url`.
    pub summary_path: String,
    pub timeout_secs: u64,
}

/// Default feature flag states, used until overridden in the feature store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeaturesConfig {
    pub sync_enabled: bool,
    pub partner_connection: bool,
}

/// Key material for secrets encrypted at rest.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EncryptionConfig {
    pub password: String,
    /// Hex-encoded salt.
    pub salt: String,
}

/// SQLite database location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Output format: `text` or `json`.
    pub format: String,
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("~/.local/share"))
        .join("ilrsync")
}

const REDACTED: &str = "********";

fn redact(secret: &str) -> &str {
    if secret.is_empty() {
        ""
    } else {
        REDACTED
    }
}

impl fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("remote_directory", &self.remote_directory)
            .field("local_directory", &self.local_directory)
            .field("timeout_ms", &self.timeout_ms)
            .field("delete_remote_files", &self.delete_remote_files)
            .field("delete_local_files", &self.delete_local_files)
            .finish()
    }
}

impl fmt::Debug for EncryptionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionConfig")
            .field("password", &redact(&self.password))
            .field("salt", &self.salt)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/ilrsync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("ilrsync")
            .join("config.yaml")
    }

    /// Builds the endpoint descriptor for one sync cycle.
    pub fn remote_endpoint(&self) -> RemoteEndpoint {
        RemoteEndpoint::new(
            self.remote.host.clone(),
            self.remote.port,
            self.remote.username.clone(),
            self.remote.password.clone(),
            self.remote.remote_directory.clone(),
            self.remote.local_directory.clone(),
            Duration::from_millis(self.remote.timeout_ms),
        )
    }

    /// Copy of the configuration with secrets masked, for display.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        config.remote.password = redact(&self.remote.password).to_string();
        config.encryption.password = redact(&self.encryption.password).to_string();
        config
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 22,
            username: String::new(),
            password: String::new(),
            remote_directory: "/".to_string(),
            local_directory: data_dir().join("staging"),
            timeout_ms: 50_000,
            delete_remote_files: false,
            delete_local_files: true,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: 300,
            max_files_per_cycle: None,
            lock_name: SYNC_LOCK_NAME.to_string(),
            lock_ttl: 3600,
        }
    }
}

impl Default for PartnerConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            summary_path: "/api/v1/skills/fundingSummary".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: data_dir().join("ilrsync.db"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.poll_interval"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid values for `logging.format`.
const VALID_LOG_FORMATS: &[&str] = &["text", "json"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let mut push = |field: &str, message: &str| {
            errors.push(ValidationError {
                field: field.into(),
                message: message.into(),
            })
        };

        // --- remote ---
        if self.remote.port == 0 {
            push("remote.port", "must be greater than 0");
        }
        if self.remote.timeout_ms == 0 {
            push("remote.timeout_ms", "must be greater than 0");
        }
        if self.features.sync_enabled {
            if self.remote.host.trim().is_empty() {
                push("remote.host", "must be set when sync is enabled");
            }
            if self.remote.username.trim().is_empty() {
                push("remote.username", "must be set when sync is enabled");
            }
        }

        // --- sync ---
        if self.sync.poll_interval == 0 {
            push("sync.poll_interval", "must be greater than 0");
        }
        if self.sync.lock_ttl == 0 {
            push("sync.lock_ttl", "must be greater than 0");
        }
        if self.sync.max_files_per_cycle == Some(0) {
            push("sync.max_files_per_cycle", "must be greater than 0 when set");
        }
        if self.sync.lock_name.trim().is_empty() {
            push("sync.lock_name", "must not be empty");
        }

        // --- partner ---
        if self.features.partner_connection
            && !(self.partner.base_url.starts_with("http://")
                || self.partner.base_url.starts_with("https://"))
        {
            push(
                "partner.base_url",
                "must start with http:// or https:// when the partner connection is enabled",
            );
        }

        // --- encryption ---
        if self.encryption.password.is_empty() {
            push("encryption.password", "must not be empty");
        }
        let salt = &self.encryption.salt;
        if salt.len() % 2 != 0 || !salt.chars().all(|c| c.is_ascii_hexdigit()) {
            push("encryption.salt", "must be an even-length hex string");
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            push(
                "logging.level",
                &format!(
                    "invalid level '{}'; expected one of: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            );
        }
        if !VALID_LOG_FORMATS.contains(&self.logging.format.as_str()) {
            push(
                "logging.format",
                &format!(
                    "invalid format '{}'; expected one of: {}",
                    self.logging.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            );
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use ilrsync_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .remote_host("sftp.example.org")
///     .remote_username("provider")
///     .sync_poll_interval(600)
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- remote ---

    pub fn remote_host(mut self, host: impl Into<String>) -> Self {
        self.config.remote.host = host.into();
        self
    }

    pub fn remote_port(mut self, port: u16) -> Self {
        self.config.remote.port = port;
        self
    }

    pub fn remote_username(mut self, username: impl Into<String>) -> Self {
        self.config.remote.username = username.into();
        self
    }

    pub fn remote_password(mut self, password: impl Into<String>) -> Self {
        self.config.remote.password = password.into();
        self
    }

    pub fn remote_directory(mut self, directory: impl Into<String>) -> Self {
        self.config.remote.remote_directory = directory.into();
        self
    }

    pub fn local_directory(mut self, directory: PathBuf) -> Self {
        self.config.remote.local_directory = directory;
        self
    }

    pub fn remote_timeout_ms(mut self, ms: u64) -> Self {
        self.config.remote.timeout_ms = ms;
        self
    }

    pub fn delete_remote_files(mut self, delete: bool) -> Self {
        self.config.remote.delete_remote_files = delete;
        self
    }

    pub fn delete_local_files(mut self, delete: bool) -> Self {
        self.config.remote.delete_local_files = delete;
        self
    }

    // --- sync ---

    pub fn sync_poll_interval(mut self, seconds: u64) -> Self {
        self.config.sync.poll_interval = seconds;
        self
    }

    pub fn sync_max_files_per_cycle(mut self, max: Option<u32>) -> Self {
        self.config.sync.max_files_per_cycle = max;
        self
    }

    pub fn sync_lock_name(mut self, name: impl Into<String>) -> Self {
        self.config.sync.lock_name = name.into();
        self
    }

    pub fn sync_lock_ttl(mut self, seconds: u64) -> Self {
        self.config.sync.lock_ttl = seconds;
        self
    }

    // --- partner ---

    pub fn partner_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.partner.base_url = url.into();
        self
    }

    pub fn partner_summary_path(mut self, path: impl Into<String>) -> Self {
        self.config.partner.summary_path = path.into();
        self
    }

    pub fn partner_timeout_secs(mut self, seconds: u64) -> Self {
        self.config.partner.timeout_secs = seconds;
        self
    }

    // --- features ---

    pub fn sync_enabled(mut self, enabled: bool) -> Self {
        self.config.features.sync_enabled = enabled;
        self
    }

    pub fn partner_connection(mut self, enabled: bool) -> Self {
        self.config.features.partner_connection = enabled;
        self
    }

    // --- encryption ---

    pub fn encryption_password(mut self, password: impl Into<String>) -> Self {
        self.config.encryption.password = password.into();
        self
    }

    pub fn encryption_salt(mut self, salt: impl Into<String>) -> Self {
        self.config.encryption.salt = salt.into();
        self
    }

    // --- database ---

    pub fn database_path(mut self, path: PathBuf) -> Self {
        self.config.database.path = path;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_format(mut self, format: impl Into<String>) -> Self {
        self.config.logging.format = format.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
