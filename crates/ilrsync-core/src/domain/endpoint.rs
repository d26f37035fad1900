//! Remote endpoint descriptor
//!
//! A [`RemoteEndpoint`] describes where a sync cycle pulls files from and
//! where it stages them locally. It is built once per cycle from the
//! configuration, or from an ad-hoc test configuration supplied by an
//! operator, and never mutated afterwards.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// SSH port used when an operator does not supply one
pub const DEFAULT_SFTP_PORT: u16 = 22;

/// Connection timeout used for ad-hoc test endpoints
pub const DEFAULT_TEST_TIMEOUT_MS: u64 = 50_000;

/// Immutable description of a remote SFTP drop location
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteEndpoint {
    host: String,
    port: u16,
    username: String,
    password: String,
    remote_directory: String,
    local_directory: PathBuf,
    timeout: Duration,
}

impl RemoteEndpoint {
    /// Creates a new endpoint descriptor
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
        remote_directory: impl Into<String>,
        local_directory: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            password: password.into(),
            remote_directory: remote_directory.into(),
            local_directory: local_directory.into(),
            timeout,
        }
    }

    /// Creates an ad-hoc endpoint for an operator connectivity test
    ///
    /// Uses port 22 and a 50 second connection timeout. Nothing is staged
    /// for test endpoints, so the local directory is left empty.
    pub fn for_test(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        remote_directory: impl Into<String>,
    ) -> Self {
        Self::new(
            host,
            DEFAULT_SFTP_PORT,
            username,
            password,
            remote_directory,
            PathBuf::new(),
            Duration::from_millis(DEFAULT_TEST_TIMEOUT_MS),
        )
    }

    /// Returns a copy of this endpoint with a different port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn remote_directory(&self) -> &str {
        &self.remote_directory
    }

    pub fn local_directory(&self) -> &PathBuf {
        &self.local_directory
    }

    /// Bound on session establishment (TCP connect plus handshake)
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Key under which sessions to this endpoint are cached
    ///
    /// Two endpoints share a session only when host, port and user agree.
    pub fn session_key(&self) -> String {
        format!("{}@{}:{}", self.username, self.host, self.port)
    }

    /// Full remote path of a file in the remote directory
    pub fn remote_path(&self, file_name: &str) -> String {
        let dir = self.remote_directory.trim_end_matches('/');
        format!("{}/{}", dir, file_name)
    }
}

impl fmt::Debug for RemoteEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteEndpoint")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("remote_directory", &self.remote_directory)
            .field("local_directory", &self.local_directory)
            .field("timeout", &self.timeout)
            .finish()
    }
}
