//! ilrsync SFTP - Remote drop location adapter
//!
//! Implements the `IRemoteSessionFactory` and `IRemoteSession` ports from
//! `ilrsync-core` over SSH/SFTP using `ssh2`.
//!
//! ## Key Components
//!
//! - [`SftpSessionFactory`] - Opens and caches one session per endpoint
//! - [`SftpSession`] - Listing, fetching and deleting remote files
//! - [`SftpError`] - Error types for SFTP operations
//!
//! `ssh2` is blocking; every network call runs on the blocking thread pool
//! via `tokio::task::spawn_blocking`.

pub mod session;

pub use session::{SftpSession, SftpSessionFactory};

/// Errors that can occur during SFTP operations
#[derive(Debug, thiserror::Error)]
pub enum SftpError {
    /// The host name could not be resolved
    #[error("Cannot resolve {0}")]
    Resolve(String),

    /// TCP connection failed or timed out
    #[error("Cannot connect to {addr}: {message}")]
    Connect { addr: String, message: String },

    /// SSH handshake failed
    #[error("SSH handshake with {0} failed: {1}")]
    Handshake(String, String),

    /// The server rejected the credentials
    #[error("Authentication failed for {0}")]
    Authentication(String),

    /// The session was closed
    #[error("Session is closed")]
    Closed,

    /// An SSH or SFTP protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] ssh2::Error),

    /// A local I/O error while staging a file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A blocking task panicked or was cancelled
    #[error("Background task failed: {0}")]
    Task(String),
}
