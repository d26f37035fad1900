//! Remote session port (driven/secondary port)
//!
//! This module defines the interface to the remote file host. A factory
//! opens authenticated sessions per [`RemoteEndpoint`]; sessions list,
//! fetch and delete files in remote directories.
//!
//! ## Design Notes
//!
//! - Establishing a session is expensive (TCP connect, key exchange,
//!   authentication), so factories cache one session per endpoint and hand
//!   out shared `Arc` handles. Callers must not assume thread affinity.
//! - The cache is keyed by host, port, user and credential, so a changed
//!   password never reuses a session authenticated with the old one.
//! - A cached session that hits a transport failure stops reporting
//!   `is_open` and is replaced on the next `open`.
//! - One-off callers (operator listings) use `open_uncached` so that closing
//!   their session never disturbs one a sync cycle is using.
//! - Failures carry a [`PipelineError`](crate::domain::PipelineError)
//!   inside the `anyhow::Error`: `Connection` when the handshake or
//!   authentication fails, `Listing` when a directory cannot be read.
//! - `close` and `close_all` are idempotent.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use crate::domain::RemoteEndpoint;

/// An authenticated session to a remote file host
#[async_trait::async_trait]
pub trait IRemoteSession: Send + Sync {
    /// Lists the plain file names in a remote directory
    ///
    /// Directory entries and the `.`/`..` pseudo-entries are omitted.
    async fn list(&self, remote_directory: &str) -> Result<Vec<String>>;

    /// Streams a remote file into `local_path`, returning the bytes written
    async fn fetch(&self, remote_path: &str, local_path: &Path) -> Result<u64>;

    /// Deletes a remote file
    async fn delete(&self, remote_path: &str) -> Result<()>;

    /// Disconnects the session; further calls fail, repeated calls are no-ops
    async fn close(&self) -> Result<()>;

    /// Returns true while the session can be used
    fn is_open(&self) -> bool;
}

/// Opens and caches remote sessions
#[async_trait::async_trait]
pub trait IRemoteSessionFactory: Send + Sync {
    /// Returns a session for `endpoint`, reusing a cached open one
    ///
    /// Session establishment is bounded by `endpoint.timeout()`.
    async fn open(&self, endpoint: &RemoteEndpoint) -> Result<Arc<dyn IRemoteSession>>;

    /// Establishes a fresh session that is not cached; the caller closes it
    async fn open_uncached(&self, endpoint: &RemoteEndpoint) -> Result<Arc<dyn IRemoteSession>>;

    /// Closes every cached session
    async fn close_all(&self) -> Result<()>;
}
