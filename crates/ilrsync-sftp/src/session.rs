//! Cached SFTP sessions
//!
//! ## Lifecycle
//!
//! 1. [`SftpSessionFactory::open`] looks up the endpoint's cache key
//!    (`user@host:port` plus a fingerprint of the password). A cached
//!    session is reused only while it is open and answers a `realpath`
//!    round trip; otherwise it is evicted.
//! 2. A new session is established: DNS resolution, TCP connect bounded by
//!    the endpoint timeout, SSH handshake, password authentication, SFTP
//!    subsystem start. It is cached before returning.
//! 3. A transport failure during any operation drops the connection and
//!    marks the session closed, so the next `open` replaces it.
//! 4. [`SftpSession::close`] disconnects and marks the session closed.
//!
//! [`SftpSessionFactory::open_uncached`](IRemoteSessionFactory::open_uncached)
//! runs step 2 without touching the cache.

use std::fs::File;
use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use ssh2::{ErrorCode, Session, Sftp};
use tracing::{debug, info, warn};

use ilrsync_core::domain::{PipelineError, RemoteEndpoint};
use ilrsync_core::ports::{IRemoteSession, IRemoteSessionFactory};

use crate::SftpError;

// libssh2 SFTP status codes reporting a lost channel
const FX_NO_CONNECTION: i32 = 6;
const FX_CONNECTION_LOST: i32 = 7;

// ============================================================================
// Connection
// ============================================================================

/// An authenticated SSH session with its SFTP channel
struct Connection {
    session: Session,
    sftp: Sftp,
}

fn connect(endpoint: &RemoteEndpoint) -> Result<Connection, SftpError> {
    let target = format!("{}:{}", endpoint.host(), endpoint.port());
    let addr = target
        .to_socket_addrs()
        .map_err(|_| SftpError::Resolve(target.clone()))?
        .next()
        .ok_or_else(|| SftpError::Resolve(target.clone()))?;

    let timeout = endpoint.timeout();
    let tcp = TcpStream::connect_timeout(&addr, timeout).map_err(|e| SftpError::Connect {
        addr: target.clone(),
        message: e.to_string(),
    })?;
    tcp.set_nonblocking(false)?;

    let mut session = Session::new()?;
    session.set_tcp_stream(tcp);
    session.set_timeout(u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX));
    session
        .handshake()
        .map_err(|e| SftpError::Handshake(target.clone(), e.to_string()))?;

    session
        .userauth_password(endpoint.username(), endpoint.password())
        .map_err(|_| SftpError::Authentication(endpoint.session_key()))?;
    if !session.authenticated() {
        return Err(SftpError::Authentication(endpoint.session_key()));
    }

    let sftp = session.sftp()?;
    Ok(Connection { session, sftp })
}

fn connection_error(e: SftpError) -> anyhow::Error {
    PipelineError::Connection(e.to_string()).into()
}

async fn connect_blocking(endpoint: &RemoteEndpoint) -> Result<Connection> {
    let ep = endpoint.clone();
    tokio::task::spawn_blocking(move || connect(&ep))
        .await
        .map_err(|e| connection_error(SftpError::Task(e.to_string())))?
        .map_err(connection_error)
}

/// True when `e` means the SSH connection itself is no longer usable.
///
/// SFTP status codes (missing file, permission denied) leave the channel
/// intact, except the two that report a lost connection.
fn is_transport_error(e: &SftpError) -> bool {
    match e {
        SftpError::Closed => true,
        SftpError::Ssh(err) => match err.code() {
            ErrorCode::Session(_) => true,
            ErrorCode::SFTP(code) => matches!(code, FX_NO_CONNECTION | FX_CONNECTION_LOST),
        },
        SftpError::Io(err) => matches!(
            err.kind(),
            io::ErrorKind::TimedOut
                | io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::BrokenPipe
                | io::ErrorKind::UnexpectedEof
        ),
        _ => false,
    }
}

/// Cache key for an endpoint: the session key plus a password fingerprint
fn cache_key(endpoint: &RemoteEndpoint) -> String {
    let digest = Sha256::digest(endpoint.password().as_bytes());
    format!("{}#{}", endpoint.session_key(), &hex::encode(digest)[..16])
}

// ============================================================================
// SftpSession
// ============================================================================

/// One cached SFTP session
///
/// The underlying `ssh2` handles are used from one blocking task at a
/// time, serialized by a mutex.
pub struct SftpSession {
    key: String,
    conn: Arc<Mutex<Option<Connection>>>,
    open: Arc<AtomicBool>,
}

impl SftpSession {
    fn new(key: String, conn: Connection) -> Self {
        Self {
            key,
            conn: Arc::new(Mutex::new(Some(conn))),
            open: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Session key (`user@host:port`) this session was opened for
    pub fn key(&self) -> &str {
        &self.key
    }

    #[cfg(test)]
    fn detached(key: &str) -> Self {
        Self {
            key: key.to_string(),
            conn: Arc::new(Mutex::new(None)),
            open: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Runs `f` against the live connection on the blocking pool.
    ///
    /// A transport failure drops the connection and marks the session
    /// closed.
    async fn with_connection<T, F>(&self, f: F) -> Result<T, SftpError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, SftpError> + Send + 'static,
    {
        let conn = self.conn.clone();
        let open = self.open.clone();
        let key = self.key.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| SftpError::Task("session mutex poisoned".into()))?;
            let result = match guard.as_ref() {
                Some(connection) => f(connection),
                None => Err(SftpError::Closed),
            };
            if let Err(e) = &result {
                if is_transport_error(e) {
                    if open.swap(false, Ordering::AcqRel) {
                        warn!(session = %key, error = %e, "SFTP session broken, dropping it");
                    }
                    // Dropping the handles closes the socket
                    guard.take();
                }
            }
            result
        })
        .await
        .map_err(|e| SftpError::Task(e.to_string()))?
    }

    /// Round trip that fails when the server no longer answers
    async fn check_alive(&self) -> Result<(), SftpError> {
        self.with_connection(|c| c.sftp.realpath(Path::new(".")).map(|_| ()).map_err(Into::into))
            .await
    }
}

fn fetch_to(sftp: &Sftp, remote_path: &str, local_path: &Path) -> Result<u64, SftpError> {
    let mut remote = sftp.open(Path::new(remote_path))?;

    // Stream into a sibling temp file so a partial transfer never looks staged
    let partial = partial_path(local_path);
    let copied = (|| {
        let mut local = File::create(&partial)?;
        let n = io::copy(&mut remote, &mut local)?;
        local.sync_all()?;
        Ok::<_, io::Error>(n)
    })();

    match copied {
        Ok(n) => {
            std::fs::rename(&partial, local_path)?;
            Ok(n)
        }
        Err(e) => {
            let _ = std::fs::remove_file(&partial);
            Err(e.into())
        }
    }
}

fn partial_path(local_path: &Path) -> PathBuf {
    let mut name = local_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    local_path.with_file_name(name)
}

#[async_trait::async_trait]
impl IRemoteSession for SftpSession {
    #[tracing::instrument(skip(self), fields(session = %self.key))]
    async fn list(&self, remote_directory: &str) -> Result<Vec<String>> {
        let dir = remote_directory.to_string();
        let result = self
            .with_connection(move |c| {
                let entries = c.sftp.readdir(Path::new(&dir))?;
                Ok(entries
                    .into_iter()
                    .filter(|(_, stat)| stat.is_file())
                    .filter_map(|(path, _)| {
                        path.file_name()
                            .and_then(|n| n.to_str())
                            .filter(|n| *n != "." && *n != "..")
                            .map(str::to_string)
                    })
                    .collect::<Vec<_>>())
            })
            .await;

        match result {
            Ok(mut names) => {
                names.sort();
                debug!(count = names.len(), "Listed remote directory");
                Ok(names)
            }
            Err(e) if is_transport_error(&e) => Err(connection_error(e)),
            Err(e) => Err(PipelineError::Listing(format!("{}: {}", remote_directory, e)).into()),
        }
    }

    #[tracing::instrument(skip(self), fields(session = %self.key))]
    async fn fetch(&self, remote_path: &str, local_path: &Path) -> Result<u64> {
        let remote = remote_path.to_string();
        let local = local_path.to_path_buf();
        let bytes = self
            .with_connection(move |c| fetch_to(&c.sftp, &remote, &local))
            .await?;
        debug!(bytes, "Fetched remote file");
        Ok(bytes)
    }

    #[tracing::instrument(skip(self), fields(session = %self.key))]
    async fn delete(&self, remote_path: &str) -> Result<()> {
        let remote = remote_path.to_string();
        self.with_connection(move |c| Ok(c.sftp.unlink(Path::new(&remote))?))
            .await?;
        debug!("Deleted remote file");
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if !self.open.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        let conn = self.conn.clone();
        let key = self.key.clone();
        tokio::task::spawn_blocking(move || {
            let taken = conn.lock().ok().and_then(|mut guard| guard.take());
            if let Some(c) = taken {
                if let Err(e) = c.session.disconnect(None, "ilrsync closing session", None) {
                    warn!(session = %key, error = %e, "Disconnect failed");
                }
            }
        })
        .await
        .map_err(|e| SftpError::Task(e.to_string()))?;
        info!(session = %self.key, "SFTP session closed");
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

// ============================================================================
// SftpSessionFactory
// ============================================================================

/// Opens SFTP sessions and caches them per endpoint
#[derive(Default)]
pub struct SftpSessionFactory {
    sessions: DashMap<String, Arc<SftpSession>>,
}

impl SftpSessionFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached sessions
    pub fn cached(&self) -> usize {
        self.sessions.len()
    }

    /// Returns the cached session for `key` if it is still usable, evicting
    /// it otherwise
    async fn reusable(&self, key: &str) -> Option<Arc<SftpSession>> {
        let existing = self.sessions.get(key).map(|e| e.value().clone())?;
        if existing.is_open() {
            match existing.check_alive().await {
                Ok(()) => return Some(existing),
                Err(e) => debug!(error = %e, "Cached SFTP session failed liveness check"),
            }
        }
        // Only evict the entry we inspected, not a replacement raced in meanwhile
        self.sessions
            .remove_if(key, |_, cached| Arc::ptr_eq(cached, &existing));
        None
    }
}

#[async_trait::async_trait]
impl IRemoteSessionFactory for SftpSessionFactory {
    #[tracing::instrument(skip(self), fields(session = %endpoint.session_key()))]
    async fn open(&self, endpoint: &RemoteEndpoint) -> Result<Arc<dyn IRemoteSession>> {
        let key = cache_key(endpoint);
        if let Some(existing) = self.reusable(&key).await {
            debug!("Reusing cached SFTP session");
            return Ok(existing);
        }

        let conn = connect_blocking(endpoint).await?;
        let session = Arc::new(SftpSession::new(endpoint.session_key(), conn));
        self.sessions.insert(key, session.clone());
        info!("SFTP session established");
        Ok(session)
    }

    #[tracing::instrument(skip(self), fields(session = %endpoint.session_key()))]
    async fn open_uncached(&self, endpoint: &RemoteEndpoint) -> Result<Arc<dyn IRemoteSession>> {
        let conn = connect_blocking(endpoint).await?;
        debug!("Uncached SFTP session established");
        Ok(Arc::new(SftpSession::new(endpoint.session_key(), conn)))
    }

    async fn close_all(&self) -> Result<()> {
        let sessions: Vec<Arc<SftpSession>> =
            self.sessions.iter().map(|e| e.value().clone()).collect();
        self.sessions.clear();
        for session in sessions {
            session.close().await?;
        }
        Ok(())
    }
}
