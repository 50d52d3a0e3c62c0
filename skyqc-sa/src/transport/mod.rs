//! Remote session capability seam
//!
//! The analysis engine never touches a concrete file-transfer protocol; it
//! depends only on the [`RemoteSession`] capability set (list a directory,
//! open a file for reading, stat a path). SFTP/FTP drivers implement these
//! traits outside this crate and plug in through the [`TransportRegistry`];
//! the built-in [`local`] transport serves a local directory tree for demo
//! runs and tests.
//!
//! Dropping a session releases its underlying transport resources; there is
//! no separate close call.

pub mod local;

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::io::AsyncRead;

use crate::models::ConnectionType;

/// Transport-level errors, classified so callers can tell transient
/// conditions (timeout, connection closed) from the rest.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(String),
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        match self {
            TransportError::Timeout(_) => true,
            TransportError::Io(e) => e.kind() == std::io::ErrorKind::TimedOut,
            _ => false,
        }
    }
}

/// Entry kind in a remote directory listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Directory,
    File,
}

/// One entry of a remote directory listing.
#[derive(Debug, Clone, Serialize)]
pub struct RemoteEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

impl RemoteEntry {
    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }
}

/// Result of stating a remote path.
#[derive(Debug, Clone, Serialize)]
pub struct RemoteStat {
    pub size: u64,
    pub is_directory: bool,
}

/// Byte stream handed out by [`RemoteSession::open_read`].
pub type ByteStream = Pin<Box<dyn AsyncRead + Send>>;

/// Read-only capability set over one live remote connection.
///
/// A session is owned by exactly one holder at a time; the pool enforces
/// the checkout/checkin discipline. Implementations must honor the
/// configured per-call I/O timeout and surface it as
/// [`TransportError::Timeout`].
#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// List the entries of a remote directory (unordered).
    async fn list_directory(&self, path: &str) -> Result<Vec<RemoteEntry>, TransportError>;

    /// Open a remote file for reading from the start.
    async fn open_read(&self, path: &str) -> Result<ByteStream, TransportError>;

    /// Stat a remote path. Cheap; used as the pool health check.
    async fn stat(&self, path: &str) -> Result<RemoteStat, TransportError>;
}

/// Opens additional sessions for one host/credential pair.
///
/// The session pool uses this for lazy top-up; the factory keeps the
/// credentials internally and never exposes them.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open_session(&self) -> Result<Box<dyn RemoteSession>, TransportError>;
}

/// Parameters for establishing a new connection.
#[derive(Debug, Clone)]
pub struct ConnectParams {
    pub protocol: ConnectionType,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Root directory for the local transport; ignored by network drivers.
    pub root: Option<String>,
    /// Per-call I/O timeout every session opened on this connection must
    /// honor, surfaced as [`TransportError::Timeout`].
    pub io_timeout: Duration,
}

/// Builds a live session plus a matching factory from connect parameters.
#[async_trait]
pub trait TransportProvider: Send + Sync {
    async fn connect(
        &self,
        params: &ConnectParams,
    ) -> Result<(Arc<dyn RemoteSession>, Arc<dyn SessionFactory>), TransportError>;
}

/// Protocol tag → provider lookup.
///
/// Only the local transport is registered by default; SFTP/FTP/FTPS drivers
/// register themselves at startup when linked in.
pub struct TransportRegistry {
    providers: HashMap<ConnectionType, Arc<dyn TransportProvider>>,
}

impl TransportRegistry {
    pub fn with_builtin() -> Self {
        let mut registry = Self {
            providers: HashMap::new(),
        };
        registry.register(ConnectionType::Local, Arc::new(local::LocalProvider));
        registry
    }

    pub fn register(&mut self, protocol: ConnectionType, provider: Arc<dyn TransportProvider>) {
        self.providers.insert(protocol, provider);
    }

    pub async fn connect(
        &self,
        params: &ConnectParams,
    ) -> Result<(Arc<dyn RemoteSession>, Arc<dyn SessionFactory>), TransportError> {
        match self.providers.get(&params.protocol) {
            Some(provider) => provider.connect(params).await,
            None => Err(TransportError::Protocol(format!(
                "no transport driver registered for protocol: {}",
                params.protocol
            ))),
        }
    }
}
