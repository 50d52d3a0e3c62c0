//! Local-directory transport
//!
//! Serves a local directory tree through the [`RemoteSession`] capability
//! set, read-only. This is the Rust analogue of the original tool's
//! mounted-filesystem access path: the same analysis pipeline runs against
//! a mounted or local copy of a site without a network driver, and the test
//! suite uses it as its realistic transport.

use std::future::Future;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{
    ByteStream, ConnectParams, EntryKind, RemoteEntry, RemoteSession, RemoteStat, SessionFactory,
    TransportError, TransportProvider,
};

const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(30);

/// One "connection" to a local directory tree.
pub struct LocalSession {
    root: PathBuf,
    io_timeout: Duration,
}

impl LocalSession {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_io_timeout(root, DEFAULT_IO_TIMEOUT)
    }

    pub fn with_io_timeout(root: impl Into<PathBuf>, io_timeout: Duration) -> Self {
        Self {
            root: root.into(),
            io_timeout,
        }
    }

    /// Resolve a remote-style absolute path under the transport root.
    /// Parent-directory components are rejected so a session can never
    /// escape the tree it was opened on.
    fn resolve(&self, path: &str) -> Result<PathBuf, TransportError> {
        let relative = Path::new(path.trim_start_matches('/'));
        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => {
                    return Err(TransportError::Protocol(format!(
                        "path escapes transport root: {}",
                        path
                    )))
                }
            }
        }
        Ok(self.root.join(relative))
    }

    /// Bound one filesystem call by the session's I/O timeout.
    async fn bounded<T>(
        &self,
        what: &str,
        path: &str,
        work: impl Future<Output = Result<T, TransportError>>,
    ) -> Result<T, TransportError> {
        tokio::time::timeout(self.io_timeout, work)
            .await
            .map_err(|_| TransportError::Timeout(format!("{} {}", what, path)))?
    }
}

fn not_found(path: &str, e: &std::io::Error) -> TransportError {
    if e.kind() == std::io::ErrorKind::NotFound {
        TransportError::NotFound(path.to_string())
    } else {
        TransportError::Io(std::io::Error::new(e.kind(), e.to_string()))
    }
}

#[async_trait]
impl RemoteSession for LocalSession {
    async fn list_directory(&self, path: &str) -> Result<Vec<RemoteEntry>, TransportError> {
        let dir = self.resolve(path)?;
        self.bounded("list", path, async {
            let mut reader = tokio::fs::read_dir(&dir)
                .await
                .map_err(|e| not_found(path, &e))?;

            let mut entries = Vec::new();
            while let Some(entry) = reader.next_entry().await? {
                let metadata = match entry.metadata().await {
                    Ok(m) => m,
                    // Entry vanished between readdir and stat; skip it.
                    Err(_) => continue,
                };
                let modified = metadata
                    .modified()
                    .ok()
                    .map(|t| DateTime::<Utc>::from(t));
                entries.push(RemoteEntry {
                    name: entry.file_name().to_string_lossy().into_owned(),
                    kind: if metadata.is_dir() {
                        EntryKind::Directory
                    } else {
                        EntryKind::File
                    },
                    size: if metadata.is_dir() { 0 } else { metadata.len() },
                    modified,
                });
            }
            Ok(entries)
        })
        .await
    }

    async fn open_read(&self, path: &str) -> Result<ByteStream, TransportError> {
        let file_path = self.resolve(path)?;
        self.bounded("open", path, async {
            let file = tokio::fs::File::open(&file_path)
                .await
                .map_err(|e| not_found(path, &e))?;
            Ok(Box::pin(file) as ByteStream)
        })
        .await
    }

    async fn stat(&self, path: &str) -> Result<RemoteStat, TransportError> {
        let target = self.resolve(path)?;
        self.bounded("stat", path, async {
            let metadata = tokio::fs::metadata(&target)
                .await
                .map_err(|e| not_found(path, &e))?;
            Ok(RemoteStat {
                size: if metadata.is_dir() { 0 } else { metadata.len() },
                is_directory: metadata.is_dir(),
            })
        })
        .await
    }
}

/// Factory for additional sessions on the same tree.
pub struct LocalFactory {
    root: PathBuf,
    io_timeout: Duration,
}

impl LocalFactory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_io_timeout(root, DEFAULT_IO_TIMEOUT)
    }

    pub fn with_io_timeout(root: impl Into<PathBuf>, io_timeout: Duration) -> Self {
        Self {
            root: root.into(),
            io_timeout,
        }
    }
}

#[async_trait]
impl SessionFactory for LocalFactory {
    async fn open_session(&self) -> Result<Box<dyn RemoteSession>, TransportError> {
        Ok(Box::new(LocalSession::with_io_timeout(
            self.root.clone(),
            self.io_timeout,
        )))
    }
}

/// Provider registered under `ConnectionType::Local`. The tree root comes
/// from the `root` parameter, falling back to `host` so a bare connect
/// form still works.
pub struct LocalProvider;

#[async_trait]
impl TransportProvider for LocalProvider {
    async fn connect(
        &self,
        params: &ConnectParams,
    ) -> Result<(Arc<dyn RemoteSession>, Arc<dyn SessionFactory>), TransportError> {
        let root = params
            .root
            .clone()
            .unwrap_or_else(|| params.host.clone());
        if root.is_empty() {
            return Err(TransportError::Protocol(
                "local transport requires a root directory".to_string(),
            ));
        }
        let metadata = tokio::fs::metadata(&root)
            .await
            .map_err(|e| not_found(&root, &e))?;
        if !metadata.is_dir() {
            return Err(TransportError::Protocol(format!(
                "local transport root is not a directory: {}",
                root
            )));
        }
        let session: Arc<dyn RemoteSession> =
            Arc::new(LocalSession::with_io_timeout(&root, params.io_timeout));
        let factory: Arc<dyn SessionFactory> =
            Arc::new(LocalFactory::with_io_timeout(&root, params.io_timeout));
        Ok((session, factory))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    async fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::create_dir(dir.path().join("Orbit_1")).await.unwrap();
        tokio::fs::write(dir.path().join("readme.txt"), b"hello").await.unwrap();
        tokio::fs::write(dir.path().join("Orbit_1/IMG_0001.JPG"), b"jpegdata").await.unwrap();
        dir
    }

    #[tokio::test]
    async fn test_list_directory() {
        let dir = fixture().await;
        let session = LocalSession::new(dir.path());
        let entries = session.list_directory("/").await.unwrap();
        assert_eq!(entries.len(), 2);
        let orbit = entries.iter().find(|e| e.name == "Orbit_1").unwrap();
        assert!(orbit.is_directory());
        let readme = entries.iter().find(|e| e.name == "readme.txt").unwrap();
        assert!(readme.is_file());
        assert_eq!(readme.size, 5);
    }

    #[tokio::test]
    async fn test_open_read() {
        let dir = fixture().await;
        let session = LocalSession::new(dir.path());
        let mut stream = session.open_read("/Orbit_1/IMG_0001.JPG").await.unwrap();
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"jpegdata");
    }

    #[tokio::test]
    async fn test_stat() {
        let dir = fixture().await;
        let session = LocalSession::new(dir.path());
        let stat = session.stat("/Orbit_1").await.unwrap();
        assert!(stat.is_directory);
        let stat = session.stat("/readme.txt").await.unwrap();
        assert_eq!(stat.size, 5);
    }

    #[tokio::test]
    async fn test_missing_path_is_not_found() {
        let dir = fixture().await;
        let session = LocalSession::new(dir.path());
        let err = session.stat("/nope").await.unwrap_err();
        assert!(matches!(err, TransportError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_io_timeout_is_honored() {
        let dir = fixture().await;
        // A zero timeout elapses before the blocking stat can complete.
        let session = LocalSession::with_io_timeout(dir.path(), Duration::ZERO);
        let err = session.stat("/readme.txt").await.unwrap_err();
        assert!(err.is_timeout());

        let err = session.list_directory("/").await.unwrap_err();
        assert!(matches!(err, TransportError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_parent_components_rejected() {
        let dir = fixture().await;
        let session = LocalSession::new(dir.path());
        let err = session.list_directory("/../..").await.unwrap_err();
        assert!(matches!(err, TransportError::Protocol(_)));
    }
}
