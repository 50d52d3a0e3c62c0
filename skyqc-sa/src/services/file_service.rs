//! Remote file operations
//!
//! Directory listing with the browse-friendly sort order, plus the bounded
//! prefix reader used for header-only image fetches. The reader simply
//! stops issuing reads once the byte budget is reached; no transport-level
//! abort signalling is needed.

use tokio::io::AsyncReadExt;

use crate::transport::{RemoteEntry, RemoteSession, RemoteStat, TransportError};

/// List a remote directory, directories first, then case-insensitive by
/// name.
pub async fn list_directory(
    session: &dyn RemoteSession,
    path: &str,
) -> Result<Vec<RemoteEntry>, TransportError> {
    let path = if path.is_empty() { "/" } else { path };
    tracing::debug!("Listing directory: {}", path);
    let mut entries = session.list_directory(path).await?;
    entries.sort_by(|a, b| {
        b.is_directory()
            .cmp(&a.is_directory())
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
    Ok(entries)
}

/// Read at most `max_bytes` from the start of a remote file.
pub async fn read_prefix(
    session: &dyn RemoteSession,
    path: &str,
    max_bytes: usize,
) -> Result<Vec<u8>, TransportError> {
    let stream = session.open_read(path).await?;
    let mut buffer = Vec::with_capacity(max_bytes.min(64 * 1024));
    let mut bounded = stream.take(max_bytes as u64);
    bounded.read_to_end(&mut buffer).await?;
    tracing::trace!("Read {} bytes from {}", buffer.len(), path);
    Ok(buffer)
}

/// Stat a remote path.
pub async fn stat(session: &dyn RemoteSession, path: &str) -> Result<RemoteStat, TransportError> {
    session.stat(path).await
}

/// Join a folder path and entry name the way remote paths are displayed:
/// single separator, no doubled slashes.
pub fn join_path(base: &str, name: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::local::LocalSession;

    async fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::create_dir(dir.path().join("scan")).await.unwrap();
        tokio::fs::create_dir(dir.path().join("Orbit")).await.unwrap();
        tokio::fs::write(dir.path().join("zz.bin"), vec![7u8; 100]).await.unwrap();
        tokio::fs::write(dir.path().join("Alpha.txt"), b"abc").await.unwrap();
        dir
    }

    #[tokio::test]
    async fn test_listing_sorts_directories_first_case_insensitive() {
        let dir = fixture().await;
        let session = LocalSession::new(dir.path());
        let entries = list_directory(&session, "/").await.unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Orbit", "scan", "Alpha.txt", "zz.bin"]);
    }

    #[tokio::test]
    async fn test_read_prefix_is_bounded() {
        let dir = fixture().await;
        let session = LocalSession::new(dir.path());
        let bytes = read_prefix(&session, "/zz.bin", 16).await.unwrap();
        assert_eq!(bytes.len(), 16);
        assert!(bytes.iter().all(|&b| b == 7));
    }

    #[tokio::test]
    async fn test_read_prefix_short_file() {
        let dir = fixture().await;
        let session = LocalSession::new(dir.path());
        let bytes = read_prefix(&session, "/Alpha.txt", 4096).await.unwrap();
        assert_eq!(bytes, b"abc");
    }

    #[test]
    fn test_join_path_no_double_slash() {
        assert_eq!(join_path("/site/", "Orbit_1"), "/site/Orbit_1");
        assert_eq!(join_path("/site", "Orbit_1"), "/site/Orbit_1");
    }
}
