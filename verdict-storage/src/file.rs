//! File-backed snapshot store.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tracing::{debug, warn};
use verdict_core::{Error, ErrorCode, Result};

use crate::snapshot::ChainSnapshot;
use crate::traits::SnapshotStore;

/// Stores the snapshot as a single JSON file.
///
/// Writes go to a temporary file in the same directory which is synced and
/// then renamed over the target, so readers only ever see a complete file.
/// All filesystem work runs on the blocking thread pool.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Create a store for the given file path. Nothing is touched until the
    /// first `load` or `persist`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn write_error(path: &Path, e: io::Error) -> Error {
    Error::Storage {
        code: ErrorCode::StorageWrite,
        message: format!("failed to write {}: {}", path.display(), e),
        source: Some(Box::new(e)),
    }
}

fn read_error(path: &Path, e: io::Error) -> Error {
    Error::Storage {
        code: ErrorCode::StorageRead,
        message: format!("failed to read {}: {}", path.display(), e),
        source: Some(Box::new(e)),
    }
}

/// Replace `path` with `bytes` atomically.
fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    write_atomic_with(path, bytes, sync_dir)
}

/// Flush a directory entry so a completed rename survives a crash.
fn sync_dir(dir: &Path) -> io::Result<()> {
    #[cfg(unix)]
    File::open(dir)?.sync_all()?;
    #[cfg(not(unix))]
    let _ = dir;
    Ok(())
}

/// Once the rename has happened the new snapshot is what readers see, so a
/// failed directory sync is reported but does not fail the write.
fn write_atomic_with(
    path: &Path,
    bytes: &[u8],
    sync_dir: impl FnOnce(&Path) -> io::Result<()>,
) -> io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)?;

    let mut tmp = NamedTempFile::new_in(&dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;

    if let Err(e) = sync_dir(&dir) {
        warn!(dir = %dir.display(), error = %e, "directory sync failed after snapshot rename");
    }

    Ok(())
}

fn read_optional(path: &Path) -> io::Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

#[async_trait]
impl SnapshotStore for FileStore {
    async fn load(&self) -> Result<Option<ChainSnapshot>> {
        let path = self.path.clone();
        let bytes = tokio::task::spawn_blocking(move || {
            read_optional(&path).map_err(|e| read_error(&path, e))
        })
        .await
        .map_err(|e| Error::internal(format!("snapshot load task failed: {}", e)))??;

        match bytes {
            Some(bytes) => {
                let snapshot = ChainSnapshot::from_bytes(&bytes)?;
                debug!(path = %self.path.display(), blocks = snapshot.len(), "loaded snapshot");
                Ok(Some(snapshot))
            }
            None => {
                debug!(path = %self.path.display(), "no snapshot on disk");
                Ok(None)
            }
        }
    }

    async fn persist(&self, snapshot: &ChainSnapshot) -> Result<()> {
        let bytes = snapshot.to_bytes()?;
        let size = bytes.len();
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || {
            write_atomic(&path, &bytes).map_err(|e| write_error(&path, e))
        })
        .await
        .map_err(|e| Error::internal(format!("snapshot persist task failed: {}", e)))??;

        debug!(path = %self.path.display(), bytes = size, blocks = snapshot.len(), "persisted snapshot");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}
