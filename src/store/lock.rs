//! Advisory record locks built on exclusive file creation.
//!
//! # Protocol
//! - A lock on `<record>` is the file `<record>.lock`, created with `create_new`
//!   (fail-if-exists). Whoever creates it holds the lock.
//! - Acquisition never blocks. `None` means somebody else holds it; skip the record
//!   and look again on a later tick.
//! - Releasing removes the marker. Removing an absent marker is not an error.
//! - Every mutation of an existing record takes a `&RecordLock` argument, so the
//!   store API cannot be used to modify a record without holding its lock.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::Utc;
use tokio::io::AsyncWriteExt;

use crate::store::error::{StoreError, StoreResult};

pub const LOCK_SUFFIX: &str = ".lock";

/// Marker path protecting `record`.
pub fn lock_path(record: &Path) -> PathBuf {
    let mut name = record
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(LOCK_SUFFIX);
    record.with_file_name(name)
}

/// A held lock on one record.
///
/// Prefer [`RecordLock::release`]; dropping a held lock removes the marker synchronously
/// as a fallback so an early return cannot leave the record locked forever.
#[derive(Debug)]
pub struct RecordLock {
    record: PathBuf,
    marker: PathBuf,
    held: bool,
}

impl RecordLock {
    /// Try to take the lock on `record`. Returns `Ok(None)` under contention.
    pub async fn try_acquire(record: &Path) -> StoreResult<Option<Self>> {
        let marker = lock_path(record);
        let opened = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&marker)
            .await;

        let mut file = match opened {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(None),
            Err(e) => return Err(StoreError::io(&marker, e)),
        };

        let lock = Self {
            record: record.to_path_buf(),
            marker,
            held: true,
        };

        // Owner stamp is diagnostic only; the lock is already ours.
        let stamp = format!("pid={} acquired_at={}\n", std::process::id(), Utc::now().to_rfc3339());
        if let Err(e) = file.write_all(stamp.as_bytes()).await {
            tracing::debug!(marker = %lock.marker.display(), error = %e, "Failed to stamp lock marker");
        }

        Ok(Some(lock))
    }

    /// The record this lock protects.
    pub fn record(&self) -> &Path {
        &self.record
    }

    /// True if this lock currently protects `record`.
    pub fn guards(&self, record: &Path) -> bool {
        self.held && self.record == record
    }

    /// Release the lock.
    pub async fn release(mut self) -> StoreResult<()> {
        self.held = false;
        release_marker(&self.marker).await
    }
}

impl Drop for RecordLock {
    fn drop(&mut self) {
        if self.held {
            if let Err(e) = std::fs::remove_file(&self.marker) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(marker = %self.marker.display(), error = %e, "Failed to remove lock marker on drop");
                }
            }
        }
    }
}

/// Remove a lock marker by path. Idempotent.
pub async fn release_marker(marker: &Path) -> StoreResult<()> {
    match tokio::fs::remove_file(marker).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StoreError::io(marker, e)),
    }
}

/// Age of a file based on its modification time, `None` if it does not exist.
pub async fn file_age(path: &Path) -> StoreResult<Option<Duration>> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => {
            let modified = meta.modified().map_err(|e| StoreError::io(path, e))?;
            Ok(Some(
                SystemTime::now()
                    .duration_since(modified)
                    .unwrap_or_default(),
            ))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::io(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_lock_path() {
        assert_eq!(
            lock_path(Path::new("/s/requests/a.json")),
            PathBuf::from("/s/requests/a.json.lock")
        );
    }

    #[tokio::test]
    async fn test_second_acquire_fails_until_release() {
        let dir = tempfile::tempdir().unwrap();
        let record = dir.path().join("a.json");

        let first = RecordLock::try_acquire(&record).await.unwrap().expect("first acquire");
        assert!(first.guards(&record));
        assert!(RecordLock::try_acquire(&record).await.unwrap().is_none());

        first.release().await.unwrap();
        assert!(!lock_path(&record).exists());
        assert!(RecordLock::try_acquire(&record).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_concurrent_acquire_has_one_winner() {
        let dir = tempfile::tempdir().unwrap();
        let record = Arc::new(dir.path().join("contended.json"));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let record = record.clone();
            handles.push(tokio::spawn(async move {
                RecordLock::try_acquire(&record).await.unwrap()
            }));
        }

        let mut winners = Vec::new();
        for handle in handles {
            if let Some(lock) = handle.await.unwrap() {
                winners.push(lock);
            }
        }
        assert_eq!(winners.len(), 1);
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("gone.json.lock");
        release_marker(&marker).await.unwrap();
        release_marker(&marker).await.unwrap();
    }

    #[tokio::test]
    async fn test_drop_releases() {
        let dir = tempfile::tempdir().unwrap();
        let record = dir.path().join("a.json");
        {
            let _lock = RecordLock::try_acquire(&record).await.unwrap().unwrap();
            assert!(lock_path(&record).exists());
        }
        assert!(!lock_path(&record).exists());
    }

    #[tokio::test]
    async fn test_missing_directory_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let record = dir.path().join("nope").join("a.json");
        let err = RecordLock::try_acquire(&record).await.unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
    }
}
