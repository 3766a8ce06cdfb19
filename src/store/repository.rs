//! Filesystem-backed record store shared by both roles.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::store::error::{StoreError, StoreResult};
use crate::store::id::RequestId;
use crate::store::layout::{temp_path_for, EntryKind, StoreLayout};
use crate::store::lock::RecordLock;
use crate::store::record::{RequestRecord, RequestStatus, ResponseRecord};

/// Handle to one store root. Cheap to clone.
#[derive(Debug, Clone)]
pub struct RecordStore {
    layout: StoreLayout,
}

impl RecordStore {
    /// Open a store, creating both namespaces if needed.
    pub async fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let layout = StoreLayout::new(root);
        for dir in [layout.requests_dir(), layout.responses_dir()] {
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| StoreError::io(&dir, e))?;
        }
        Ok(Self { layout })
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    // ---- requests -------------------------------------------------------

    /// Durably write a new request record. Creation needs no lock.
    pub async fn create_request(&self, record: &RequestRecord) -> StoreResult<()> {
        let path = self.layout.request_path(&record.id);
        write_json(&path, record).await
    }

    pub async fn read_request(&self, id: &RequestId) -> StoreResult<Option<RequestRecord>> {
        let path = self.layout.request_path(id);
        let record: Option<RequestRecord> = read_json(&path).await?;
        match record {
            Some(record) if record.id != *id => Err(StoreError::malformed(
                &path,
                <serde_json::Error as serde::de::Error>::custom(format!(
                    "record id '{}' does not match file name",
                    record.id
                )),
            )),
            other => Ok(other),
        }
    }

    /// Replace a request record. The caller must hold the record's lock.
    pub async fn update_request(&self, record: &RequestRecord, lock: &RecordLock) -> StoreResult<()> {
        let path = self.layout.request_path(&record.id);
        ensure_guarded(&path, lock)?;
        write_json(&path, record).await
    }

    /// Delete a request record. Returns whether it existed.
    pub async fn delete_request(&self, id: &RequestId, lock: &RecordLock) -> StoreResult<bool> {
        let path = self.layout.request_path(id);
        ensure_guarded(&path, lock)?;
        remove_if_exists(&path).await
    }

    pub async fn lock_request(&self, id: &RequestId) -> StoreResult<Option<RecordLock>> {
        RecordLock::try_acquire(&self.layout.request_path(id)).await
    }

    /// Identifiers of every request record currently in the store, in listing order.
    pub async fn list_requests(&self) -> StoreResult<Vec<RequestId>> {
        let entries = list_dir(&self.layout.requests_dir()).await?;
        Ok(entries
            .into_iter()
            .filter_map(|(_, kind)| match kind {
                EntryKind::Record(id) => Some(id),
                _ => None,
            })
            .collect())
    }

    // ---- responses ------------------------------------------------------

    /// Durably write a response record. Not visible to waiters until [`mark_complete`].
    ///
    /// [`mark_complete`]: RecordStore::mark_complete
    pub async fn write_response(&self, record: &ResponseRecord) -> StoreResult<()> {
        let path = self.layout.response_path(&record.id);
        write_json(&path, record).await
    }

    /// Create the completion marker. Must only follow a successful `write_response`.
    pub async fn mark_complete(&self, id: &RequestId) -> StoreResult<()> {
        let path = self.layout.completion_marker_path(id);
        let created = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await;
        match created {
            Ok(file) => {
                file.sync_all().await.map_err(|e| StoreError::io(&path, e))?;
                sync_parent(&path).await;
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    pub async fn is_complete(&self, id: &RequestId) -> StoreResult<bool> {
        let path = self.layout.completion_marker_path(id);
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| StoreError::io(&path, e))
    }

    pub async fn read_response(&self, id: &RequestId) -> StoreResult<Option<ResponseRecord>> {
        read_json(&self.layout.response_path(id)).await
    }

    pub async fn lock_response(&self, id: &RequestId) -> StoreResult<Option<RecordLock>> {
        RecordLock::try_acquire(&self.layout.response_path(id)).await
    }

    /// Delete a response record and its completion marker. Idempotent.
    ///
    /// The marker goes first so a half-finished cleanup never advertises a missing record.
    pub async fn delete_response(&self, id: &RequestId, lock: &RecordLock) -> StoreResult<()> {
        let path = self.layout.response_path(id);
        ensure_guarded(&path, lock)?;
        remove_if_exists(&self.layout.completion_marker_path(id)).await?;
        remove_if_exists(&path).await?;
        Ok(())
    }

    // ---- inspection -----------------------------------------------------

    /// Count what is currently in the store.
    pub async fn inventory(&self) -> StoreResult<Inventory> {
        let mut inventory = Inventory::default();

        for (_, kind) in list_dir(&self.layout.requests_dir()).await? {
            match kind {
                EntryKind::Record(id) => match self.read_request(&id).await {
                    Ok(Some(record)) => match record.status {
                        RequestStatus::Pending => inventory.pending += 1,
                        RequestStatus::Claimed => inventory.claimed += 1,
                        RequestStatus::Completed => inventory.completed += 1,
                        RequestStatus::Failed => inventory.failed += 1,
                    },
                    Ok(None) => {}
                    Err(e) if e.is_malformed() => inventory.malformed += 1,
                    Err(e) => return Err(e),
                },
                EntryKind::Lock(_) => inventory.locks += 1,
                EntryKind::Temp => inventory.temp_files += 1,
                _ => {}
            }
        }

        for (_, kind) in list_dir(&self.layout.responses_dir()).await? {
            match kind {
                EntryKind::Record(_) => inventory.responses += 1,
                EntryKind::CompletionMarker(_) => inventory.completion_markers += 1,
                EntryKind::Lock(_) => inventory.locks += 1,
                EntryKind::Temp => inventory.temp_files += 1,
                EntryKind::Unknown => {}
            }
        }

        Ok(inventory)
    }
}

/// Snapshot of store contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    pub pending: usize,
    pub claimed: usize,
    pub completed: usize,
    pub failed: usize,
    pub malformed: usize,
    pub responses: usize,
    pub completion_markers: usize,
    pub locks: usize,
    pub temp_files: usize,
}

fn ensure_guarded(path: &Path, lock: &RecordLock) -> StoreResult<()> {
    if lock.guards(path) {
        Ok(())
    } else {
        Err(StoreError::LockNotHeld(path.to_path_buf()))
    }
}

/// Classified entries of one namespace directory.
pub(crate) async fn list_dir(dir: &Path) -> StoreResult<Vec<(PathBuf, EntryKind)>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| StoreError::io(dir, e))?;
    let mut found = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| StoreError::io(dir, e))?
    {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        found.push((entry.path(), EntryKind::classify(name)));
    }
    Ok(found)
}

/// Write `value` to a hidden sibling, flush it, then rename it over `path`.
async fn write_json<T: Serialize>(path: &Path, value: &T) -> StoreResult<()> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|e| StoreError::malformed(path, e))?;
    let temp = temp_path_for(path);

    if let Err(e) = stage(&temp, &bytes).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(StoreError::io(&temp, e));
    }

    if let Err(e) = tokio::fs::rename(&temp, path).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(StoreError::io(path, e));
    }
    sync_parent(path).await;
    Ok(())
}

async fn stage(temp: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(temp).await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> StoreResult<Option<T>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::io(path, e)),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| StoreError::malformed(path, e))
}

pub(crate) async fn remove_if_exists(path: &Path) -> StoreResult<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(StoreError::io(path, e)),
    }
}

/// Flush the directory entry so a rename or create survives a crash. Best effort.
#[cfg(unix)]
async fn sync_parent(path: &Path) {
    if let Some(parent) = path.parent() {
        if let Ok(dir) = tokio::fs::File::open(parent).await {
            let _ = dir.sync_all().await;
        }
    }
}

#[cfg(not(unix))]
async fn sync_parent(_path: &Path) {}
