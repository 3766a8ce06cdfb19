//! Housekeeping for records nobody will come back for.
//!
//! # What gets removed
//! - Lock markers older than the stale threshold (their holder is gone).
//! - Staged temp files older than the orphan TTL (a writer died mid-write).
//! - Requests still `claimed` while unlocked: the worker that claimed them is gone,
//!   so they are resolved forward to `failed` with a synthetic response.
//! - Terminal requests older than the orphan TTL (the submitter stopped waiting).
//! - Responses whose request is gone and that are older than the orphan TTL.
//!
//! Every record removal goes through that record's lock.

use std::path::Path;
use std::time::Duration;

use serde::Serialize;

use crate::config::StoreConfig;
use crate::observability::metrics;
use crate::store::error::{StoreError, StoreResult};
use crate::store::id::RequestId;
use crate::store::layout::EntryKind;
use crate::store::lock::{file_age, release_marker, RecordLock};
use crate::store::record::{RequestStatus, ResponseRecord};
use crate::store::repository::{list_dir, remove_if_exists, RecordStore};

/// Counts of what one sweep removed or resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub stale_locks: usize,
    pub temp_files: usize,
    pub abandoned_claims: usize,
    pub expired_requests: usize,
    pub orphaned_responses: usize,
    /// Entries skipped because touching them failed; retried next sweep.
    pub errors: usize,
}

impl SweepReport {
    pub fn total(&self) -> usize {
        self.stale_locks
            + self.temp_files
            + self.abandoned_claims
            + self.expired_requests
            + self.orphaned_responses
    }

    fn skip(&mut self, entry: &dyn std::fmt::Display, error: &StoreError) {
        tracing::warn!(entry = %entry, error = %error, "Sweep skipped entry");
        self.errors += 1;
    }
}

pub struct Sweeper {
    store: RecordStore,
    stale_lock_after: Duration,
    orphan_ttl: Duration,
}

impl Sweeper {
    pub fn new(store: RecordStore, config: &StoreConfig) -> Self {
        Self {
            store,
            stale_lock_after: config.stale_lock_after(),
            orphan_ttl: config.orphan_ttl(),
        }
    }

    /// Run every pass once.
    ///
    /// Only a failure to list a namespace is an error. A failure on one entry is
    /// logged and counted in [`SweepReport::errors`], and the sweep moves on.
    pub async fn sweep_once(&self) -> StoreResult<SweepReport> {
        let mut report = SweepReport::default();
        self.sweep_markers(&mut report).await?;
        self.sweep_requests(&mut report).await?;
        self.sweep_responses(&mut report).await?;

        if report.total() + report.errors > 0 {
            tracing::info!(
                stale_locks = report.stale_locks,
                temp_files = report.temp_files,
                abandoned_claims = report.abandoned_claims,
                expired_requests = report.expired_requests,
                orphaned_responses = report.orphaned_responses,
                errors = report.errors,
                "Sweep removed leftovers"
            );
        }
        Ok(report)
    }

    async fn sweep_markers(&self, report: &mut SweepReport) -> StoreResult<()> {
        let layout = self.store.layout();
        for dir in [layout.requests_dir(), layout.responses_dir()] {
            for (path, kind) in list_dir(&dir).await? {
                let (threshold, label) = match kind {
                    EntryKind::Lock(_) => (self.stale_lock_after, "lock"),
                    EntryKind::Temp => (self.orphan_ttl, "temp"),
                    _ => continue,
                };
                match self.sweep_marker(&path, threshold, label).await {
                    Ok(false) => {}
                    Ok(true) if label == "lock" => report.stale_locks += 1,
                    Ok(true) => report.temp_files += 1,
                    Err(e) => report.skip(&path.display(), &e),
                }
            }
        }
        Ok(())
    }

    async fn sweep_marker(&self, path: &Path, threshold: Duration, label: &'static str) -> StoreResult<bool> {
        if !file_age(path).await?.is_some_and(|age| age > threshold) {
            return Ok(false);
        }
        tracing::warn!(path = %path.display(), kind = label, "Removing stale file");
        release_marker(path).await?;
        metrics::record_swept(label);
        Ok(true)
    }

    async fn sweep_requests(&self, report: &mut SweepReport) -> StoreResult<()> {
        for id in self.store.list_requests().await? {
            let lock = match self.store.lock_request(&id).await {
                Ok(Some(lock)) => lock,
                Ok(None) => continue,
                Err(e) => {
                    report.skip(&id, &e);
                    continue;
                }
            };

            let outcome = self.sweep_request(&id, &lock, report).await;
            if let Err(e) = lock.release().await {
                report.skip(&id, &e);
            }
            if let Err(e) = outcome {
                report.skip(&id, &e);
            }
        }
        Ok(())
    }

    async fn sweep_request(
        &self,
        id: &RequestId,
        lock: &RecordLock,
        report: &mut SweepReport,
    ) -> StoreResult<()> {
        let mut record = match self.store.read_request(id).await {
            Ok(Some(record)) => record,
            Ok(None) => return Ok(()),
            // The dispatch loop answers malformed records.
            Err(e) if e.is_malformed() => return Ok(()),
            Err(e) => return Err(e),
        };

        match record.status {
            RequestStatus::Claimed => {
                // Claimed but unlocked: the claimant released nothing and is gone.
                let next = if self.store.is_complete(id).await? {
                    RequestStatus::Completed
                } else {
                    let response =
                        ResponseRecord::synthetic(id.clone(), 500, "claim abandoned by worker");
                    self.store.write_response(&response).await?;
                    self.store.mark_complete(id).await?;
                    RequestStatus::Failed
                };
                record.transition(next)?;
                self.store.update_request(&record, lock).await?;
                tracing::warn!(id = %id, status = %next, "Resolved abandoned claim");
                report.abandoned_claims += 1;
                metrics::record_swept("abandoned_claim");
            }
            status if status.is_terminal() => {
                let path = self.store.layout().request_path(id);
                if file_age(&path).await?.is_some_and(|age| age > self.orphan_ttl) {
                    self.store.delete_request(id, lock).await?;
                    tracing::info!(id = %id, status = %status, "Removed expired request");
                    report.expired_requests += 1;
                    metrics::record_swept("request");
                }
            }
            _ => {}
        }
        Ok(())
    }

    async fn sweep_responses(&self, report: &mut SweepReport) -> StoreResult<()> {
        for (path, kind) in list_dir(&self.store.layout().responses_dir()).await? {
            let outcome = match kind {
                EntryKind::Record(id) => self.sweep_response(&id, &path).await,
                EntryKind::CompletionMarker(id) => self.sweep_dangling_marker(&id, &path).await.map(|_| false),
                _ => continue,
            };
            match outcome {
                Ok(true) => report.orphaned_responses += 1,
                Ok(false) => {}
                Err(e) => report.skip(&path.display(), &e),
            }
        }
        Ok(())
    }

    /// Remove a response whose request is gone once it outlives the orphan TTL.
    async fn sweep_response(&self, id: &RequestId, path: &Path) -> StoreResult<bool> {
        let layout = self.store.layout();
        if tokio::fs::try_exists(layout.request_path(id)).await.unwrap_or(true) {
            return Ok(false);
        }
        if !file_age(path).await?.is_some_and(|age| age > self.orphan_ttl) {
            return Ok(false);
        }

        let Some(lock) = self.store.lock_response(id).await? else {
            return Ok(false);
        };
        let deleted = self.store.delete_response(id, &lock).await;
        lock.release().await?;
        deleted?;

        tracing::info!(id = %id, "Removed orphaned response");
        metrics::record_swept("response");
        Ok(true)
    }

    /// A marker whose record is gone points at nothing.
    async fn sweep_dangling_marker(&self, id: &RequestId, path: &Path) -> StoreResult<bool> {
        let layout = self.store.layout();
        if tokio::fs::try_exists(layout.response_path(id)).await.unwrap_or(true) {
            return Ok(false);
        }
        if !file_age(path).await?.is_some_and(|age| age > self.orphan_ttl) {
            return Ok(false);
        }
        remove_if_exists(path).await
    }
}
