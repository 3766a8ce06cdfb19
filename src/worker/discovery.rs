//! Discovery and dispatch loop.
//!
//! Each tick lists the request namespace, skips ids in the recent-history set, and
//! tries to claim up to one batch of new candidates. A claim is the request's lock
//! plus a `pending → claimed` status write; claimed requests go to the pool.
//!
//! Candidates are scanned in id order starting just past the last id the previous
//! tick looked at, wrapping around. Records that stay locked or keep failing are
//! not remembered, so the cursor is what moves the scan past them.

use serde::Serialize;

use crate::lifecycle::Ticker;
use crate::observability::metrics;
use crate::store::{
    RecordLock, RecordStore, RequestId, RequestStatus, ResponseRecord, StoreResult,
};
use crate::worker::pool::{Claim, ExecutionPool};
use crate::worker::seen::RecentlySeen;

/// What one attempt to claim a candidate came to.
#[derive(Debug)]
pub enum ClaimAttempt {
    Claimed(Claim),
    /// Someone else holds the lock; retry on a later tick.
    Contended,
    /// Gone, or no longer pending.
    Settled,
    /// Unparseable; answered with a synthetic failure and removed.
    Malformed,
}

/// Counts for one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub candidates: usize,
    pub claimed: usize,
    pub contended: usize,
    pub settled: usize,
    pub malformed: usize,
    pub errors: usize,
}

pub struct Dispatcher {
    store: RecordStore,
    pool: ExecutionPool,
    seen: RecentlySeen,
    batch_size: usize,
    /// Last id examined; the next tick resumes after it.
    cursor: Option<RequestId>,
}

impl Dispatcher {
    pub fn new(store: RecordStore, pool: ExecutionPool, batch_size: usize, seen_capacity: usize) -> Self {
        Self {
            store,
            pool,
            seen: RecentlySeen::new(seen_capacity),
            batch_size: batch_size.max(1),
            cursor: None,
        }
    }

    /// Tick until shutdown, then wait for in-flight executions.
    pub async fn run(mut self, mut ticker: Ticker) {
        tracing::info!(batch_size = self.batch_size, "Dispatch loop starting");

        while ticker.tick().await {
            match self.tick().await {
                Ok(report) if report.claimed + report.malformed + report.errors > 0 => {
                    tracing::debug!(
                        candidates = report.candidates,
                        in_flight = self.pool.in_flight(),
                        claimed = report.claimed,
                        contended = report.contended,
                        malformed = report.malformed,
                        errors = report.errors,
                        "Dispatch tick"
                    );
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "Cannot list requests, retrying next tick"),
            }
        }

        tracing::info!("Dispatch loop received shutdown signal, draining");
        self.pool.drain().await;
    }

    /// Run one discovery pass.
    ///
    /// Only a failure to list the namespace is an error; per-request failures are
    /// counted and the candidate is retried on a later tick.
    pub async fn tick(&mut self) -> StoreResult<TickReport> {
        self.pool.reap();

        let mut candidates: Vec<RequestId> = self
            .store
            .list_requests()
            .await?
            .into_iter()
            .filter(|id| !self.seen.contains(id))
            .collect();
        candidates.sort_unstable();
        if let Some(cursor) = &self.cursor {
            let resume = candidates.partition_point(|id| id <= cursor);
            candidates.rotate_left(resume);
        }
        candidates.truncate(self.batch_size);
        self.cursor = candidates.last().cloned();

        let mut report = TickReport {
            candidates: candidates.len(),
            ..TickReport::default()
        };

        for id in candidates {
            let Some(slot) = self.pool.reserve().await else {
                break;
            };

            match self.try_claim(&id).await {
                Ok(ClaimAttempt::Claimed(claim)) => {
                    self.seen.insert(id);
                    self.pool.dispatch(claim, slot);
                    report.claimed += 1;
                }
                Ok(ClaimAttempt::Contended) => report.contended += 1,
                Ok(ClaimAttempt::Settled) => {
                    self.seen.insert(id);
                    report.settled += 1;
                }
                Ok(ClaimAttempt::Malformed) => {
                    self.seen.insert(id);
                    report.malformed += 1;
                }
                Err(e) => {
                    tracing::warn!(id = %id, error = %e, "Store error while claiming, retrying later");
                    report.errors += 1;
                }
            }
        }

        Ok(report)
    }

    /// Lock `id`, re-read it, and claim it if it is still pending.
    pub async fn try_claim(&self, id: &RequestId) -> StoreResult<ClaimAttempt> {
        let Some(lock) = self.store.lock_request(id).await? else {
            tracing::trace!(id = %id, "Request locked elsewhere");
            return Ok(ClaimAttempt::Contended);
        };

        let mut record = match self.store.read_request(id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                lock.release().await?;
                return Ok(ClaimAttempt::Settled);
            }
            Err(e) if e.is_malformed() => {
                let answered = self.answer_malformed(id, &e.to_string(), &lock).await;
                lock.release().await?;
                answered?;
                return Ok(ClaimAttempt::Malformed);
            }
            Err(e) => {
                lock.release().await?;
                return Err(e);
            }
        };

        if record.status != RequestStatus::Pending {
            tracing::debug!(id = %id, status = %record.status, "Request already taken");
            lock.release().await?;
            return Ok(ClaimAttempt::Settled);
        }

        record.transition(RequestStatus::Claimed)?;
        if let Err(e) = self.store.update_request(&record, &lock).await {
            lock.release().await?;
            return Err(e);
        }

        tracing::debug!(id = %id, method = %record.method, path = %record.path, "Request claimed");
        Ok(ClaimAttempt::Claimed(Claim { record, lock }))
    }

    /// Publish a synthetic failure for an unparseable request, then remove it.
    async fn answer_malformed(
        &self,
        id: &RequestId,
        reason: &str,
        lock: &RecordLock,
    ) -> StoreResult<()> {
        tracing::error!(id = %id, error = %reason, "Malformed request record");
        metrics::record_malformed();

        let response = ResponseRecord::synthetic(id.clone(), 500, &format!("malformed request record: {reason}"));
        self.store.write_response(&response).await?;
        self.store.mark_complete(id).await?;
        self.store.delete_request(id, lock).await?;
        Ok(())
    }

    /// Wait for every dispatched execution.
    pub async fn drain(&mut self) {
        self.pool.drain().await;
    }
}
