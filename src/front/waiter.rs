//! Completion waiter.
//!
//! Polls for a response's completion marker until a deadline. Only after the marker
//! is seen is the response record read; then the response, its marker and the
//! originating request are deleted, each under its own lock. A request the worker
//! is still holding is removed in the background so the response is not delayed.

use std::time::{Duration, Instant};

use crate::observability::metrics;
use crate::store::{RecordStore, RequestId, ResponseRecord, StoreResult};

/// How many times cleanup retries a request lock the worker is still holding.
const REQUEST_CLEANUP_ATTEMPTS: u32 = 50;
const REQUEST_CLEANUP_BACKOFF: Duration = Duration::from_millis(10);

/// Result of waiting for one exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    Response(ResponseRecord),
    Timeout { elapsed: Duration },
}

#[derive(Debug, Clone)]
pub struct CompletionWaiter {
    store: RecordStore,
    poll_interval: Duration,
}

impl CompletionWaiter {
    pub fn new(store: RecordStore, poll_interval: Duration) -> Self {
        Self {
            store,
            poll_interval,
        }
    }

    /// Wait up to `deadline` for the response to `id`.
    ///
    /// Store errors while polling are logged and retried on the next tick; this never
    /// fails, it either yields a response or times out.
    pub async fn await_response(&self, id: &RequestId, deadline: Duration) -> WaitOutcome {
        let started = Instant::now();
        loop {
            match self.try_collect(id).await {
                Ok(Some(response)) => return WaitOutcome::Response(response),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(id = %id, error = %e, "Store error while waiting, retrying next tick");
                }
            }

            let elapsed = started.elapsed();
            if elapsed >= deadline {
                metrics::record_timeout();
                tracing::warn!(id = %id, elapsed_ms = elapsed.as_millis() as u64, "No response before deadline");
                return WaitOutcome::Timeout { elapsed };
            }
            tokio::time::sleep(self.poll_interval.min(deadline - elapsed)).await;
        }
    }

    /// One poll: collect and clean up the response if its marker is present.
    async fn try_collect(&self, id: &RequestId) -> StoreResult<Option<ResponseRecord>> {
        if !self.store.is_complete(id).await? {
            return Ok(None);
        }
        // Held by the sweeper; look again next tick.
        let Some(lock) = self.store.lock_response(id).await? else {
            return Ok(None);
        };

        let response = match self.store.read_response(id).await {
            Ok(Some(response)) => response,
            Ok(None) => {
                tracing::error!(id = %id, "Completion marker present without a response record");
                ResponseRecord::synthetic(id.clone(), 502, "response record missing")
            }
            Err(e) if e.is_malformed() => {
                tracing::error!(id = %id, error = %e, "Malformed response record");
                metrics::record_malformed();
                ResponseRecord::synthetic(id.clone(), 502, &format!("malformed response record: {e}"))
            }
            Err(e) => {
                lock.release().await?;
                return Err(e);
            }
        };

        if let Err(e) = self.store.delete_response(id, &lock).await {
            tracing::warn!(id = %id, error = %e, "Failed to delete delivered response");
        }
        lock.release().await?;

        if !remove_request(&self.store, id).await {
            tokio::spawn(remove_request_later(self.store.clone(), id.clone()));
        }

        Ok(Some(response))
    }

    /// Delete a request nobody is waiting for any more.
    ///
    /// Returns `false` when the request is gone or currently claimed; a claimed request
    /// is resolved by its worker and later swept.
    pub async fn abandon(&self, id: &RequestId) -> StoreResult<bool> {
        let Some(lock) = self.store.lock_request(id).await? else {
            return Ok(false);
        };
        let deleted = self.store.delete_request(id, &lock).await;
        lock.release().await?;
        deleted
    }
}

/// Delete an answered request. Returns `false` while its lock is held elsewhere.
async fn remove_request(store: &RecordStore, id: &RequestId) -> bool {
    match store.lock_request(id).await {
        Ok(Some(lock)) => {
            if let Err(e) = store.delete_request(id, &lock).await {
                tracing::warn!(id = %id, error = %e, "Failed to delete answered request");
            }
            if let Err(e) = lock.release().await {
                tracing::warn!(id = %id, error = %e, "Failed to release request lock");
            }
            true
        }
        Ok(None) => false,
        Err(e) => {
            tracing::warn!(id = %id, error = %e, "Cannot lock answered request");
            true
        }
    }
}

/// Keep trying while the worker finishes its status write.
async fn remove_request_later(store: RecordStore, id: RequestId) {
    for _ in 0..REQUEST_CLEANUP_ATTEMPTS {
        tokio::time::sleep(REQUEST_CLEANUP_BACKOFF).await;
        if remove_request(&store, &id).await {
            return;
        }
    }
    tracing::debug!(id = %id, "Answered request still locked, leaving it to the sweeper");
}
