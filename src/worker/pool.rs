//! Bounded execution pool.
//!
//! # Responsibilities
//! - Cap concurrently running target calls with a semaphore
//! - Execute a claimed request with retries, or synthesize a failure
//! - Commit: response record, then completion marker, then terminal status
//! - Release the claim's lock whatever happened
//!
//! # Design Decisions
//! - A slot is reserved before the claim is taken and returned as soon as the target
//!   outcome is known, including on error
//! - Executions are isolated tasks; a failing exchange never touches another one

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tracing::Instrument;

use crate::observability::{exchange_span, metrics};
use crate::resilience::{with_retries, RetryPolicy};
use crate::store::{
    RecordLock, RecordStore, RequestRecord, RequestStatus, ResponseRecord, StoreResult,
};
use crate::target::Target;

/// A request this worker owns: status `claimed`, lock held.
#[derive(Debug)]
pub struct Claim {
    pub record: RequestRecord,
    pub lock: RecordLock,
}

/// A reserved execution slot.
#[derive(Debug)]
pub struct Slot {
    _permit: OwnedSemaphorePermit,
}

pub struct ExecutionPool {
    store: RecordStore,
    target: Arc<dyn Target>,
    policy: RetryPolicy,
    slots: Arc<Semaphore>,
    capacity: usize,
    tasks: JoinSet<()>,
}

impl ExecutionPool {
    pub fn new(
        store: RecordStore,
        target: Arc<dyn Target>,
        policy: RetryPolicy,
        concurrency: usize,
    ) -> Self {
        let capacity = concurrency.max(1);
        Self {
            store,
            target,
            policy,
            slots: Arc::new(Semaphore::new(capacity)),
            capacity,
            tasks: JoinSet::new(),
        }
    }

    /// Wait for a free slot.
    pub async fn reserve(&self) -> Option<Slot> {
        let permit = self.slots.clone().acquire_owned().await.ok()?;
        Some(Slot { _permit: permit })
    }

    /// Number of executions currently holding a slot.
    pub fn in_flight(&self) -> usize {
        self.capacity - self.slots.available_permits()
    }

    /// Run `claim` in the background using `slot`.
    pub fn dispatch(&mut self, claim: Claim, slot: Slot) {
        let span = exchange_span("worker", &claim.record.id);
        let store = self.store.clone();
        let target = self.target.clone();
        let policy = self.policy.clone();
        let slots = self.slots.clone();
        let capacity = self.capacity;

        self.tasks.spawn(
            async move {
                let Claim { mut record, lock } = claim;

                let (response, terminal) = execute(target.as_ref(), &policy, &record).await;
                drop(slot);
                metrics::set_inflight(capacity - slots.available_permits());

                if let Err(e) = commit(&store, &mut record, &lock, &response, terminal).await {
                    tracing::error!(error = %e, "Failed to commit response, claim left for the sweeper");
                }
                if let Err(e) = lock.release().await {
                    tracing::warn!(error = %e, "Failed to release request lock");
                }
            }
            .instrument(span),
        );
        metrics::set_inflight(self.in_flight());
    }

    /// Collect finished tasks without waiting.
    pub fn reap(&mut self) {
        while let Some(result) = self.tasks.try_join_next() {
            if let Err(e) = result {
                tracing::error!(error = %e, "Execution task failed");
            }
        }
    }

    /// Wait for every dispatched execution to finish.
    pub async fn drain(&mut self) {
        if !self.tasks.is_empty() {
            tracing::info!(in_flight = self.tasks.len(), "Draining executions");
        }
        while let Some(result) = self.tasks.join_next().await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Execution task failed");
            }
        }
    }
}

/// Call the target for `record`, retrying transport failures.
///
/// Any HTTP status yields `completed`; exhausted retries yield a synthetic 500 and `failed`.
pub async fn execute(
    target: &dyn Target,
    policy: &RetryPolicy,
    record: &RequestRecord,
) -> (ResponseRecord, RequestStatus) {
    let result = with_retries(policy, |attempt| {
        tracing::debug!(attempt, method = %record.method, path = %record.path, "Calling target");
        target.call(record)
    })
    .await;

    match result {
        Ok(answer) => {
            tracing::debug!(status = answer.status, "Target answered");
            (
                ResponseRecord::new(record.id.clone(), answer.status, answer.headers, answer.body),
                RequestStatus::Completed,
            )
        }
        Err(exhausted) => {
            tracing::warn!(
                attempts = exhausted.attempts,
                error = %exhausted.last_error,
                "Target call failed"
            );
            let message = format!(
                "target call failed after {} attempt(s): {}",
                exhausted.attempts, exhausted.last_error
            );
            (
                ResponseRecord::synthetic(record.id.clone(), 500, &message),
                RequestStatus::Failed,
            )
        }
    }
}

/// Response record, then completion marker, then terminal status.
async fn commit(
    store: &RecordStore,
    record: &mut RequestRecord,
    lock: &RecordLock,
    response: &ResponseRecord,
    terminal: RequestStatus,
) -> StoreResult<()> {
    store.write_response(response).await?;
    store.mark_complete(&record.id).await?;
    record.transition(terminal)?;
    store.update_request(record, lock).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Body, Headers, RequestId, Submission};
    use crate::target::{TargetResponse, TransportError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Fixed(u16);

    #[async_trait]
    impl Target for Fixed {
        async fn call(&self, _: &RequestRecord) -> Result<TargetResponse, TransportError> {
            Ok(TargetResponse {
                status: self.0,
                headers: Headers::new(),
                body: Body::from("fixed"),
            })
        }
    }

    struct Unreachable(AtomicUsize);

    #[async_trait]
    impl Target for Unreachable {
        async fn call(&self, _: &RequestRecord) -> Result<TargetResponse, TransportError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(TransportError::Connect("connection refused".into()))
        }
    }

    /// Tracks the highest number of overlapping calls.
    struct Slow {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl Target for Slow {
        async fn call(&self, _: &RequestRecord) -> Result<TargetResponse, TransportError> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(30)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            Ok(TargetResponse {
                status: 200,
                headers: Headers::new(),
                body: Body::default(),
            })
        }
    }

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay_ms: 1,
            max_delay_ms: 5,
            jitter: false,
        }
    }

    fn record() -> RequestRecord {
        RequestRecord::pending(RequestId::generate(), Submission::new("GET", "/"))
    }

    async fn claim(store: &RecordStore) -> Claim {
        let mut record = record();
        store.create_request(&record).await.unwrap();
        let lock = store.lock_request(&record.id).await.unwrap().unwrap();
        record.transition(RequestStatus::Claimed).unwrap();
        store.update_request(&record, &lock).await.unwrap();
        Claim { record, lock }
    }

    #[tokio::test]
    async fn test_http_error_status_is_completed() {
        let (response, status) = execute(&Fixed(503), &policy(3), &record()).await;
        assert_eq!(status, RequestStatus::Completed);
        assert_eq!(response.status_code, 503);
        assert!(!response.is_synthetic());
    }

    #[tokio::test]
    async fn test_exhausted_retries_are_failed() {
        let target = Unreachable(AtomicUsize::new(0));
        let (response, status) = execute(&target, &policy(4), &record()).await;

        assert_eq!(status, RequestStatus::Failed);
        assert_eq!(target.0.load(Ordering::SeqCst), 4);
        assert_eq!(response.status_code, 500);
        let body = String::from_utf8(response.body.into_bytes()).unwrap();
        assert!(body.contains("connection refused"), "{body}");
    }

    #[tokio::test]
    async fn test_dispatch_commits_and_releases() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open(dir.path()).await.unwrap();
        let mut pool = ExecutionPool::new(store.clone(), Arc::new(Fixed(200)), policy(1), 2);

        let claim = claim(&store).await;
        let id = claim.record.id.clone();
        let slot = pool.reserve().await.unwrap();
        pool.dispatch(claim, slot);
        pool.drain().await;

        assert_eq!(pool.in_flight(), 0);
        assert!(store.is_complete(&id).await.unwrap());
        let stored = store.read_request(&id).await.unwrap().unwrap();
        assert_eq!(stored.status, RequestStatus::Completed);
        assert!(store.lock_request(&id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_concurrency_is_capped() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open(dir.path()).await.unwrap();
        let target = Arc::new(Slow {
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let mut pool = ExecutionPool::new(store.clone(), target.clone(), policy(1), 3);

        for _ in 0..10 {
            let claim = claim(&store).await;
            let slot = pool.reserve().await.unwrap();
            pool.dispatch(claim, slot);
        }
        pool.drain().await;

        assert_eq!(target.peak.load(Ordering::SeqCst), 3);
        assert_eq!(store.inventory().await.unwrap().completed, 10);
    }
}
