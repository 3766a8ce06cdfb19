//! Submit-then-wait facade used by the HTTP adapter.

use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::Instrument;

use crate::config::{FrontConfig, PollingConfig};
use crate::front::submitter::Submitter;
use crate::front::waiter::{CompletionWaiter, WaitOutcome};
use crate::observability::{exchange_span, metrics};
use crate::store::{RecordStore, RequestId, ResponseRecord, StoreError, Submission};

/// Why a relayed exchange produced no response.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The request could not be written to the store.
    #[error("failed to submit request: {0}")]
    Store(#[from] StoreError),

    /// No response arrived before the deadline.
    #[error("no response for {id} after {} ms", .elapsed.as_millis())]
    Timeout { id: RequestId, elapsed: Duration },
}

/// Front-role entry point: one call per client request.
#[derive(Debug, Clone)]
pub struct Relay {
    submitter: Submitter,
    waiter: CompletionWaiter,
    deadline: Duration,
    delete_on_timeout: bool,
}

impl Relay {
    pub fn new(store: RecordStore, polling: &PollingConfig, front: &FrontConfig) -> Self {
        Self {
            submitter: Submitter::new(store.clone()),
            waiter: CompletionWaiter::new(store, polling.interval()),
            deadline: front.deadline(),
            delete_on_timeout: front.delete_on_timeout,
        }
    }

    pub fn submitter(&self) -> &Submitter {
        &self.submitter
    }

    pub fn waiter(&self) -> &CompletionWaiter {
        &self.waiter
    }

    /// Submit `submission` and wait for its response.
    pub async fn relay(&self, submission: Submission) -> Result<ResponseRecord, RelayError> {
        let started = Instant::now();
        let id = self.submitter.submit(submission).await?;
        let span = exchange_span("front", &id);

        async move {
            match self.waiter.await_response(&id, self.deadline).await {
                WaitOutcome::Response(response) => {
                    let outcome = if response.is_synthetic() { "synthetic" } else { "delivered" };
                    metrics::record_response(outcome, started.elapsed());
                    tracing::debug!(status = response.status_code, outcome, "Response delivered");
                    Ok(response)
                }
                WaitOutcome::Timeout { elapsed } => {
                    if self.delete_on_timeout {
                        match self.waiter.abandon(&id).await {
                            Ok(true) => tracing::debug!("Removed unanswered request"),
                            Ok(false) => tracing::debug!("Unanswered request is claimed, leaving it"),
                            Err(e) => tracing::warn!(error = %e, "Failed to remove unanswered request"),
                        }
                    }
                    Err(RelayError::Timeout { id, elapsed })
                }
            }
        }
        .instrument(span)
        .await
    }
}
