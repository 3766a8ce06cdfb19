//! Submission channel.

use crate::observability::metrics;
use crate::store::{RecordStore, RequestId, RequestRecord, StoreResult, Submission};

/// Durably enqueues requests for the worker role.
#[derive(Debug, Clone)]
pub struct Submitter {
    store: RecordStore,
}

impl Submitter {
    pub fn new(store: RecordStore) -> Self {
        Self { store }
    }

    /// Write a pending request record and return its correlation id.
    ///
    /// The record is visible to the discovery loop as soon as this returns.
    pub async fn submit(&self, submission: Submission) -> StoreResult<RequestId> {
        let id = RequestId::generate();
        let record = RequestRecord::pending(id.clone(), submission);
        self.store.create_request(&record).await?;

        metrics::record_submission();
        tracing::debug!(
            id = %id,
            method = %record.method,
            path = %record.path,
            "Request submitted"
        );
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RequestStatus;
    use std::collections::HashSet;

    #[tokio::test]
    async fn test_submit_writes_pending_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open(dir.path()).await.unwrap();
        let submitter = Submitter::new(store.clone());

        let id = submitter
            .submit(Submission::new("PUT", "/widgets/1").body("hello"))
            .await
            .unwrap();

        let record = store.read_request(&id).await.unwrap().unwrap();
        assert_eq!(record.status, RequestStatus::Pending);
        assert_eq!(record.method, "PUT");
        assert_eq!(record.body.unwrap().as_bytes(), b"hello");
    }

    #[tokio::test]
    async fn test_concurrent_submissions_get_distinct_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open(dir.path()).await.unwrap();
        let submitter = Submitter::new(store.clone());

        let mut handles = Vec::new();
        for i in 0..64 {
            let submitter = submitter.clone();
            handles.push(tokio::spawn(async move {
                submitter
                    .submit(Submission::new("GET", format!("/items/{i}")))
                    .await
                    .unwrap()
            }));
        }

        let mut ids = HashSet::new();
        for handle in handles {
            ids.insert(handle.await.unwrap());
        }
        assert_eq!(ids.len(), 64);
        assert_eq!(store.list_requests().await.unwrap().len(), 64);
    }
}
