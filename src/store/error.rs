//! Store error definitions.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::store::record::RequestStatus;

/// Errors that can occur while touching the record store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem operation failed. Usually transient; retry on a later tick.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Record content could not be decoded. Permanent for that record.
    #[error("malformed record {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Identifier contains characters that cannot name a record file.
    #[error("invalid record id '{0}'")]
    InvalidId(String),

    /// Attempted to move a request backward or sideways in its lifecycle.
    #[error("illegal status transition {from} -> {to}")]
    InvalidTransition {
        from: RequestStatus,
        to: RequestStatus,
    },

    /// A mutation was attempted without holding the record's lock.
    #[error("lock for {0} is not held")]
    LockNotHeld(PathBuf),
}

impl StoreError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn malformed(path: &Path, source: serde_json::Error) -> Self {
        Self::Malformed {
            path: path.to_path_buf(),
            source,
        }
    }

    /// True when the error is specific to one record's content and retrying will not help.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed { .. })
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::InvalidTransition {
            from: RequestStatus::Completed,
            to: RequestStatus::Pending,
        };
        assert_eq!(err.to_string(), "illegal status transition completed -> pending");

        let err = StoreError::io(
            Path::new("/store/requests/a.json"),
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("/store/requests/a.json"));
        assert!(!err.is_malformed());
    }
}
