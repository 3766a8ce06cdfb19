//! Target service subsystem.
//!
//! # Data Flow
//! ```text
//! claimed RequestRecord
//!     → Target::call (method, base_url + path, headers, body)
//!     → TargetResponse (status, headers, body passed through verbatim)
//!     or TransportError (connection refused, timeout, DNS, ...)
//! ```
//!
//! # Design Decisions
//! - Any HTTP status is a successful call; only transport failures are errors
//! - Redirects are returned to the caller, never followed
//! - Every call carries a timeout

pub mod client;

use async_trait::async_trait;
use thiserror::Error;

use crate::store::{Body, Headers, RequestRecord};

pub use client::HttpTarget;

/// What the target answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: Body,
}

/// Failures that happened before any HTTP response was received.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("target call timed out")]
    Timeout,

    #[error("could not connect to target: {0}")]
    Connect(String),

    #[error("target request failed: {0}")]
    Request(String),

    /// The stored request cannot be expressed as an HTTP call at all.
    #[error("request cannot be sent: {0}")]
    InvalidRequest(String),
}

impl TransportError {
    /// Whether trying the same call again could succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidRequest(_))
    }
}

/// The service requests are ultimately executed against.
#[async_trait]
pub trait Target: Send + Sync {
    async fn call(&self, request: &RequestRecord) -> Result<TargetResponse, TransportError>;
}
