//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Claimed request executed against the target:
//!     → target client enforces the call timeout
//!     → On transport failure: retries.rs (retry with backoff.rs delays)
//!     → On exhaustion: caller writes a synthetic failure response
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Connection errors and timeouts are retryable; HTTP statuses are not errors
//! - Backoff never shrinks between consecutive attempts

pub mod backoff;
pub mod retries;

pub use retries::{with_retries, RetriesExhausted, RetryPolicy};
