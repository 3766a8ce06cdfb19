//! Front role subsystem.
//!
//! # Data Flow
//! ```text
//! HTTP adapter (http/server.rs)
//!     → relay.rs
//!         → submitter.rs (write pending request record, get id)
//!         → waiter.rs (poll completion marker until deadline)
//!             → read response → delete response, marker, request
//!     → response or Gateway Timeout back to the client
//! ```
//!
//! # Design Decisions
//! - The wait is bounded by a deadline and is the only cancellation point
//! - On timeout the orphaned request is deleted if no worker has claimed it
//! - Store errors while waiting are retried on the next tick, never surfaced

pub mod relay;
pub mod submitter;
pub mod waiter;

pub use relay::{Relay, RelayError};
pub use submitter::Submitter;
pub use waiter::{CompletionWaiter, WaitOutcome};
