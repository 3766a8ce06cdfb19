//! File-mediated HTTP request/response relay.
//!
//! Two roles share nothing but a directory tree:
//!
//! ```text
//!     Client ──HTTP──▶ front ──requests/<id>.json──▶ ┌──────────────┐
//!                                                   │ record store │
//!     Client ◀─HTTP─── front ◀─responses/<id>.json── │  (fs root)   │
//!                        (after <id>.json.done)      └──────┬───────┘
//!                                                          │ lock + claim
//!                                                          ▼
//!                                     worker ──HTTP──▶ target service
//! ```
//!
//! The front role writes a pending request record and polls for the response's
//! completion marker. The worker role discovers pending records, claims them under
//! an exclusive-create lock, calls the target with bounded concurrency and retries,
//! and commits the response record before its completion marker.

// Shared medium
pub mod store;

// Roles
pub mod front;
pub mod http;
pub mod target;
pub mod worker;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::RelayConfig;
pub use front::Relay;
pub use http::RelayServer;
pub use lifecycle::Shutdown;
pub use store::RecordStore;
pub use worker::Worker;
