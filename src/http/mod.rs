//! HTTP front end.
//!
//! # Data Flow
//! ```text
//! Client connection
//!     → server.rs (Axum router, tracing layer)
//!     → convert.rs (request → Submission, hop-by-hop stripped)
//!     → front::Relay (submit, wait for completion marker)
//!     → convert.rs (ResponseRecord → response, or 504/502)
//!     → Send to client
//! ```

pub mod convert;
pub mod server;

pub use server::{RelayServer, HEALTH_PATH};
