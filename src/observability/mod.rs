//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events, exchange spans keyed by record id)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - The record id flows through every log line of an exchange
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;

pub use logging::{exchange_span, init_logging};
