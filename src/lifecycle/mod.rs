//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Open store → Start role
//!
//! Ticks (ticker.rs):
//!     interval → discovery pass / sweep, until shutdown
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop ticking / accepting → Drain executions → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then store, then listeners
//! - Ordered shutdown: stop accepting, drain, close

pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod ticker;

pub use shutdown::Shutdown;
pub use signals::{spawn_signal_handler, wait_for_signal};
pub use startup::{run_front, run_worker, StartupError};
pub use ticker::Ticker;
