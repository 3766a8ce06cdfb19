//! Worker role.
//!
//! # Data Flow
//! ```text
//! Ticker (polling.interval)
//!     → discovery.rs (list requests, skip recently seen, lock + claim)
//!     → pool.rs (bounded target calls with retries)
//!     → store (response record → completion marker → terminal status → unlock)
//!
//! Ticker (store.sweep_interval)
//!     → store::Sweeper (stale locks, abandoned claims, orphans)
//! ```
//!
//! # Design Decisions
//! - The semaphore in the pool is the only in-process synchronization
//! - Shutdown stops both tickers; in-flight executions are drained before exit

pub mod discovery;
pub mod pool;
pub mod seen;

use std::sync::Arc;

use crate::config::RelayConfig;
use crate::lifecycle::{Shutdown, Ticker};
use crate::resilience::RetryPolicy;
use crate::store::{RecordStore, Sweeper};
use crate::target::Target;

pub use discovery::{ClaimAttempt, Dispatcher, TickReport};
pub use pool::{execute, Claim, ExecutionPool};
pub use seen::RecentlySeen;

/// Dispatch loop plus periodic sweeping over one store.
pub struct Worker {
    dispatcher: Dispatcher,
    sweeper: Sweeper,
    config: RelayConfig,
}

impl Worker {
    pub fn new(store: RecordStore, target: Arc<dyn Target>, config: &RelayConfig) -> Self {
        let pool = ExecutionPool::new(
            store.clone(),
            target,
            RetryPolicy::from(&config.retries),
            config.worker.concurrency,
        );
        let dispatcher = Dispatcher::new(
            store.clone(),
            pool,
            config.worker.batch_size,
            config.worker.seen_capacity,
        );
        Self {
            dispatcher,
            sweeper: Sweeper::new(store, &config.store),
            config: config.clone(),
        }
    }

    /// Run until `shutdown` fires and in-flight executions have finished.
    pub async fn run(self, shutdown: &Shutdown) {
        let Self {
            dispatcher,
            sweeper,
            config,
        } = self;

        tracing::info!(
            concurrency = config.worker.concurrency,
            interval_ms = config.polling.interval_ms,
            target = %config.target.base_url,
            "Worker starting"
        );

        let dispatch = dispatcher.run(Ticker::new(config.polling.interval(), shutdown.subscribe()));
        let sweep = run_sweeper(
            sweeper,
            Ticker::new(config.store.sweep_interval(), shutdown.subscribe()),
        );
        tokio::join!(dispatch, sweep);

        tracing::info!("Worker stopped");
    }
}

async fn run_sweeper(sweeper: Sweeper, mut ticker: Ticker) {
    while ticker.tick().await {
        if let Err(e) = sweeper.sweep_once().await {
            tracing::warn!(error = %e, "Sweep failed, retrying next interval");
        }
    }
}
