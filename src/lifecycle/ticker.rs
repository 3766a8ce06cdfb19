//! Cancellable periodic ticks for the polling loops.

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{self, Interval, MissedTickBehavior};

/// Fixed-interval ticker that stops when shutdown fires.
///
/// A slow tick delays the next one rather than bunching ticks up.
pub struct Ticker {
    interval: Interval,
    shutdown: broadcast::Receiver<()>,
}

impl Ticker {
    pub fn new(period: Duration, shutdown: broadcast::Receiver<()>) -> Self {
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval, shutdown }
    }

    /// Wait for the next tick. Returns `false` once shutdown has been signalled.
    pub async fn tick(&mut self) -> bool {
        tokio::select! {
            biased;
            _ = self.shutdown.recv() => false,
            _ = self.interval.tick() => true,
        }
    }
}
