//! Exponential backoff with optional jitter.

use std::time::Duration;
use rand::Rng;

/// Calculate exponential backoff delay, optionally with up to 10% jitter.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64, jitter: bool) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    let capped_delay = delay_ms.min(max_ms);

    // Apply jitter (0 to 10% of the delay)
    let jitter_range = capped_delay / 10;
    let jitter = if jitter && jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay + jitter)
}

/// Sequence of waits between attempts that never shrinks.
///
/// Jitter on capped delays could otherwise produce a shorter wait after a longer one.
#[derive(Debug, Clone)]
pub struct Backoff {
    base_ms: u64,
    max_ms: u64,
    jitter: bool,
    attempt: u32,
    previous: Duration,
}

impl Backoff {
    pub fn new(base_ms: u64, max_ms: u64, jitter: bool) -> Self {
        Self {
            base_ms,
            max_ms,
            jitter,
            attempt: 0,
            previous: Duration::ZERO,
        }
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        self.attempt = self.attempt.saturating_add(1);
        let delay = calculate_backoff(self.attempt, self.base_ms, self.max_ms, self.jitter)
            .max(self.previous);
        self.previous = delay;
        Some(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_calculation() {
        assert_eq!(calculate_backoff(0, 100, 2000, false), Duration::ZERO);
        assert_eq!(calculate_backoff(1, 100, 2000, false), Duration::from_millis(100));
        assert_eq!(calculate_backoff(2, 100, 2000, false), Duration::from_millis(200));
        assert_eq!(calculate_backoff(10, 100, 1000, false), Duration::from_millis(1000));

        let jittered = calculate_backoff(2, 100, 2000, true);
        assert!(jittered >= Duration::from_millis(200));
        assert!(jittered < Duration::from_millis(220));
    }

    #[test]
    fn test_sequence_is_non_decreasing_with_jitter() {
        let delays: Vec<_> = Backoff::new(50, 400, true).take(20).collect();
        for pair in delays.windows(2) {
            assert!(pair[1] >= pair[0], "{:?} shrank to {:?}", pair[0], pair[1]);
        }
        assert!(delays[19] >= Duration::from_millis(400));
    }

    #[test]
    fn test_huge_attempt_does_not_overflow() {
        assert_eq!(calculate_backoff(200, u64::MAX, 5000, false), Duration::from_millis(5000));
    }
}
