//! Retry logic for target calls.
//!
//! # Responsibilities
//! - Repeat a call that failed at the transport level
//! - Wait a non-decreasing backoff between attempts
//! - Stop at the attempt limit and hand back the last error
//!
//! # Design Decisions
//! - HTTP error statuses are responses, never retried here
//! - Non-retryable transport errors stop immediately
//! - `max_attempts` counts every call, including the first

use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::observability::metrics;
use crate::resilience::backoff::Backoff;
use crate::target::TransportError;

/// Attempt limit and backoff shape.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: bool,
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
            jitter: config.jitter,
        }
    }
}

impl RetryPolicy {
    pub fn backoff(&self) -> Backoff {
        Backoff::new(self.base_delay_ms, self.max_delay_ms, self.jitter)
    }
}

/// The call never produced a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetriesExhausted {
    pub attempts: u32,
    pub last_error: TransportError,
}

/// Run `op` until it succeeds, fails permanently, or the attempt limit is reached.
///
/// `op` receives the 1-based attempt number.
pub async fn with_retries<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, RetriesExhausted>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
{
    let mut delays = policy.backoff();
    let mut attempt = 0;

    loop {
        attempt += 1;
        match op(attempt).await {
            Ok(value) => {
                metrics::record_target_attempt("ok");
                return Ok(value);
            }
            Err(error) => {
                metrics::record_target_attempt("transport_error");
                if attempt >= policy.max_attempts || !error.is_retryable() {
                    return Err(RetriesExhausted {
                        attempts: attempt,
                        last_error: error,
                    });
                }

                let delay = delays.next().unwrap_or(Duration::ZERO);
                tracing::info!(attempt, delay = ?delay, error = %error, "Retrying after transport error");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay_ms: 1,
            max_delay_ms: 10,
            jitter: false,
        }
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let result = with_retries(&policy(5), |_| {
            let calls = calls.clone();
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(TransportError::Connect("refused".into()))
                } else {
                    Ok("done")
                }
            }
        })
        .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_reports_last_error() {
        let result: Result<(), _> = with_retries(&policy(3), |attempt| async move {
            Err(TransportError::Request(format!("attempt {attempt}")))
        })
        .await;

        let exhausted = result.unwrap_err();
        assert_eq!(exhausted.attempts, 3);
        assert_eq!(exhausted.last_error, TransportError::Request("attempt 3".into()));
    }

    #[tokio::test]
    async fn test_permanent_error_stops_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retries(&policy(5), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(TransportError::InvalidRequest("bad method".into())) }
        })
        .await;

        assert_eq!(result.unwrap_err().attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_policy_from_config_has_at_least_one_attempt() {
        let config = RetryConfig {
            max_attempts: 0,
            ..RetryConfig::default()
        };
        assert_eq!(RetryPolicy::from(&config).max_attempts, 1);
    }
}
