//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals > 0, limits > 0)
//! - Check that addresses and URLs parse
//! - Check that a stale lock cannot be mistaken for a live execution
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::RelayConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("retries.base_delay_ms ({base}) exceeds retries.max_delay_ms ({max})")]
    BackoffInverted { base: u64, max: u64 },

    #[error("target.base_url '{0}' is not a valid http(s) URL")]
    TargetUrl(String),

    #[error("front.bind_address '{0}' is not a socket address")]
    BindAddress(String),

    #[error("observability.metrics_address '{0}' is not a socket address")]
    MetricsAddress(String),

    #[error(
        "store.stale_lock_secs ({stale}) must exceed the longest possible execution ({longest}s)"
    )]
    StaleLockTooShort { stale: u64, longest: u64 },
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let non_zero: [(&'static str, u64); 8] = [
        ("polling.interval_ms", config.polling.interval_ms),
        ("front.deadline_ms", config.front.deadline_ms),
        ("worker.concurrency", config.worker.concurrency as u64),
        ("worker.batch_size", config.worker.batch_size as u64),
        ("worker.seen_capacity", config.worker.seen_capacity as u64),
        ("retries.max_attempts", config.retries.max_attempts as u64),
        ("target.timeout_secs", config.target.timeout_secs),
        ("store.sweep_interval_secs", config.store.sweep_interval_secs),
    ];
    for (name, value) in non_zero {
        if value == 0 {
            errors.push(ValidationError::Zero(name));
        }
    }

    if config.retries.base_delay_ms > config.retries.max_delay_ms {
        errors.push(ValidationError::BackoffInverted {
            base: config.retries.base_delay_ms,
            max: config.retries.max_delay_ms,
        });
    }

    match url::Url::parse(&config.target.base_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        _ => errors.push(ValidationError::TargetUrl(config.target.base_url.clone())),
    }

    if config.front.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.front.bind_address.clone()));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    let longest = longest_execution_secs(config);
    if config.store.stale_lock_secs <= longest {
        errors.push(ValidationError::StaleLockTooShort {
            stale: config.store.stale_lock_secs,
            longest,
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Upper bound on how long one claimed request can keep its lock.
fn longest_execution_secs(config: &RelayConfig) -> u64 {
    let attempts = u64::from(config.retries.max_attempts);
    let calls = config.target.timeout_secs.saturating_mul(attempts);
    let waits = config
        .retries
        .max_delay_ms
        .saturating_mul(attempts.saturating_sub(1))
        / 1000;
    calls.saturating_add(waits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&RelayConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = RelayConfig::default();
        config.polling.interval_ms = 0;
        config.worker.concurrency = 0;
        config.retries.base_delay_ms = 5000;
        config.target.base_url = "ftp://example.com".to_string();
        config.front.bind_address = "not-an-address".to_string();

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::Zero("polling.interval_ms")));
        assert!(errors.contains(&ValidationError::Zero("worker.concurrency")));
        assert!(errors.contains(&ValidationError::BackoffInverted { base: 5000, max: 2000 }));
        assert!(errors.contains(&ValidationError::TargetUrl("ftp://example.com".into())));
        assert!(errors.contains(&ValidationError::BindAddress("not-an-address".into())));
    }

    #[test]
    fn test_stale_lock_must_outlive_execution() {
        let mut config = RelayConfig::default();
        // 3 attempts * 30s + 2 waits * 2s = 94s
        config.store.stale_lock_secs = 90;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::StaleLockTooShort { stale: 90, longest: 94 }]
        );
    }
}
