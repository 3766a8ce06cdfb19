//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for both relay roles.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Shared record store location and housekeeping thresholds.
    pub store: StoreConfig,

    /// Poll cadence shared by the completion waiter and the discovery loop.
    pub polling: PollingConfig,

    /// Front role (HTTP listener + submitter) settings.
    pub front: FrontConfig,

    /// Back role (discovery + execution pool) settings.
    pub worker: WorkerConfig,

    /// Retry configuration for target calls.
    pub retries: RetryConfig,

    /// Target service settings.
    pub target: TargetConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Record store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Root directory both roles can read and write.
    pub root: PathBuf,

    /// Lock markers older than this are considered abandoned.
    pub stale_lock_secs: u64,

    /// Orphaned records older than this are swept.
    pub orphan_ttl_secs: u64,

    /// How often the worker role runs the sweeper.
    pub sweep_interval_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./relay-store"),
            stale_lock_secs: 300,
            orphan_ttl_secs: 600,
            sweep_interval_secs: 60,
        }
    }
}

impl StoreConfig {
    pub fn stale_lock_after(&self) -> Duration {
        Duration::from_secs(self.stale_lock_secs)
    }

    pub fn orphan_ttl(&self) -> Duration {
        Duration::from_secs(self.orphan_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Polling configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Tick interval in milliseconds.
    pub interval_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self { interval_ms: 100 }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Front role configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FrontConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// How long a submitter waits for a response, in milliseconds.
    pub deadline_ms: u64,

    /// Maximum accepted request body size in bytes.
    pub max_body_bytes: usize,

    /// Delete the request record when the wait times out.
    pub delete_on_timeout: bool,
}

impl Default for FrontConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            deadline_ms: 30_000,
            max_body_bytes: 2 * 1024 * 1024, // 2MB
            delete_on_timeout: true,
        }
    }
}

impl FrontConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }
}

/// Worker role configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Maximum concurrently in-flight target calls.
    pub concurrency: usize,

    /// Maximum number of new requests scheduled per discovery tick.
    pub batch_size: usize,

    /// Capacity of the recently-seen set.
    pub seen_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            batch_size: 32,
            seen_capacity: 1000,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total number of target calls per request, including the first.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Add up to 10% jitter to each delay.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
            jitter: false,
        }
    }
}

/// Target service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Base address requests are forwarded to (e.g., "http://127.0.0.1:3000").
    pub base_url: String,

    /// Total call timeout in seconds.
    pub timeout_secs: u64,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".to_string(),
            timeout_secs: 30,
            connect_timeout_secs: 5,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
