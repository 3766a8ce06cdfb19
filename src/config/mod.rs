//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML), named by --config or RELAY_CONFIG
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → RelayConfig (validated, immutable)
//!     → sections handed to the front and worker roles
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, resolve_config, ConfigError};
pub use schema::{
    FrontConfig, LogFormat, ObservabilityConfig, PollingConfig, RelayConfig, RetryConfig,
    StoreConfig, TargetConfig, WorkerConfig,
};
pub use validation::ValidationError;
