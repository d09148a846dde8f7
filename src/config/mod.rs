//! Configuration management for piimask.
//!
//! # Overview
//!
//! piimask uses TOML configuration files with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `PIIMASK_<SECTION>_<KEY>` environment overrides
//! - Default values for every setting
//! - Validation on load
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use piimask::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("piimask.toml")?;
//! println!("Masking column: {}", config.input.masked_column);
//! println!("Chunk size: {}", config.job.chunk_size);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - log level
//! - [`InputConfig`] - masked column, delimiter, output prefix
//! - [`JobConfig`] - chunk size, concurrency, retries, failure policy
//! - [`RetryConfig`] - backoff delays
//! - [`RemoteConfig`] - remote semantic detector
//! - [`LocalDetectorConfig`] - pattern library, categories, allow/deny lists
//! - [`LedgerConfig`] - job ledger backend
//! - [`LoggingConfig`] - file logging
//!
//! # Example Configuration
//!
//! ```toml
//! [input]
//! masked_column = "Comments"
//!
//! [job]
//! chunk_size = 100
//! max_concurrency = 8
//!
//! [remote]
//! enabled = true
//! endpoint = "https://detector.example.com/v1/detect"
//! api_key = "${PIIMASK_DETECTOR_KEY}"
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::{load_config, load_config_or_default};
pub use schema::{
    check_job_limits, ApplicationConfig, FailurePolicy, InputConfig, JobConfig, LedgerBackend, LedgerConfig,
    LocalDetectorConfig, LoggingConfig, MaskConfig, RemoteConfig, ResponseFormat, RetryConfig,
};
pub use secret::{secret_string, secret_string_opt, SecretString, SecretValue};
