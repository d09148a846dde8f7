//! Logging and observability
//!
//! This module provides structured logging with support for:
//! - Console output with `RUST_LOG` filtering
//! - JSON file logging with rotation
//! - Job and chunk lifecycle macros
//!
//! Masked-column values are never logged in clear text; detections are
//! reported through [`crate::detection::audit`] with hashed values.
//!
//! # Example
//!
//! ```no_run
//! use piimask::logging::init_logging;
//! use piimask::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!("Application started");
//! ```

pub mod structured;

// Re-export commonly used items
pub use structured::{init_logging, LoggingGuard};

/// Log the start of a masking job
///
/// # Example
///
/// ```no_run
/// use piimask::log_job_start;
/// use piimask::domain::JobId;
///
/// let job_id = JobId::generate();
/// log_job_start!(&job_id, 12, 1200);
/// ```
#[macro_export]
macro_rules! log_job_start {
    ($job_id:expr, $total_chunks:expr, $total_rows:expr) => {
        tracing::info!(
            job_id = %$job_id,
            total_chunks = $total_chunks,
            total_rows = $total_rows,
            "Starting masking job"
        );
    };
}

/// Log a chunk falling back to the local detector
///
/// # Example
///
/// ```no_run
/// use piimask::log_chunk_fallback;
///
/// log_chunk_fallback!(3, 4, "retries exhausted");
/// ```
#[macro_export]
macro_rules! log_chunk_fallback {
    ($chunk_index:expr, $attempts:expr, $reason:expr) => {
        tracing::warn!(
            chunk_index = $chunk_index,
            attempts = $attempts,
            reason = %$reason,
            "Falling back to local detector"
        );
    };
}

/// Log an error with context
///
/// # Example
///
/// ```no_run
/// use piimask::log_error_with_context;
/// use piimask::domain::MaskError;
///
/// let error = MaskError::Configuration("Invalid config".to_string());
/// log_error_with_context!(&error, "Failed to load configuration");
/// ```
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            "Error occurred"
        );
    };
}

/// Log a remote retry attempt
///
/// # Example
///
/// ```no_run
/// use piimask::log_retry_attempt;
///
/// log_retry_attempt!(0, 2, 4, 1000, "HTTP 503");
/// ```
#[macro_export]
macro_rules! log_retry_attempt {
    ($chunk_index:expr, $attempt:expr, $max_attempts:expr, $delay_ms:expr, $reason:expr) => {
        tracing::warn!(
            chunk_index = $chunk_index,
            attempt = $attempt,
            max_attempts = $max_attempts,
            delay_ms = $delay_ms,
            reason = %$reason,
            "Retrying remote detection after error"
        );
    };
}
