//! Configuration schema types
//!
//! This module defines the configuration structure for piimask. Every
//! section has defaults, so an empty file is a valid configuration that
//! masks the `Comments` column with the local detector only.

use crate::config::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Main piimask configuration
///
/// This is the root configuration structure that maps to the TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaskConfig {
    /// Application-level settings
    #[serde(default)]
    pub application: ApplicationConfig,

    /// Input file settings
    #[serde(default)]
    pub input: InputConfig,

    /// Job parameters
    #[serde(default)]
    pub job: JobConfig,

    /// Remote retry backoff
    #[serde(default)]
    pub retry: RetryConfig,

    /// Remote semantic detector
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Local pattern detector
    #[serde(default)]
    pub local: LocalDetectorConfig,

    /// Job ledger persistence
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl MaskConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> Result<(), String> {
        self.application.validate()?;
        self.input.validate()?;
        self.job.validate()?;
        self.retry.validate()?;
        self.remote.validate()?;
        self.ledger.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl ApplicationConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }
}

/// Input file configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Header name of the column to mask
    #[serde(default = "default_masked_column")]
    pub masked_column: String,

    /// Field delimiter (a single ASCII character)
    #[serde(default = "default_delimiter")]
    pub delimiter: String,

    /// Prefix of the default output file name
    #[serde(default = "default_output_prefix")]
    pub output_prefix: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            masked_column: default_masked_column(),
            delimiter: default_delimiter(),
            output_prefix: default_output_prefix(),
        }
    }
}

impl InputConfig {
    fn validate(&self) -> Result<(), String> {
        if self.masked_column.trim().is_empty() {
            return Err("input.masked_column cannot be empty".to_string());
        }
        self.delimiter_byte()?;
        if self.output_prefix.contains('/') || self.output_prefix.contains('\\') {
            return Err("input.output_prefix cannot contain path separators".to_string());
        }
        Ok(())
    }

    /// Returns the delimiter as a single byte
    ///
    /// `\t` and `tab` are accepted for tab-separated files.
    ///
    /// # Errors
    ///
    /// Returns an error unless the delimiter is exactly one ASCII character.
    pub fn delimiter_byte(&self) -> Result<u8, String> {
        match self.delimiter.as_str() {
            "\\t" | "tab" => return Ok(b'\t'),
            _ => {}
        }
        let bytes = self.delimiter.as_bytes();
        if bytes.len() != 1 || !bytes[0].is_ascii() || bytes[0] == b'"' {
            return Err(format!(
                "Invalid input.delimiter '{}'. Must be a single ASCII character other than '\"'",
                self.delimiter
            ));
        }
        Ok(bytes[0])
    }
}

/// Policy applied when a chunk cannot be masked by any detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// The job fails and no output is produced
    #[default]
    FailJob,
    /// Rows of failed chunks are omitted and reported
    Partial,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FailJob => write!(f, "fail_job"),
            Self::Partial => write!(f, "partial"),
        }
    }
}

impl std::str::FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fail_job" | "fail-job" => Ok(Self::FailJob),
            "partial" => Ok(Self::Partial),
            other => Err(format!(
                "Invalid failure_policy '{other}'. Must be one of: fail_job, partial"
            )),
        }
    }
}

/// Job parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// Rows per chunk
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Maximum chunks in flight
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Remote retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// What to do with chunks that end in `chunk_failed`
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            max_concurrency: default_max_concurrency(),
            max_retries: default_max_retries(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

/// Largest accepted `job.chunk_size`
pub const MAX_CHUNK_SIZE: usize = 100_000;

/// Largest accepted `job.max_concurrency`
pub const MAX_CONCURRENCY: usize = 256;

/// Largest accepted `job.max_retries`
pub const MAX_RETRIES: u32 = 10;

/// Checks job parameters against the accepted ranges
///
/// # Errors
///
/// Returns a message naming the first parameter out of range.
pub fn check_job_limits(
    chunk_size: usize,
    max_concurrency: usize,
    max_retries: u32,
) -> Result<(), String> {
    if chunk_size == 0 || chunk_size > MAX_CHUNK_SIZE {
        return Err(format!(
            "job.chunk_size must be between 1 and {MAX_CHUNK_SIZE}, got {chunk_size}"
        ));
    }
    if max_concurrency == 0 || max_concurrency > MAX_CONCURRENCY {
        return Err(format!(
            "job.max_concurrency must be between 1 and {MAX_CONCURRENCY}, got {max_concurrency}"
        ));
    }
    if max_retries > MAX_RETRIES {
        return Err(format!(
            "job.max_retries cannot exceed {MAX_RETRIES}, got {max_retries}"
        ));
    }
    Ok(())
}

impl JobConfig {
    fn validate(&self) -> Result<(), String> {
        check_job_limits(self.chunk_size, self.max_concurrency, self.max_retries)
    }
}

/// Backoff between remote attempts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Delay before the first retry in milliseconds
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Upper bound of the exponential delay in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Maximum random jitter added to each delay in milliseconds
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter_ms: default_jitter_ms(),
        }
    }
}

impl RetryConfig {
    fn validate(&self) -> Result<(), String> {
        if self.base_delay_ms > self.max_delay_ms {
            return Err("retry.base_delay_ms cannot exceed retry.max_delay_ms".to_string());
        }
        if self.max_delay_ms > 300_000 {
            return Err("retry.max_delay_ms cannot exceed 300000".to_string());
        }
        Ok(())
    }
}

/// Response body shape of the remote detection service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    /// Category and byte offsets per detection
    #[default]
    Spans,
    /// The input text with PII replaced by `<PII_*>` tokens
    AnnotatedText,
}

/// Remote semantic detector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Use the remote detector as primary
    #[serde(default)]
    pub enabled: bool,

    /// Detection endpoint URL
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Bearer API key
    /// Stored securely in memory and automatically zeroized on drop
    #[serde(default)]
    pub api_key: Option<SecretString>,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Response body shape
    #[serde(default)]
    pub response_format: ResponseFormat,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            api_key: None,
            timeout_seconds: default_timeout_seconds(),
            response_format: ResponseFormat::default(),
        }
    }
}

impl RemoteConfig {
    fn validate(&self) -> Result<(), String> {
        if self.timeout_seconds == 0 || self.timeout_seconds > 600 {
            return Err("remote.timeout_seconds must be between 1 and 600".to_string());
        }
        if !self.enabled {
            return Ok(());
        }
        let endpoint = self
            .endpoint
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| "remote.endpoint is required when remote.enabled = true".to_string())?;
        let url = url::Url::parse(endpoint)
            .map_err(|e| format!("Invalid remote.endpoint '{endpoint}': {e}"))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(format!(
                "remote.endpoint must use http or https, got '{}'",
                url.scheme()
            ));
        }
        Ok(())
    }
}

/// Local pattern detector configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocalDetectorConfig {
    /// Path to a custom TOML pattern library (built-in library if unset)
    #[serde(default)]
    pub pattern_library: Option<String>,

    /// Enabled categories (all when empty)
    #[serde(default)]
    pub categories: Vec<String>,

    /// Terms that are never masked
    #[serde(default)]
    pub allow_list: Vec<String>,

    /// Terms that are always masked as SENSITIVE
    #[serde(default)]
    pub deny_list: Vec<String>,
}

/// Ledger persistence backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LedgerBackend {
    /// Process-local; jobs cannot be resumed after exit
    Memory,
    /// JSON documents under `ledger.path`
    #[default]
    File,
}

/// Job ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Persistence backend
    #[serde(default)]
    pub backend: LedgerBackend,

    /// Root directory of the file backend
    #[serde(default = "default_ledger_path")]
    pub path: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            backend: LedgerBackend::default(),
            path: default_ledger_path(),
        }
    }
}

impl LedgerConfig {
    fn validate(&self) -> Result<(), String> {
        if self.backend == LedgerBackend::File && self.path.trim().is_empty() {
            return Err("ledger.path cannot be empty with the file backend".to_string());
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Enable local JSON file logging
    #[serde(default)]
    pub local_enabled: bool,

    /// Local log directory
    #[serde(default = "default_local_path")]
    pub local_path: String,

    /// Log rotation strategy
    #[serde(default = "default_local_rotation")]
    pub local_rotation: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: false,
            local_path: default_local_path(),
            local_rotation: default_local_rotation(),
        }
    }
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&self.local_rotation.as_str()) {
            return Err(format!(
                "Invalid logging.local_rotation '{}'. Must be one of: {}",
                self.local_rotation,
                valid_rotations.join(", ")
            ));
        }
        if self.local_enabled && self.local_path.trim().is_empty() {
            return Err("logging.local_path cannot be empty when local logging is enabled".to_string());
        }
        Ok(())
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_masked_column() -> String {
    "Comments".to_string()
}

fn default_delimiter() -> String {
    ",".to_string()
}

fn default_output_prefix() -> String {
    "processed-".to_string()
}

fn default_chunk_size() -> usize {
    100
}

fn default_max_concurrency() -> usize {
    8
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    8000
}

fn default_jitter_ms() -> u64 {
    250
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_ledger_path() -> String {
    ".piimask/jobs".to_string()
}

fn default_local_path() -> String {
    "./logs".to_string()
}

fn default_local_rotation() -> String {
    "daily".to_string()
}
