//! Domain error types
//!
//! This module defines the error hierarchy for piimask. Library code returns
//! [`MaskError`]; detector adapters report [`DetectorError`], which the
//! orchestrator classifies and keeps inside the chunk state machine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main piimask error type
///
/// This is the primary error type used throughout the library.
/// Third-party error types are converted to strings at the boundary.
#[derive(Debug, Error)]
pub enum MaskError {
    /// Invalid job parameters (chunk size, concurrency, retries)
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Configuration file loading or parsing errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The designated masked column is not present in the header
    #[error("Masked column '{column}' not found in input header")]
    MissingColumn { column: String },

    /// Malformed input file
    #[error("Input error: {0}")]
    Input(String),

    /// Detector failure surfaced outside the orchestrator
    #[error("Detection error: {0}")]
    Detection(#[from] DetectorError),

    /// Chunk results are inconsistent (duplicates, out-of-range indices)
    #[error("Merge error: {0}")]
    Merge(String),

    /// Not every chunk has a result yet; the job stays resumable
    #[error("Job {job_id} is incomplete: missing chunk(s) {missing:?}")]
    IncompleteJob { job_id: String, missing: Vec<usize> },

    /// At least one chunk failed and the failure policy aborts the job
    #[error("Job {job_id} failed: chunk(s) {failed_chunks:?} could not be masked")]
    JobFailed {
        job_id: String,
        failed_chunks: Vec<usize>,
    },

    /// Job ledger errors
    #[error("Ledger error: {0}")]
    Ledger(String),

    /// Job not present in the ledger
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

/// Failure reported by a detector for one batch of texts
///
/// The classification decides whether the orchestrator retries the call.
/// Anything an adapter cannot classify must be reported as `Transient`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DetectorError {
    /// Timeouts, throttling, server errors, malformed responses
    #[error("Transient detector failure: {0}")]
    Transient(String),

    /// Rejected input or authorization; retrying cannot help
    #[error("Permanent detector failure: {0}")]
    Permanent(String),
}

impl DetectorError {
    /// Returns the error class recorded in the ledger
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Transient(_) => ErrorClass::Transient,
            Self::Permanent(_) => ErrorClass::Permanent,
        }
    }

    /// Returns true if the call may be retried
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Returns the underlying message
    pub fn message(&self) -> &str {
        match self {
            Self::Transient(m) | Self::Permanent(m) => m,
        }
    }
}

/// Classification of the last error seen for a chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Retryable remote failure
    Transient,
    /// Non-retryable remote failure
    Permanent,
    /// Failure of the local fallback itself
    Local,
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Transient => "transient",
            Self::Permanent => "permanent",
            Self::Local => "local",
        };
        write!(f, "{s}")
    }
}

/// Details about a chunk that could not be masked
#[derive(Debug, Clone)]
pub struct ChunkFailureDetail {
    /// Index of the failed chunk
    pub chunk_index: usize,

    /// First data row covered by the chunk
    pub start_row_index: Option<usize>,

    /// Number of rows in the chunk
    pub row_count: Option<usize>,

    /// Class of the last error
    pub error_class: Option<ErrorClass>,

    /// Error message
    pub message: String,
}

impl ChunkFailureDetail {
    /// Creates a new failure detail
    pub fn new(chunk_index: usize, message: impl Into<String>) -> Self {
        Self {
            chunk_index,
            start_row_index: None,
            row_count: None,
            error_class: None,
            message: message.into(),
        }
    }

    /// Sets the row range covered by the chunk
    pub fn with_rows(mut self, start_row_index: usize, row_count: usize) -> Self {
        self.start_row_index = Some(start_row_index);
        self.row_count = Some(row_count);
        self
    }

    /// Sets the error class
    pub fn with_class(mut self, class: ErrorClass) -> Self {
        self.error_class = Some(class);
        self
    }

    /// Row indices covered by the chunk, if known
    pub fn row_indices(&self) -> Vec<usize> {
        match (self.start_row_index, self.row_count) {
            (Some(start), Some(count)) => (start..start + count).collect(),
            _ => Vec::new(),
        }
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for MaskError {
    fn from(err: std::io::Error) -> Self {
        MaskError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for MaskError {
    fn from(err: serde_json::Error) -> Self {
        MaskError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for MaskError {
    fn from(err: toml::de::Error) -> Self {
        MaskError::Configuration(format!("TOML parse error: {err}"))
    }
}

// Conversion from csv errors
impl From<csv::Error> for MaskError {
    fn from(err: csv::Error) -> Self {
        if err.is_io_error() {
            MaskError::Io(err.to_string())
        } else {
            MaskError::Input(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_error_display() {
        let err = MaskError::InvalidConfiguration("chunk_size must be >= 1".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid configuration: chunk_size must be >= 1"
        );
    }

    #[test]
    fn test_missing_column_display() {
        let err = MaskError::MissingColumn {
            column: "Comments".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Masked column 'Comments' not found in input header"
        );
    }

    #[test]
    fn test_incomplete_job_lists_missing_chunks() {
        let err = MaskError::IncompleteJob {
            job_id: "pii-job-1".to_string(),
            missing: vec![2, 5],
        };
        assert!(err.to_string().contains("[2, 5]"));
    }

    #[test]
    fn test_detector_error_classification() {
        let transient = DetectorError::Transient("429".to_string());
        let permanent = DetectorError::Permanent("401".to_string());

        assert!(transient.is_transient());
        assert!(!permanent.is_transient());
        assert_eq!(transient.class(), ErrorClass::Transient);
        assert_eq!(permanent.class(), ErrorClass::Permanent);
        assert_eq!(permanent.message(), "401");
    }

    #[test]
    fn test_detector_error_conversion() {
        let err: MaskError = DetectorError::Permanent("bad request".to_string()).into();
        assert!(matches!(err, MaskError::Detection(_)));
    }

    #[test]
    fn test_chunk_failure_detail_builder() {
        let detail = ChunkFailureDetail::new(3, "row has no masked column")
            .with_rows(300, 2)
            .with_class(ErrorClass::Local);

        assert_eq!(detail.chunk_index, 3);
        assert_eq!(detail.error_class, Some(ErrorClass::Local));
        assert_eq!(detail.row_indices(), vec![300, 301]);
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let err: MaskError = io_err.into();
        assert!(matches!(err, MaskError::Io(_)));
    }

    #[test]
    fn test_toml_error_conversion() {
        let toml_err = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let err: MaskError = toml_err.into();
        assert!(matches!(err, MaskError::Configuration(_)));
        assert!(err.to_string().contains("TOML parse error"));
    }

    #[test]
    fn test_error_class_serde() {
        let json = serde_json::to_string(&ErrorClass::Permanent).unwrap();
        assert_eq!(json, "\"permanent\"");
    }
}
