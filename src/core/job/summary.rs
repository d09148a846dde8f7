//! Job summary and reporting

use crate::core::ledger::JobState;
use crate::domain::{ChunkFailureDetail, JobId};
use std::time::Duration;

/// Summary of one masking run
#[derive(Debug, Clone)]
pub struct JobSummary {
    /// Job identifier
    pub job_id: JobId,

    /// Job state after the run
    pub state: JobState,

    /// Data rows in the input
    pub total_rows: usize,

    /// Chunks the input was split into
    pub total_chunks: usize,

    /// Chunks that ended `Succeeded`
    pub chunks_completed: usize,

    /// Chunks that ended `ChunkFailed`
    pub chunks_failed: usize,

    /// Succeeded chunks reused from an earlier run of the same job
    pub chunks_resumed: usize,

    /// Chunks masked by the remote detector in this run
    pub remote_chunks: usize,

    /// Chunks masked by the local detector in this run
    pub local_chunks: usize,

    /// Remote calls made in this run
    pub remote_attempts: u64,

    /// Highest number of chunks in flight
    pub peak_concurrency: usize,

    /// True if a shutdown signal stopped the run
    pub cancelled: bool,

    /// Row indices not present in the output
    pub missing_rows: Vec<usize>,

    /// Chunks that could not be masked
    pub failed_chunks: Vec<ChunkFailureDetail>,

    /// Duration of the run
    pub duration: Duration,

    /// Errors encountered during the run
    pub errors: Vec<JobError>,
}

impl JobSummary {
    /// Create an empty summary for `job_id`
    pub fn new(job_id: JobId) -> Self {
        Self {
            job_id,
            state: JobState::Created,
            total_rows: 0,
            total_chunks: 0,
            chunks_completed: 0,
            chunks_failed: 0,
            chunks_resumed: 0,
            remote_chunks: 0,
            local_chunks: 0,
            remote_attempts: 0,
            peak_concurrency: 0,
            cancelled: false,
            missing_rows: Vec::new(),
            failed_chunks: Vec::new(),
            duration: Duration::from_secs(0),
            errors: Vec::new(),
        }
    }

    /// Set the duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Add an error
    pub fn add_error(&mut self, error: JobError) {
        self.errors.push(error);
    }

    /// Check if every row was masked
    pub fn is_successful(&self) -> bool {
        self.state == JobState::Completed && self.errors.is_empty()
    }

    /// Chunks still without an outcome
    pub fn chunks_pending(&self) -> usize {
        self.total_chunks
            .saturating_sub(self.chunks_completed + self.chunks_failed)
    }

    /// Get success rate as a percentage of chunks
    pub fn success_rate(&self) -> f64 {
        if self.total_chunks == 0 {
            return 100.0;
        }
        (self.chunks_completed as f64 / self.total_chunks as f64) * 100.0
    }

    /// Log the summary
    pub fn log_summary(&self) {
        tracing::info!(
            job_id = %self.job_id,
            state = %self.state,
            total_rows = self.total_rows,
            total_chunks = self.total_chunks,
            chunks_completed = self.chunks_completed,
            chunks_failed = self.chunks_failed,
            chunks_resumed = self.chunks_resumed,
            remote_chunks = self.remote_chunks,
            local_chunks = self.local_chunks,
            remote_attempts = self.remote_attempts,
            peak_concurrency = self.peak_concurrency,
            duration_ms = self.duration.as_millis() as u64,
            success_rate = format!("{:.2}%", self.success_rate()),
            "Masking job finished"
        );

        for failure in &self.failed_chunks {
            tracing::warn!(
                job_id = %self.job_id,
                chunk_index = failure.chunk_index,
                error_class = ?failure.error_class,
                message = %failure.message,
                "Chunk could not be masked"
            );
        }

        if !self.errors.is_empty() {
            tracing::warn!(
                error_count = self.errors.len(),
                "Masking job finished with errors"
            );
            for error in &self.errors {
                tracing::warn!(
                    error_type = ?error.error_type,
                    message = %error.message,
                    "Masking job error"
                );
            }
        }
    }
}

/// Type of job error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobErrorType {
    /// A chunk could not be masked
    Chunk,
    /// Ledger read or write failed
    Ledger,
    /// Chunk results did not merge
    Merge,
    /// The run was interrupted
    Interrupted,
}

/// Job error with context
#[derive(Debug, Clone)]
pub struct JobError {
    /// Type of error
    pub error_type: JobErrorType,

    /// Error message
    pub message: String,

    /// Optional context (e.g., chunk index)
    pub context: Option<String>,
}

impl JobError {
    /// Create a new job error
    pub fn new(error_type: JobErrorType, message: impl Into<String>) -> Self {
        Self {
            error_type,
            message: message.into(),
            context: None,
        }
    }

    /// Add context to the error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}
