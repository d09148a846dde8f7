//! Job ledger records
//!
//! A [`JobRecord`] tracks one masking job: its lifecycle state and the
//! terminal outcome of each chunk. Recording an outcome is idempotent per
//! chunk index, and a chunk that has succeeded is never downgraded.

use crate::core::orchestrator::{ChunkOutcome, ChunkStatus};
use crate::detection::DetectorKind;
use crate::domain::{ErrorClass, JobId, MaskError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Job lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Registered, no chunk dispatched yet
    #[default]
    Created,
    /// Chunks are being processed (or the run was interrupted)
    Running,
    /// Every chunk succeeded
    Completed,
    /// Some chunks failed; their rows were omitted from the output
    PartiallyFailed,
    /// The job produced no output
    Failed,
}

impl JobState {
    /// Returns true for states that accept no further changes
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::PartiallyFailed | Self::Failed)
    }

    /// Returns true if the ledger may move a job from this state to `next`
    pub fn can_transition_to(&self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Created, Running)
                | (Created, Failed)
                | (Running, Running)
                | (Running, Completed)
                | (Running, PartiallyFailed)
                | (Running, Failed)
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::PartiallyFailed => "partially_failed",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Ledger entry for one finished chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Position of the chunk
    pub chunk_index: usize,

    /// `Succeeded` or `ChunkFailed`
    pub status: ChunkStatus,

    /// Detector whose spans were applied
    pub detector_used: DetectorKind,

    /// Remote attempts made
    pub attempt_count: u32,

    /// Index of the first row in the chunk
    pub start_row_index: usize,

    /// Number of input rows in the chunk
    pub row_count: usize,

    /// Last error seen, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,

    /// Class of the last error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error_class: Option<ErrorClass>,

    /// When the outcome was recorded
    pub recorded_at: DateTime<Utc>,
}

impl ChunkRecord {
    fn from_outcome(chunk_index: usize, outcome: &ChunkOutcome) -> Self {
        Self {
            chunk_index,
            status: outcome.status,
            detector_used: outcome.detector_used,
            attempt_count: outcome.attempt_count,
            start_row_index: outcome.start_row_index,
            row_count: outcome.row_count,
            last_error: outcome.last_error.clone(),
            last_error_class: outcome.last_error_class,
            recorded_at: Utc::now(),
        }
    }
}

/// Ledger entry for one job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Job identifier
    pub job_id: JobId,

    /// Number of chunks the input was split into
    pub total_chunks: usize,

    /// Number of input rows
    pub total_rows: usize,

    /// Chunks with masked rows
    pub chunks_completed: usize,

    /// Chunks no detector could mask
    pub chunks_failed: usize,

    /// Lifecycle state
    pub state: JobState,

    /// Creation time
    pub created_at: DateTime<Utc>,

    /// Last modification time
    pub updated_at: DateTime<Utc>,

    /// When the job reached a terminal state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Terminal chunk outcomes by chunk index
    #[serde(default)]
    pub chunks: BTreeMap<usize, ChunkRecord>,

    /// Fingerprint of the input table, checked on resume
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_fingerprint: Option<String>,

    /// Input file, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,

    /// Output file, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_location: Option<String>,

    /// Why the job failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl JobRecord {
    /// Chunks without a terminal outcome
    pub fn chunks_pending(&self) -> usize {
        self.total_chunks
            .saturating_sub(self.chunks_completed + self.chunks_failed)
    }

    /// Indices of chunks without a terminal outcome
    pub fn pending_chunk_indices(&self) -> Vec<usize> {
        (0..self.total_chunks)
            .filter(|i| !self.chunks.contains_key(i))
            .collect()
    }

    /// Indices of failed chunks
    pub fn failed_chunk_indices(&self) -> Vec<usize> {
        self.chunks
            .values()
            .filter(|c| c.status == ChunkStatus::ChunkFailed)
            .map(|c| c.chunk_index)
            .collect()
    }

    /// Returns true if the chunk has succeeded
    pub fn is_chunk_succeeded(&self, chunk_index: usize) -> bool {
        self.chunks
            .get(&chunk_index)
            .is_some_and(|c| c.status == ChunkStatus::Succeeded)
    }

    /// Moves the job to `next`
    ///
    /// # Errors
    ///
    /// Returns `MaskError::Ledger` for an illegal transition.
    pub fn transition_to(&mut self, next: JobState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(MaskError::Ledger(format!(
                "job {} cannot move from {} to {}",
                self.job_id, self.state, next
            )));
        }
        let now = Utc::now();
        self.state = next;
        self.updated_at = now;
        if next.is_terminal() {
            self.completed_at = Some(now);
        }
        Ok(())
    }

    /// Records the terminal outcome of a chunk
    ///
    /// Returns `Ok(false)` when the record was left unchanged: the chunk had
    /// already succeeded, or the same failure was recorded before.
    ///
    /// # Errors
    ///
    /// Returns `MaskError::Ledger` if the job is not running, the index is out
    /// of range, or the outcome is not terminal.
    pub fn apply_outcome(&mut self, chunk_index: usize, outcome: &ChunkOutcome) -> Result<bool> {
        if self.state != JobState::Running {
            return Err(MaskError::Ledger(format!(
                "job {} is {}, chunk outcomes can only be recorded while running",
                self.job_id, self.state
            )));
        }
        if chunk_index >= self.total_chunks {
            return Err(MaskError::Ledger(format!(
                "chunk index {} out of range for job {} with {} chunk(s)",
                chunk_index, self.job_id, self.total_chunks
            )));
        }
        if !outcome.status.is_terminal() {
            return Err(MaskError::Ledger(format!(
                "chunk {} outcome must be terminal, got {}",
                chunk_index, outcome.status
            )));
        }

        let previous = self.chunks.get(&chunk_index).map(|c| c.status);
        match (previous, outcome.status) {
            (Some(ChunkStatus::Succeeded), _) => return Ok(false),
            (Some(ChunkStatus::ChunkFailed), ChunkStatus::ChunkFailed) => {
                let existing = &self.chunks[&chunk_index];
                if existing.last_error == outcome.last_error
                    && existing.last_error_class == outcome.last_error_class
                {
                    return Ok(false);
                }
            }
            (Some(ChunkStatus::ChunkFailed), ChunkStatus::Succeeded) => {
                self.chunks_failed -= 1;
                self.chunks_completed += 1;
            }
            (_, ChunkStatus::Succeeded) => self.chunks_completed += 1,
            (_, _) => self.chunks_failed += 1,
        }

        self.chunks
            .insert(chunk_index, ChunkRecord::from_outcome(chunk_index, outcome));
        self.updated_at = Utc::now();
        Ok(true)
    }
}

/// Builder for [`JobRecord`]
///
/// # Examples
///
/// ```
/// use piimask::core::ledger::{JobRecordBuilder, JobState};
/// use piimask::domain::JobId;
///
/// let record = JobRecordBuilder::new(JobId::generate(), 4)
///     .total_rows(350)
///     .build();
///
/// assert_eq!(record.state, JobState::Created);
/// assert_eq!(record.chunks_pending(), 4);
/// ```
pub struct JobRecordBuilder {
    job_id: JobId,
    total_chunks: usize,
    total_rows: usize,
    input_fingerprint: Option<String>,
    source_file: Option<String>,
    output_location: Option<String>,
}

impl JobRecordBuilder {
    /// Starts a record for a new job
    pub fn new(job_id: JobId, total_chunks: usize) -> Self {
        Self {
            job_id,
            total_chunks,
            total_rows: 0,
            input_fingerprint: None,
            source_file: None,
            output_location: None,
        }
    }

    /// Sets the number of input rows
    pub fn total_rows(mut self, total_rows: usize) -> Self {
        self.total_rows = total_rows;
        self
    }

    /// Sets the input fingerprint
    pub fn input_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.input_fingerprint = Some(fingerprint.into());
        self
    }

    /// Sets the input file
    pub fn source_file(mut self, source: impl Into<String>) -> Self {
        self.source_file = Some(source.into());
        self
    }

    /// Sets the output file
    pub fn output_location(mut self, output: impl Into<String>) -> Self {
        self.output_location = Some(output.into());
        self
    }

    /// Builds the record in state `Created`
    pub fn build(self) -> JobRecord {
        let now = Utc::now();
        JobRecord {
            job_id: self.job_id,
            total_chunks: self.total_chunks,
            total_rows: self.total_rows,
            chunks_completed: 0,
            chunks_failed: 0,
            state: JobState::Created,
            created_at: now,
            updated_at: now,
            completed_at: None,
            chunks: BTreeMap::new(),
            input_fingerprint: self.input_fingerprint,
            source_file: self.source_file,
            output_location: self.output_location,
            failure_reason: None,
        }
    }
}
