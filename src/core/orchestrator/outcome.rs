//! Per-chunk state machine and results

use crate::detection::DetectorKind;
use crate::domain::{ErrorClass, Row};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Detection state of one chunk
///
/// ```text
/// Pending -> RemoteAttempt -> Succeeded
///                  |  ^
///                  v  | (transient, retries left)
///             RemoteFailed -> LocalFallback -> Succeeded | ChunkFailed
/// Pending -> LocalFallback                     (remote disabled)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStatus {
    /// Waiting for a concurrency slot
    #[default]
    Pending,
    /// A remote call is in flight
    RemoteAttempt,
    /// Masked rows are available
    Succeeded,
    /// Remote detection gave up on this chunk
    RemoteFailed,
    /// The local detector is running
    LocalFallback,
    /// No detector could mask the chunk
    ChunkFailed,
}

impl ChunkStatus {
    /// Returns true for `Succeeded` and `ChunkFailed`
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::ChunkFailed)
    }

    /// Returns true if `next` is a legal successor of this state
    pub fn can_transition_to(&self, next: ChunkStatus) -> bool {
        use ChunkStatus::*;
        matches!(
            (self, next),
            (Pending, RemoteAttempt)
                | (Pending, LocalFallback)
                | (RemoteAttempt, RemoteAttempt)
                | (RemoteAttempt, Succeeded)
                | (RemoteAttempt, RemoteFailed)
                | (RemoteFailed, LocalFallback)
                | (LocalFallback, Succeeded)
                | (LocalFallback, ChunkFailed)
        )
    }
}

impl fmt::Display for ChunkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::RemoteAttempt => "remote_attempt",
            Self::Succeeded => "succeeded",
            Self::RemoteFailed => "remote_failed",
            Self::LocalFallback => "local_fallback",
            Self::ChunkFailed => "chunk_failed",
        };
        write!(f, "{s}")
    }
}

/// Final result of detecting one chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkResult {
    /// Position of the chunk
    pub chunk_index: usize,

    /// Index of the first row in the chunk
    pub start_row_index: usize,

    /// Number of input rows in the chunk
    pub row_count: usize,

    /// Masked rows in input order (empty when the chunk failed)
    pub masked_rows: Vec<Row>,

    /// Detector whose spans were applied
    pub detector_used: DetectorKind,

    /// Remote attempts made
    pub attempt_count: u32,

    /// Terminal status
    pub status: ChunkStatus,

    /// Last error seen, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,

    /// Class of the last error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error_class: Option<ErrorClass>,

    /// States visited, in order
    #[serde(default)]
    pub history: Vec<ChunkStatus>,
}

impl ChunkResult {
    /// Returns true if the chunk has masked rows
    pub fn is_succeeded(&self) -> bool {
        self.status == ChunkStatus::Succeeded
    }

    /// Ledger outcome for this result
    pub fn outcome(&self) -> ChunkOutcome {
        ChunkOutcome {
            status: self.status,
            detector_used: self.detector_used,
            attempt_count: self.attempt_count,
            start_row_index: self.start_row_index,
            row_count: self.row_count,
            last_error: self.last_error.clone(),
            last_error_class: self.last_error_class,
        }
    }
}

/// What the ledger records about a finished chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkOutcome {
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
    pub last_error: Option<String>,

    /// Class of the last error
    pub last_error_class: Option<ErrorClass>,
}
