//! Order-preserving reassembly of chunk results
//!
//! The merger never touches row contents. It only checks that the results
//! partition the input and concatenates masked rows by chunk index.

use crate::config::FailurePolicy;
use crate::core::orchestrator::{ChunkResult, ChunkStatus};
use crate::domain::{ChunkFailureDetail, JobId, MaskError, Result, Row};

/// Merged output of a job
#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    /// Masked rows in original order
    pub rows: Vec<Row>,

    /// Chunks that ended `ChunkFailed`
    pub failed_chunks: Vec<ChunkFailureDetail>,

    /// Row indices left out of `rows` because their chunk failed
    pub missing_rows: Vec<usize>,
}

impl MergeOutcome {
    /// Returns true if every input row is present in `rows`
    pub fn is_complete(&self) -> bool {
        self.failed_chunks.is_empty()
    }
}

/// Merge chunk results into the final row sequence
///
/// # Errors
///
/// - [`MaskError::IncompleteJob`] if any of `0..total_chunks` has no result
/// - [`MaskError::Merge`] on duplicate or out-of-range indices, non-terminal
///   results, or rows that do not line up with the chunk boundaries
/// - [`MaskError::JobFailed`] if a chunk failed and `policy` is `fail_job`
pub fn merge_results(
    job_id: &JobId,
    total_chunks: usize,
    mut results: Vec<ChunkResult>,
    policy: FailurePolicy,
) -> Result<MergeOutcome> {
    results.sort_by_key(|r| r.chunk_index);

    for pair in results.windows(2) {
        if pair[0].chunk_index == pair[1].chunk_index {
            return Err(MaskError::Merge(format!(
                "duplicate result for chunk {}",
                pair[0].chunk_index
            )));
        }
    }
    if let Some(last) = results.last() {
        if last.chunk_index >= total_chunks {
            return Err(MaskError::Merge(format!(
                "chunk index {} is out of range for {} chunk(s)",
                last.chunk_index, total_chunks
            )));
        }
    }

    if results.len() != total_chunks {
        let mut present = results.iter().map(|r| r.chunk_index).peekable();
        let missing = (0..total_chunks)
            .filter(|i| {
                if present.peek() == Some(i) {
                    present.next();
                    false
                } else {
                    true
                }
            })
            .collect();
        return Err(MaskError::IncompleteJob {
            job_id: job_id.to_string(),
            missing,
        });
    }

    let mut outcome = MergeOutcome::default();
    let mut next_row = 0usize;

    for result in results {
        if result.start_row_index != next_row {
            return Err(MaskError::Merge(format!(
                "chunk {} starts at row {} but row {} was expected",
                result.chunk_index, result.start_row_index, next_row
            )));
        }
        next_row += result.row_count;

        match result.status {
            ChunkStatus::Succeeded => {
                check_rows(&result)?;
                outcome.rows.extend(result.masked_rows);
            }
            ChunkStatus::ChunkFailed => {
                outcome
                    .missing_rows
                    .extend(result.start_row_index..result.start_row_index + result.row_count);
                outcome.failed_chunks.push(ChunkFailureDetail {
                    chunk_index: result.chunk_index,
                    start_row_index: Some(result.start_row_index),
                    row_count: Some(result.row_count),
                    error_class: result.last_error_class,
                    message: result
                        .last_error
                        .unwrap_or_else(|| "chunk failed".to_string()),
                });
            }
            other => {
                return Err(MaskError::Merge(format!(
                    "chunk {} is not finished (status {})",
                    result.chunk_index, other
                )))
            }
        }
    }

    if !outcome.failed_chunks.is_empty() && policy == FailurePolicy::FailJob {
        return Err(MaskError::JobFailed {
            job_id: job_id.to_string(),
            failed_chunks: outcome.failed_chunks.iter().map(|f| f.chunk_index).collect(),
        });
    }

    Ok(outcome)
}

fn check_rows(result: &ChunkResult) -> Result<()> {
    if result.masked_rows.len() != result.row_count {
        return Err(MaskError::Merge(format!(
            "chunk {} holds {} row(s) but covers {}",
            result.chunk_index,
            result.masked_rows.len(),
            result.row_count
        )));
    }
    for (offset, row) in result.masked_rows.iter().enumerate() {
        if row.index != result.start_row_index + offset {
            return Err(MaskError::Merge(format!(
                "chunk {} has row {} at position {}",
                result.chunk_index, row.index, offset
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::DetectorKind;
    use crate::domain::ErrorClass;

    fn job() -> JobId {
        JobId::new("merge-job").unwrap()
    }

    fn succeeded(chunk_index: usize, start: usize, count: usize) -> ChunkResult {
        ChunkResult {
            chunk_index,
            start_row_index: start,
            row_count: count,
            masked_rows: (start..start + count)
                .map(|i| Row::from_strs(i, &[i.to_string(), "masked".to_string()]))
                .collect(),
            detector_used: DetectorKind::Local,
            attempt_count: 0,
            status: ChunkStatus::Succeeded,
            last_error: None,
            last_error_class: None,
            history: vec![ChunkStatus::Pending, ChunkStatus::LocalFallback, ChunkStatus::Succeeded],
        }
    }

    fn failed(chunk_index: usize, start: usize, count: usize) -> ChunkResult {
        ChunkResult {
            masked_rows: Vec::new(),
            status: ChunkStatus::ChunkFailed,
            last_error: Some("row 3 has 1 field(s)".to_string()),
            last_error_class: Some(ErrorClass::Local),
            ..succeeded(chunk_index, start, count)
        }
    }

    #[test]
    fn test_merge_orders_by_chunk_index() {
        let results = vec![succeeded(2, 4, 1), succeeded(0, 0, 2), succeeded(1, 2, 2)];
        let outcome = merge_results(&job(), 3, results, FailurePolicy::FailJob).unwrap();

        let indices: Vec<usize> = outcome.rows.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
        assert!(outcome.is_complete());
    }

    #[test]
    fn test_missing_chunk_is_incomplete() {
        let results = vec![succeeded(0, 0, 2), succeeded(2, 4, 1)];
        match merge_results(&job(), 4, results, FailurePolicy::FailJob) {
            Err(MaskError::IncompleteJob { missing, .. }) => assert_eq!(missing, vec![1, 3]),
            other => panic!("expected IncompleteJob, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_chunk_rejected() {
        let results = vec![succeeded(0, 0, 1), succeeded(0, 0, 1)];
        assert!(matches!(
            merge_results(&job(), 1, results, FailurePolicy::FailJob),
            Err(MaskError::Merge(_))
        ));
    }

    #[test]
    fn test_out_of_range_chunk_rejected() {
        let results = vec![succeeded(0, 0, 1), succeeded(5, 1, 1)];
        assert!(matches!(
            merge_results(&job(), 2, results, FailurePolicy::FailJob),
            Err(MaskError::Merge(_))
        ));
    }

    #[test]
    fn test_gap_between_chunks_rejected() {
        let results = vec![succeeded(0, 0, 2), succeeded(1, 3, 1)];
        assert!(matches!(
            merge_results(&job(), 2, results, FailurePolicy::FailJob),
            Err(MaskError::Merge(_))
        ));
    }

    #[test]
    fn test_failed_chunk_fails_job_by_default() {
        let results = vec![succeeded(0, 0, 2), failed(1, 2, 2)];
        match merge_results(&job(), 2, results, FailurePolicy::FailJob) {
            Err(MaskError::JobFailed { failed_chunks, .. }) => assert_eq!(failed_chunks, vec![1]),
            other => panic!("expected JobFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_partial_policy_reports_missing_rows() {
        let results = vec![succeeded(0, 0, 2), failed(1, 2, 2), succeeded(2, 4, 1)];
        let outcome = merge_results(&job(), 3, results, FailurePolicy::Partial).unwrap();

        let indices: Vec<usize> = outcome.rows.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![0, 1, 4]);
        assert_eq!(outcome.missing_rows, vec![2, 3]);
        assert_eq!(outcome.failed_chunks.len(), 1);
        assert_eq!(outcome.failed_chunks[0].error_class, Some(ErrorClass::Local));
        assert!(!outcome.is_complete());
    }

    #[test]
    fn test_empty_job_merges_to_nothing() {
        let outcome = merge_results(&job(), 0, Vec::new(), FailurePolicy::FailJob).unwrap();
        assert!(outcome.rows.is_empty());
    }
}
