//! Masking coordinator - entry point for a masking job
//!
//! Ties the chunk splitter, job ledger, detection orchestrator and merger
//! together. A run either creates a new job or resumes an existing one with
//! the same id, in which case chunks that already succeeded are reused.

use crate::adapters::remote::HttpSemanticDetector;
use crate::config::{check_job_limits, FailurePolicy, JobConfig, MaskConfig, RetryConfig};
use crate::core::chunking::split_rows;
use crate::core::job::summary::{JobError, JobErrorType, JobSummary};
use crate::core::ledger::{create_ledger_store, JobLedger, JobRecord, JobRecordBuilder, JobState};
use crate::core::merge::{merge_results, MergeOutcome};
use crate::core::orchestrator::{
    ChunkResult, DetectionOrchestrator, OrchestratorConfig, RetryPolicy,
};
use crate::detection::{Detector, DetectorKind, LocalPatternDetector};
use crate::domain::{JobId, MaskError, Result, Table};
use crate::log_job_start;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Parameters of one masking job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskingParams {
    /// Rows per chunk
    pub chunk_size: usize,

    /// Maximum chunks in flight
    pub max_concurrency: usize,

    /// Remote retries after the first attempt
    pub max_retries: u32,

    /// Handling of chunks that cannot be masked
    pub failure_policy: FailurePolicy,
}

impl Default for MaskingParams {
    fn default() -> Self {
        Self::from_config(&JobConfig::default())
    }
}

impl MaskingParams {
    /// Parameters from the `[job]` section
    pub fn from_config(config: &JobConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            max_concurrency: config.max_concurrency,
            max_retries: config.max_retries,
            failure_policy: config.failure_policy,
        }
    }

    /// Reject parameters outside the ranges accepted for `[job]`
    ///
    /// # Errors
    ///
    /// Returns `MaskError::InvalidConfiguration` naming the parameter.
    pub fn validate(&self) -> Result<()> {
        check_job_limits(self.chunk_size, self.max_concurrency, self.max_retries)
            .map_err(MaskError::InvalidConfiguration)
    }
}

/// Result of a masking run
#[derive(Debug)]
pub struct MaskingOutcome {
    /// Summary of the run
    pub summary: JobSummary,

    /// Merged rows; `None` if the run was interrupted or the job failed
    pub merged: Option<MergeOutcome>,
}

/// Masking coordinator
pub struct MaskingCoordinator {
    ledger: Arc<JobLedger>,
    primary: Option<Arc<dyn Detector>>,
    fallback: Arc<LocalPatternDetector>,
    retry: RetryConfig,
    attempt_timeout: Option<Duration>,
    shutdown: watch::Receiver<bool>,
}

impl MaskingCoordinator {
    /// Create a coordinator from configuration
    ///
    /// Builds the ledger backend, the remote detector (if enabled) and the
    /// local detector.
    pub fn new(config: &MaskConfig, shutdown: watch::Receiver<bool>) -> Result<Self> {
        let ledger = Arc::new(JobLedger::new(create_ledger_store(&config.ledger)));

        let primary: Option<Arc<dyn Detector>> = if config.remote.enabled {
            let detector = HttpSemanticDetector::new(&config.remote)?;
            tracing::info!(endpoint = %detector.endpoint(), "Remote detector enabled");
            Some(Arc::new(detector) as Arc<dyn Detector>)
        } else {
            tracing::info!("Remote detector disabled, using local patterns only");
            None
        };

        let fallback = LocalPatternDetector::from_config(&config.local)
            .map_err(|e| MaskError::Configuration(format!("{e:#}")))?;

        Ok(Self::with_components(
            ledger,
            primary,
            Arc::new(fallback),
            config.retry.clone(),
            shutdown,
        )
        .with_attempt_timeout(Some(Duration::from_secs(
            config.remote.timeout_seconds,
        ))))
    }

    /// Create a coordinator from prebuilt components
    pub fn with_components(
        ledger: Arc<JobLedger>,
        primary: Option<Arc<dyn Detector>>,
        fallback: Arc<LocalPatternDetector>,
        retry: RetryConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            ledger,
            primary,
            fallback,
            retry,
            attempt_timeout: None,
            shutdown,
        }
    }

    /// Bound every remote call by `timeout`
    pub fn with_attempt_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// The job ledger used by this coordinator
    pub fn ledger(&self) -> &Arc<JobLedger> {
        &self.ledger
    }

    /// Mask `table` as job `job_id` (a new id is generated if `None`)
    ///
    /// # Errors
    ///
    /// - [`MaskError::InvalidConfiguration`] for unusable parameters, or if
    ///   `job_id` names a job over different input or one that already
    ///   failed
    /// - ledger and merge errors; the job stays resumable
    pub async fn run(
        &self,
        job_id: Option<JobId>,
        table: &Table,
        params: &MaskingParams,
        source_file: Option<&str>,
    ) -> Result<MaskingOutcome> {
        let start_time = Instant::now();
        params.validate()?;

        let chunks = split_rows(table.rows.clone(), params.chunk_size)?;
        let total_chunks = chunks.len();
        let fingerprint = table.fingerprint();

        let record = self
            .resolve_job(job_id, total_chunks, table.len(), &fingerprint, source_file)
            .await?;
        let job_id = record.job_id.clone();
        let mut summary = JobSummary::new(job_id.clone());
        summary.total_rows = table.len();
        summary.total_chunks = total_chunks;

        if record.state == JobState::Completed {
            tracing::info!(job_id = %job_id, "Job already completed, reusing stored results");
            let stored = self.ledger.load_chunk_results(&job_id).await?;
            summary.chunks_resumed = stored.len();
            let merged = merge_results(&job_id, total_chunks, stored, params.failure_policy)?;
            return Ok(self.finish(summary, &record, Some(merged), start_time));
        }

        let record = self.ledger.mark_running(&job_id).await?;
        log_job_start!(job_id, total_chunks, table.len());

        let mut results: Vec<ChunkResult> = self
            .ledger
            .load_chunk_results(&job_id)
            .await?
            .into_iter()
            .filter(|r| r.chunk_index < total_chunks && record.is_chunk_succeeded(r.chunk_index))
            .collect();
        summary.chunks_resumed = results.len();

        let pending: Vec<_> = chunks
            .into_iter()
            .filter(|c| !record.is_chunk_succeeded(c.chunk_index))
            .collect();
        if summary.chunks_resumed > 0 {
            tracing::info!(
                job_id = %job_id,
                resumed = summary.chunks_resumed,
                pending = pending.len(),
                "Resuming job"
            );
        }

        let orchestrator = DetectionOrchestrator::new(
            self.primary.clone(),
            self.fallback.clone(),
            OrchestratorConfig {
                max_concurrency: params.max_concurrency,
                retry: RetryPolicy::from_config(params.max_retries, &self.retry),
                attempt_timeout: self.attempt_timeout,
                masked_column: table.masked_column,
            },
        );
        let run = orchestrator
            .run(&self.ledger, &job_id, pending, self.shutdown.clone())
            .await?;

        summary.peak_concurrency = run.peak_concurrency;
        for result in &run.results {
            if result.is_succeeded() {
                match result.detector_used {
                    DetectorKind::Remote => summary.remote_chunks += 1,
                    DetectorKind::Local => summary.local_chunks += 1,
                }
            }
            summary.remote_attempts += u64::from(result.attempt_count);
        }
        results.extend(run.results);

        if run.cancelled {
            summary.cancelled = true;
            summary.add_error(
                JobError::new(JobErrorType::Interrupted, "shutdown requested")
                    .with_context(format!("unfinished_chunks={}", run.undispatched.len())),
            );
            let record = self.ledger.get_job_state(&job_id).await?;
            return Ok(self.finish(summary, &record, None, start_time));
        }

        // Merge before finalizing so an inconsistent result set leaves the job resumable.
        let merged = merge_results(&job_id, total_chunks, results, FailurePolicy::Partial)?;
        let record = self.ledger.finalize(&job_id, params.failure_policy).await?;

        for failure in &merged.failed_chunks {
            summary.add_error(
                JobError::new(JobErrorType::Chunk, failure.message.clone())
                    .with_context(format!("chunk_index={}", failure.chunk_index)),
            );
        }
        summary.failed_chunks = merged.failed_chunks.clone();

        let merged = match record.state {
            JobState::Failed => None,
            _ => {
                summary.missing_rows = merged.missing_rows.clone();
                Some(merged)
            }
        };
        Ok(self.finish(summary, &record, merged, start_time))
    }

    async fn resolve_job(
        &self,
        job_id: Option<JobId>,
        total_chunks: usize,
        total_rows: usize,
        fingerprint: &str,
        source_file: Option<&str>,
    ) -> Result<JobRecord> {
        if let Some(id) = &job_id {
            if let Some(existing) = self.ledger.find_job(id).await? {
                return check_resumable(existing, total_chunks, fingerprint);
            }
        }

        let mut builder = JobRecordBuilder::new(job_id.unwrap_or_else(JobId::generate), total_chunks)
            .total_rows(total_rows)
            .input_fingerprint(fingerprint);
        if let Some(source) = source_file {
            builder = builder.source_file(source);
        }
        let record = builder.build();
        self.ledger.register(record.clone()).await?;
        Ok(record)
    }

    fn finish(
        &self,
        mut summary: JobSummary,
        record: &JobRecord,
        merged: Option<MergeOutcome>,
        start_time: Instant,
    ) -> MaskingOutcome {
        summary.state = record.state;
        summary.chunks_completed = record.chunks_completed;
        summary.chunks_failed = record.chunks_failed;
        let summary = summary.with_duration(start_time.elapsed());
        summary.log_summary();
        MaskingOutcome { summary, merged }
    }
}

fn check_resumable(existing: JobRecord, total_chunks: usize, fingerprint: &str) -> Result<JobRecord> {
    if existing.total_chunks != total_chunks {
        return Err(MaskError::InvalidConfiguration(format!(
            "job {} was created with {} chunk(s), this input has {}",
            existing.job_id, existing.total_chunks, total_chunks
        )));
    }
    if let Some(expected) = &existing.input_fingerprint {
        if expected != fingerprint {
            return Err(MaskError::InvalidConfiguration(format!(
                "job {} was created for different input",
                existing.job_id
            )));
        }
    }
    if matches!(existing.state, JobState::Failed | JobState::PartiallyFailed) {
        return Err(MaskError::InvalidConfiguration(format!(
            "job {} already finished as {}",
            existing.job_id, existing.state
        )));
    }
    Ok(existing)
}
