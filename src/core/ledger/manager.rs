//! Job ledger
//!
//! [`JobLedger`] is the single writer of job records. Read-modify-write
//! cycles are serialized with an async mutex, so concurrent chunk tasks can
//! record outcomes without losing updates.

use crate::config::FailurePolicy;
use crate::core::ledger::record::{JobRecord, JobRecordBuilder, JobState};
use crate::core::ledger::store::{InMemoryLedgerStore, LedgerStore};
use crate::core::orchestrator::{ChunkOutcome, ChunkResult};
use crate::domain::{JobId, MaskError, Result};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Job status bookkeeping over a [`LedgerStore`]
pub struct JobLedger {
    store: Arc<dyn LedgerStore>,
    lock: Mutex<()>,
}

impl JobLedger {
    /// Create a ledger over a storage backend
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            store,
            lock: Mutex::new(()),
        }
    }

    /// Create a ledger backed by process memory
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryLedgerStore::new()))
    }

    /// Register a new job with a generated id
    pub async fn create_job(&self, total_chunks: usize) -> Result<JobId> {
        let record = JobRecordBuilder::new(JobId::generate(), total_chunks).build();
        let job_id = record.job_id.clone();
        self.register(record).await?;
        Ok(job_id)
    }

    /// Register a prepared job record
    ///
    /// # Errors
    ///
    /// Returns `MaskError::Ledger` if a job with the same id exists.
    pub async fn register(&self, record: JobRecord) -> Result<()> {
        let _guard = self.lock.lock().await;
        if self.store.load_job(&record.job_id).await?.is_some() {
            return Err(MaskError::Ledger(format!(
                "job {} already exists",
                record.job_id
            )));
        }
        self.store.save_job(&record).await?;

        tracing::info!(
            job_id = %record.job_id,
            total_chunks = record.total_chunks,
            "Job registered"
        );
        Ok(())
    }

    /// Look up a job, `Ok(None)` if unknown
    pub async fn find_job(&self, job_id: &JobId) -> Result<Option<JobRecord>> {
        self.store.load_job(job_id).await
    }

    /// Current record of a job
    ///
    /// # Errors
    ///
    /// Returns `MaskError::JobNotFound` for an unknown job.
    pub async fn get_job_state(&self, job_id: &JobId) -> Result<JobRecord> {
        self.store
            .load_job(job_id)
            .await?
            .ok_or_else(|| MaskError::JobNotFound(job_id.to_string()))
    }

    /// Move a job to `Running`; a running job is left as is
    pub async fn mark_running(&self, job_id: &JobId) -> Result<JobRecord> {
        self.update(job_id, |record| {
            if record.state != JobState::Running {
                record.transition_to(JobState::Running)?;
            }
            Ok(())
        })
        .await
    }

    /// Record the terminal outcome of one chunk
    ///
    /// Returns `Ok(false)` if the ledger already held this outcome or the
    /// chunk had already succeeded.
    pub async fn record_chunk_outcome(
        &self,
        job_id: &JobId,
        chunk_index: usize,
        outcome: &ChunkOutcome,
    ) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let mut record = self.load_locked(job_id).await?;
        let changed = record.apply_outcome(chunk_index, outcome)?;
        if changed {
            self.store.save_job(&record).await?;
        }

        tracing::debug!(
            job_id = %job_id,
            chunk_index,
            status = %outcome.status,
            detector = %outcome.detector_used,
            changed,
            "Chunk outcome recorded"
        );
        Ok(changed)
    }

    /// Persist the masked rows of a succeeded chunk
    ///
    /// # Errors
    ///
    /// Returns `MaskError::Ledger` for a result that did not succeed.
    pub async fn save_chunk_result(&self, job_id: &JobId, result: &ChunkResult) -> Result<()> {
        if !result.is_succeeded() {
            return Err(MaskError::Ledger(format!(
                "chunk {} of job {} is {}, only succeeded results are stored",
                result.chunk_index, job_id, result.status
            )));
        }
        self.store.save_chunk_result(job_id, result).await
    }

    /// Stored results of a job, ordered by chunk index
    pub async fn load_chunk_results(&self, job_id: &JobId) -> Result<Vec<ChunkResult>> {
        self.store.load_chunk_results(job_id).await
    }

    /// Move a job to its terminal state
    ///
    /// All chunks succeeded: `Completed`. Otherwise `PartiallyFailed` under
    /// [`FailurePolicy::Partial`] and `Failed` under
    /// [`FailurePolicy::FailJob`]. A job that is already terminal is
    /// returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns `MaskError::IncompleteJob` while any chunk lacks an outcome;
    /// the job stays `Running`.
    pub async fn finalize(&self, job_id: &JobId, policy: FailurePolicy) -> Result<JobRecord> {
        let _guard = self.lock.lock().await;
        let mut record = self.load_locked(job_id).await?;
        if record.state.is_terminal() {
            return Ok(record);
        }

        if record.chunks_completed + record.chunks_failed != record.total_chunks {
            return Err(MaskError::IncompleteJob {
                job_id: job_id.to_string(),
                missing: record.pending_chunk_indices(),
            });
        }

        let next = match (record.chunks_failed, policy) {
            (0, _) => JobState::Completed,
            (_, FailurePolicy::Partial) => JobState::PartiallyFailed,
            (_, FailurePolicy::FailJob) => JobState::Failed,
        };
        if next == JobState::Failed {
            record.failure_reason = Some(format!(
                "chunk(s) {:?} could not be masked",
                record.failed_chunk_indices()
            ));
        }
        record.transition_to(next)?;
        self.store.save_job(&record).await?;

        tracing::info!(
            job_id = %job_id,
            state = %record.state,
            chunks_completed = record.chunks_completed,
            chunks_failed = record.chunks_failed,
            "Job finalized"
        );
        Ok(record)
    }

    /// Mark a job `Failed` with a reason
    pub async fn fail_job(&self, job_id: &JobId, reason: impl Into<String>) -> Result<JobRecord> {
        let reason = reason.into();
        self.update(job_id, |record| {
            record.transition_to(JobState::Failed)?;
            record.failure_reason = Some(reason);
            Ok(())
        })
        .await
    }

    /// Record where the output was written
    pub async fn set_output_location(
        &self,
        job_id: &JobId,
        output: impl Into<String>,
    ) -> Result<JobRecord> {
        let output = output.into();
        self.update(job_id, |record| {
            record.output_location = Some(output);
            Ok(())
        })
        .await
    }

    /// All jobs, oldest first
    pub async fn list_jobs(&self) -> Result<Vec<JobRecord>> {
        self.store.list_jobs().await
    }

    async fn load_locked(&self, job_id: &JobId) -> Result<JobRecord> {
        self.store
            .load_job(job_id)
            .await?
            .ok_or_else(|| MaskError::JobNotFound(job_id.to_string()))
    }

    async fn update<F>(&self, job_id: &JobId, f: F) -> Result<JobRecord>
    where
        F: FnOnce(&mut JobRecord) -> Result<()>,
    {
        let _guard = self.lock.lock().await;
        let mut record = self.load_locked(job_id).await?;
        f(&mut record)?;
        record.updated_at = chrono::Utc::now();
        self.store.save_job(&record).await?;
        Ok(record)
    }
}
