//! Detection orchestrator
//!
//! Runs every chunk through the per-chunk state machine: remote attempts
//! with bounded retries, then the local detector as fallback. Chunks are
//! dispatched in index order onto a `JoinSet`, at most `max_concurrency` at
//! a time. Finished chunks are written to the ledger as they complete.

use super::limiter::{ChunkPermit, ConcurrencyLimiter};
use super::outcome::{ChunkResult, ChunkStatus};
use super::retry::RetryPolicy;
use crate::core::chunking::Chunk;
use crate::core::ledger::JobLedger;
use crate::detection::{audit, tagger, Detector, DetectorKind, LocalPatternDetector, PiiSpan};
use crate::domain::{DetectorError, ErrorClass, JobId, MaskError, Result, Row};
use crate::{log_chunk_fallback, log_retry_attempt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;

/// Orchestrator settings
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Maximum chunks in flight
    pub max_concurrency: usize,

    /// Remote retry bounds and backoff
    pub retry: RetryPolicy,

    /// Upper bound on a single remote call
    pub attempt_timeout: Option<Duration>,

    /// Column whose values are masked
    pub masked_column: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            retry: RetryPolicy::default(),
            attempt_timeout: Some(Duration::from_secs(30)),
            masked_column: 0,
        }
    }
}

/// What one orchestrator run produced
#[derive(Debug, Default)]
pub struct OrchestrationOutcome {
    /// Results of chunks that reached a terminal state, by chunk index
    pub results: Vec<ChunkResult>,

    /// True if the shutdown signal stopped the run early
    pub cancelled: bool,

    /// Chunks that were not finished because of cancellation
    pub undispatched: Vec<usize>,

    /// Highest number of chunks observed in flight
    pub peak_concurrency: usize,
}

enum TaskOutput {
    Finished(ChunkResult),
    Interrupted(usize),
}

/// Detection orchestrator
///
/// The primary detector is optional; without one every chunk goes straight
/// to the local fallback with an attempt count of 0.
pub struct DetectionOrchestrator {
    processor: ChunkProcessor,
    max_concurrency: usize,
}

impl DetectionOrchestrator {
    /// Create an orchestrator
    pub fn new(
        primary: Option<Arc<dyn Detector>>,
        fallback: Arc<LocalPatternDetector>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            processor: ChunkProcessor {
                primary,
                fallback,
                retry: config.retry,
                attempt_timeout: config.attempt_timeout,
                masked_column: config.masked_column,
            },
            max_concurrency: config.max_concurrency,
        }
    }

    /// Detect and mask all `chunks`, recording outcomes in the ledger
    ///
    /// The job must already be `Running`. On cancellation no new chunks are
    /// dispatched and no new remote attempts start; chunks in flight finish
    /// and the rest are reported in `undispatched`.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be written or a chunk task
    /// panics.
    pub async fn run(
        &self,
        ledger: &JobLedger,
        job_id: &JobId,
        chunks: Vec<Chunk>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<OrchestrationOutcome> {
        let limiter = ConcurrencyLimiter::new(self.max_concurrency, "chunks");
        let mut tasks: JoinSet<TaskOutput> = JoinSet::new();
        let mut outcome = OrchestrationOutcome::default();
        let mut queue = chunks.into_iter();

        while let Some(chunk) = queue.next() {
            let permit: Option<ChunkPermit> = loop {
                if *shutdown.borrow() {
                    break None;
                }
                tokio::select! {
                    biased;
                    _ = wait_for_shutdown(&mut shutdown) => break None,
                    Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                        self.collect(ledger, job_id, joined, &mut outcome).await?;
                    }
                    permit = limiter.acquire() => break permit,
                }
            };

            let Some(permit) = permit else {
                outcome.cancelled = true;
                outcome.undispatched.push(chunk.chunk_index);
                break;
            };

            tracing::debug!(
                job_id = %job_id,
                chunk_index = chunk.chunk_index,
                limiter = limiter.label(),
                in_flight = limiter.in_flight(),
                "Dispatching chunk"
            );

            let processor = self.processor.clone();
            let task_shutdown = shutdown.clone();
            tasks.spawn(async move {
                let output = processor.process(chunk, task_shutdown).await;
                drop(permit);
                output
            });
        }

        outcome
            .undispatched
            .extend(queue.map(|chunk| chunk.chunk_index));

        while let Some(joined) = tasks.join_next().await {
            self.collect(ledger, job_id, joined, &mut outcome).await?;
        }

        outcome.results.sort_by_key(|r| r.chunk_index);
        outcome.undispatched.sort_unstable();
        outcome.peak_concurrency = limiter.peak_in_flight();

        if outcome.cancelled {
            tracing::warn!(
                job_id = %job_id,
                finished = outcome.results.len(),
                undispatched = outcome.undispatched.len(),
                "Detection interrupted by shutdown signal"
            );
        }

        Ok(outcome)
    }

    async fn collect(
        &self,
        ledger: &JobLedger,
        job_id: &JobId,
        joined: std::result::Result<TaskOutput, tokio::task::JoinError>,
        outcome: &mut OrchestrationOutcome,
    ) -> Result<()> {
        let output =
            joined.map_err(|e| MaskError::Other(format!("chunk task failed to complete: {e}")))?;

        match output {
            TaskOutput::Finished(result) => {
                // Rows are persisted before the ledger marks the chunk succeeded.
                if result.is_succeeded() {
                    ledger.save_chunk_result(job_id, &result).await?;
                }
                ledger
                    .record_chunk_outcome(job_id, result.chunk_index, &result.outcome())
                    .await?;
                outcome.results.push(result);
            }
            TaskOutput::Interrupted(chunk_index) => {
                outcome.cancelled = true;
                outcome.undispatched.push(chunk_index);
            }
        }
        Ok(())
    }
}

/// Resolves once shutdown is requested; never resolves if the sender is gone
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Per-chunk worker, cloned into each task
#[derive(Clone)]
struct ChunkProcessor {
    primary: Option<Arc<dyn Detector>>,
    fallback: Arc<LocalPatternDetector>,
    retry: RetryPolicy,
    attempt_timeout: Option<Duration>,
    masked_column: usize,
}

struct ChunkRun {
    chunk_index: usize,
    start_row_index: usize,
    row_count: usize,
    history: Vec<ChunkStatus>,
    attempt_count: u32,
    last_error: Option<String>,
    last_error_class: Option<ErrorClass>,
}

impl ChunkRun {
    fn new(chunk: &Chunk) -> Self {
        Self {
            chunk_index: chunk.chunk_index,
            start_row_index: chunk.start_row_index,
            row_count: chunk.row_count(),
            history: vec![ChunkStatus::Pending],
            attempt_count: 0,
            last_error: None,
            last_error_class: None,
        }
    }

    fn enter(&mut self, next: ChunkStatus) {
        debug_assert!(
            self.history
                .last()
                .is_some_and(|current| current.can_transition_to(next)),
            "illegal chunk transition to {next}"
        );
        self.history.push(next);
    }

    fn record_error(&mut self, class: ErrorClass, message: impl Into<String>) {
        self.last_error = Some(message.into());
        self.last_error_class = Some(class);
    }

    fn finish(mut self, detector: DetectorKind, rows: Vec<Row>) -> ChunkResult {
        self.enter(ChunkStatus::Succeeded);
        ChunkResult {
            chunk_index: self.chunk_index,
            start_row_index: self.start_row_index,
            row_count: self.row_count,
            masked_rows: rows,
            detector_used: detector,
            attempt_count: self.attempt_count,
            status: ChunkStatus::Succeeded,
            last_error: self.last_error,
            last_error_class: self.last_error_class,
            history: self.history,
        }
    }

    fn fail(mut self, message: String) -> ChunkResult {
        self.record_error(ErrorClass::Local, message);
        self.enter(ChunkStatus::ChunkFailed);
        ChunkResult {
            chunk_index: self.chunk_index,
            start_row_index: self.start_row_index,
            row_count: self.row_count,
            masked_rows: Vec::new(),
            detector_used: DetectorKind::Local,
            attempt_count: self.attempt_count,
            status: ChunkStatus::ChunkFailed,
            last_error: self.last_error,
            last_error_class: self.last_error_class,
            history: self.history,
        }
    }
}

impl ChunkProcessor {
    async fn process(&self, chunk: Chunk, mut shutdown: watch::Receiver<bool>) -> TaskOutput {
        let mut run = ChunkRun::new(&chunk);

        if *shutdown.borrow() {
            return TaskOutput::Interrupted(chunk.chunk_index);
        }

        let texts = match self.texts(&chunk) {
            Ok(texts) => texts,
            Err(message) => {
                run.enter(ChunkStatus::LocalFallback);
                tracing::error!(chunk_index = chunk.chunk_index, error = %message, "Chunk cannot be masked");
                return TaskOutput::Finished(run.fail(message));
            }
        };

        if let Some(primary) = &self.primary {
            match self.remote(primary.as_ref(), &chunk, &texts, &mut run, &mut shutdown).await {
                RemoteStep::Masked(rows) => {
                    return TaskOutput::Finished(run.finish(DetectorKind::Remote, rows));
                }
                RemoteStep::Interrupted => return TaskOutput::Interrupted(chunk.chunk_index),
                RemoteStep::GaveUp => {
                    run.enter(ChunkStatus::RemoteFailed);
                    log_chunk_fallback!(
                        chunk.chunk_index,
                        run.attempt_count,
                        run.last_error.as_deref().unwrap_or("unknown error")
                    );
                }
            }
        }

        run.enter(ChunkStatus::LocalFallback);
        let spans: Vec<Vec<PiiSpan>> = texts
            .iter()
            .map(|text| self.fallback.detect_text(text))
            .collect();
        match self.mask_rows(&chunk, &texts, &spans) {
            Ok(rows) => TaskOutput::Finished(run.finish(DetectorKind::Local, rows)),
            Err(e) => TaskOutput::Finished(run.fail(e.to_string())),
        }
    }

    async fn remote(
        &self,
        primary: &dyn Detector,
        chunk: &Chunk,
        texts: &[String],
        run: &mut ChunkRun,
        shutdown: &mut watch::Receiver<bool>,
    ) -> RemoteStep {
        let mut backoff = self.retry.backoff();
        let max_attempts = self.retry.max_attempts();

        loop {
            run.enter(ChunkStatus::RemoteAttempt);
            run.attempt_count += 1;

            let error = match self.attempt(primary, texts).await {
                Ok(spans) => match self.mask_rows(chunk, texts, &spans) {
                    Ok(rows) => return RemoteStep::Masked(rows),
                    Err(e) => DetectorError::Transient(e.to_string()),
                },
                Err(e) => e,
            };
            run.record_error(error.class(), error.message());

            if !error.is_transient() {
                tracing::warn!(
                    chunk_index = chunk.chunk_index,
                    attempt = run.attempt_count,
                    error = %error,
                    "Remote detector rejected chunk"
                );
                return RemoteStep::GaveUp;
            }

            let Some(delay) = backoff.next_delay() else {
                return RemoteStep::GaveUp;
            };

            log_retry_attempt!(
                chunk.chunk_index,
                run.attempt_count,
                max_attempts,
                delay.as_millis() as u64,
                error
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = wait_for_shutdown(shutdown) => return RemoteStep::Interrupted,
            }
            if *shutdown.borrow() {
                return RemoteStep::Interrupted;
            }
        }
    }

    async fn attempt(
        &self,
        primary: &dyn Detector,
        texts: &[String],
    ) -> std::result::Result<Vec<Vec<PiiSpan>>, DetectorError> {
        let spans = match self.attempt_timeout {
            Some(limit) => tokio::time::timeout(limit, primary.detect(texts))
                .await
                .map_err(|_| {
                    DetectorError::Transient(format!(
                        "remote attempt exceeded {} ms",
                        limit.as_millis()
                    ))
                })??,
            None => primary.detect(texts).await?,
        };

        if spans.len() != texts.len() {
            return Err(DetectorError::Transient(format!(
                "detector returned {} span set(s) for {} text(s)",
                spans.len(),
                texts.len()
            )));
        }
        Ok(spans)
    }

    /// Masked-column texts; non-UTF-8 values are sent as empty text
    fn texts(&self, chunk: &Chunk) -> std::result::Result<Vec<String>, String> {
        chunk
            .rows
            .iter()
            .map(|row| match row.field(self.masked_column) {
                Some(bytes) => Ok(std::str::from_utf8(bytes).unwrap_or_default().to_string()),
                None => Err(format!(
                    "row {} has {} field(s) and no value for the masked column",
                    row.index,
                    row.fields.len()
                )),
            })
            .collect()
    }

    fn mask_rows(&self, chunk: &Chunk, texts: &[String], spans: &[Vec<PiiSpan>]) -> Result<Vec<Row>> {
        chunk
            .rows
            .iter()
            .zip(texts)
            .zip(spans)
            .map(|((row, text), spans)| {
                audit::log_detections(text, spans);
                let field = row.field(self.masked_column).unwrap_or_default();
                row.with_field(self.masked_column, tagger::apply_spans_bytes(field, spans))
            })
            .collect()
    }
}

enum RemoteStep {
    Masked(Vec<Row>),
    GaveUp,
    Interrupted,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::chunking::split_rows;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tokio::time::Instant;

    struct AlwaysFails {
        error: DetectorError,
        calls: AtomicU32,
    }

    #[async_trait]
    impl Detector for AlwaysFails {
        fn kind(&self) -> DetectorKind {
            DetectorKind::Remote
        }

        async fn detect(
            &self,
            _texts: &[String],
        ) -> std::result::Result<Vec<Vec<PiiSpan>>, DetectorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(self.error.clone())
        }
    }

    /// Always transient; remembers when each call arrived
    #[derive(Default)]
    struct TimedFailures {
        calls: Mutex<Vec<Instant>>,
    }

    #[async_trait]
    impl Detector for TimedFailures {
        fn kind(&self) -> DetectorKind {
            DetectorKind::Remote
        }

        async fn detect(
            &self,
            _texts: &[String],
        ) -> std::result::Result<Vec<Vec<PiiSpan>>, DetectorError> {
            self.calls.lock().unwrap().push(Instant::now());
            Err(DetectorError::Transient("HTTP 503".to_string()))
        }
    }

    fn rows() -> Vec<Row> {
        vec![
            Row::from_strs(0, &["1", "email: a@b.com"]),
            Row::from_strs(1, &["2", "card 4111111111111111"]),
        ]
    }

    fn orchestrator(primary: Option<Arc<dyn Detector>>, retries: u32) -> DetectionOrchestrator {
        DetectionOrchestrator::new(
            primary,
            Arc::new(LocalPatternDetector::new().unwrap()),
            OrchestratorConfig {
                max_concurrency: 2,
                retry: RetryPolicy::immediate(retries),
                attempt_timeout: Some(Duration::from_secs(5)),
                masked_column: 1,
            },
        )
    }

    async fn running_job(ledger: &JobLedger, chunks: usize) -> JobId {
        let job_id = ledger.create_job(chunks).await.unwrap();
        ledger.mark_running(&job_id).await.unwrap();
        job_id
    }

    #[tokio::test]
    async fn test_local_only_masks_every_chunk() {
        let ledger = JobLedger::in_memory();
        let chunks = split_rows(rows(), 1).unwrap();
        let job_id = running_job(&ledger, chunks.len()).await;
        let (_tx, rx) = watch::channel(false);

        let outcome = orchestrator(None, 3)
            .run(&ledger, &job_id, chunks, rx)
            .await
            .unwrap();

        assert!(!outcome.cancelled);
        assert_eq!(outcome.results.len(), 2);
        let first = &outcome.results[0];
        assert_eq!(first.attempt_count, 0);
        assert_eq!(first.detector_used, DetectorKind::Local);
        assert_eq!(
            first.history,
            vec![ChunkStatus::Pending, ChunkStatus::LocalFallback, ChunkStatus::Succeeded]
        );
        assert_eq!(first.masked_rows[0].field_str(1), Some("email: <PII_EMAIL>"));
    }

    #[tokio::test]
    async fn test_transient_exhausts_retries_then_falls_back() {
        let ledger = JobLedger::in_memory();
        let chunks = split_rows(rows(), 2).unwrap();
        let job_id = running_job(&ledger, 1).await;
        let remote = Arc::new(AlwaysFails {
            error: DetectorError::Transient("HTTP 503".to_string()),
            calls: AtomicU32::new(0),
        });
        let (_tx, rx) = watch::channel(false);

        let outcome = orchestrator(Some(remote.clone()), 3)
            .run(&ledger, &job_id, chunks, rx)
            .await
            .unwrap();

        assert_eq!(remote.calls.load(Ordering::SeqCst), 4);
        let result = &outcome.results[0];
        assert_eq!(result.attempt_count, 4);
        assert_eq!(result.detector_used, DetectorKind::Local);
        assert_eq!(result.last_error_class, Some(ErrorClass::Transient));
        assert_eq!(
            result.history.iter().filter(|s| **s == ChunkStatus::RemoteAttempt).count(),
            4
        );
        assert!(result.history.contains(&ChunkStatus::RemoteFailed));
    }

    #[tokio::test]
    async fn test_permanent_error_stops_after_one_attempt() {
        let ledger = JobLedger::in_memory();
        let chunks = split_rows(rows(), 2).unwrap();
        let job_id = running_job(&ledger, 1).await;
        let remote = Arc::new(AlwaysFails {
            error: DetectorError::Permanent("HTTP 401".to_string()),
            calls: AtomicU32::new(0),
        });
        let (_tx, rx) = watch::channel(false);

        let outcome = orchestrator(Some(remote.clone()), 3)
            .run(&ledger, &job_id, chunks, rx)
            .await
            .unwrap();

        assert_eq!(remote.calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.results[0].attempt_count, 1);
        assert_eq!(outcome.results[0].last_error_class, Some(ErrorClass::Permanent));
    }

    #[tokio::test]
    async fn test_row_without_masked_column_fails_chunk() {
        let ledger = JobLedger::in_memory();
        let rows = vec![Row::from_strs(0, &["1"]), Row::from_strs(1, &["2", "ok"])];
        let chunks = split_rows(rows, 1).unwrap();
        let job_id = running_job(&ledger, 2).await;
        let (_tx, rx) = watch::channel(false);

        let outcome = orchestrator(None, 0)
            .run(&ledger, &job_id, chunks, rx)
            .await
            .unwrap();

        let failed = &outcome.results[0];
        assert_eq!(failed.status, ChunkStatus::ChunkFailed);
        assert_eq!(failed.last_error_class, Some(ErrorClass::Local));
        assert!(failed.masked_rows.is_empty());
        assert_eq!(outcome.results[1].status, ChunkStatus::Succeeded);

        let record = ledger.get_job_state(&job_id).await.unwrap();
        assert_eq!(record.chunks_failed, 1);
        assert_eq!(record.chunks_completed, 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_dispatches_nothing() {
        let ledger = JobLedger::in_memory();
        let chunks = split_rows(rows(), 1).unwrap();
        let job_id = running_job(&ledger, 2).await;
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        let outcome = orchestrator(None, 0)
            .run(&ledger, &job_id, chunks, rx)
            .await
            .unwrap();

        assert!(outcome.cancelled);
        assert!(outcome.results.is_empty());
        assert_eq!(outcome.undispatched, vec![0, 1]);
        assert_eq!(ledger.get_job_state(&job_id).await.unwrap().chunks_completed, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_gaps_never_shrink() {
        let ledger = JobLedger::in_memory();
        let chunks = split_rows(rows(), 2).unwrap();
        let job_id = running_job(&ledger, 1).await;
        let remote = Arc::new(TimedFailures::default());
        let policy = RetryPolicy {
            max_retries: 4,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(40),
            jitter: Duration::from_millis(15),
        };
        let orchestrator = DetectionOrchestrator::new(
            Some(remote.clone()),
            Arc::new(LocalPatternDetector::new().unwrap()),
            OrchestratorConfig {
                max_concurrency: 1,
                retry: policy,
                attempt_timeout: Some(Duration::from_secs(5)),
                masked_column: 1,
            },
        );
        let (_tx, rx) = watch::channel(false);

        let outcome = orchestrator.run(&ledger, &job_id, chunks, rx).await.unwrap();

        let calls = remote.calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 5);
        // Timer deadlines round up to the next millisecond.
        let gaps: Vec<u128> = calls
            .windows(2)
            .map(|w| (w[1] - w[0]).as_millis())
            .collect();
        assert!(gaps[0] >= policy.base_delay.as_millis());
        assert!(gaps.windows(2).all(|w| w[1] >= w[0]), "gaps shrank: {gaps:?}");
        let ceiling = (policy.max_delay + policy.jitter).as_millis();
        assert!(gaps.iter().all(|g| *g <= ceiling), "gap above cap: {gaps:?}");
        assert_eq!(outcome.results[0].detector_used, DetectorKind::Local);
        assert_eq!(outcome.results[0].attempt_count, 5);
    }

    #[tokio::test]
    async fn test_non_utf8_cell_passes_through_unchanged() {
        let ledger = JobLedger::in_memory();
        let raw = vec![0xff, b' ', b'a', b'@', b'b', b'.', b'c', b'o', b'm'];
        let rows = vec![Row::new(0, vec![b"1".to_vec(), raw.clone()])];
        let chunks = split_rows(rows, 1).unwrap();
        let job_id = running_job(&ledger, 1).await;
        let (_tx, rx) = watch::channel(false);

        let outcome = orchestrator(None, 0)
            .run(&ledger, &job_id, chunks, rx)
            .await
            .unwrap();

        let result = &outcome.results[0];
        assert_eq!(result.status, ChunkStatus::Succeeded);
        assert_eq!(result.masked_rows[0].field(1), Some(raw.as_slice()));
    }
}
