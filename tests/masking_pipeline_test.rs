//! Integration tests for the masking pipeline
//!
//! These tests verify that:
//! - Every input row appears exactly once, in order, with only the masked
//!   column changed
//! - Remote failures fall back to the local detector
//! - Failed chunks follow the failure policy
//! - Jobs resume from the ledger and survive interruption

use async_trait::async_trait;
use fake::faker::internet::en::SafeEmail;
use fake::faker::lorem::en::Sentence;
use fake::faker::name::en::FirstName;
use fake::Fake;
use piimask::config::{FailurePolicy, RetryConfig};
use piimask::core::job::{MaskingCoordinator, MaskingParams};
use piimask::core::ledger::{FileLedgerStore, JobLedger, JobRecordBuilder, JobState};
use piimask::core::orchestrator::{ChunkResult, ChunkStatus};
use piimask::detection::{Detector, DetectorKind, LocalPatternDetector, PiiSpan};
use piimask::domain::{DetectorError, ErrorClass, JobId, Row, Table};
use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

/// Remote detector that fails every call with the configured error
struct FailingDetector {
    error: DetectorError,
    calls: AtomicUsize,
}

impl FailingDetector {
    fn new(error: DetectorError) -> Arc<Self> {
        Arc::new(Self {
            error,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Detector for FailingDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Remote
    }

    async fn detect(&self, _texts: &[String]) -> Result<Vec<Vec<PiiSpan>>, DetectorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }
}

/// Remote detector backed by the local patterns, with random latency
struct JitteryDetector {
    patterns: LocalPatternDetector,
    max_delay_ms: u64,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl JitteryDetector {
    fn new(max_delay_ms: u64) -> Arc<Self> {
        Arc::new(Self {
            patterns: LocalPatternDetector::new().unwrap(),
            max_delay_ms,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Detector for JitteryDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Remote
    }

    async fn detect(&self, texts: &[String]) -> Result<Vec<Vec<PiiSpan>>, DetectorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let delay = rand::thread_rng().gen_range(0..=self.max_delay_ms);
        tokio::time::sleep(Duration::from_millis(delay)).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|t| {
                self.patterns
                    .detect_text(t)
                    .into_iter()
                    .map(|s| PiiSpan { source: DetectorKind::Remote, ..s })
                    .collect()
            })
            .collect())
    }
}

/// Remote detector that requests shutdown on its first call and then fails
struct ShutdownDetector {
    shutdown: Mutex<Option<watch::Sender<bool>>>,
}

#[async_trait]
impl Detector for ShutdownDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Remote
    }

    async fn detect(&self, _texts: &[String]) -> Result<Vec<Vec<PiiSpan>>, DetectorError> {
        if let Some(tx) = self.shutdown.lock().unwrap().as_ref() {
            tx.send(true).unwrap();
        }
        Err(DetectorError::Transient("HTTP 503".to_string()))
    }
}

fn no_delay() -> RetryConfig {
    RetryConfig {
        base_delay_ms: 0,
        max_delay_ms: 0,
        jitter_ms: 0,
    }
}

fn table(rows: Vec<Vec<String>>) -> Table {
    let rows = rows
        .into_iter()
        .enumerate()
        .map(|(i, fields)| Row::from_strs(i, &fields))
        .collect();
    Table::new(
        vec![b"Id".to_vec(), b"Comments".to_vec(), b"Region".to_vec()],
        "Comments",
        rows,
    )
    .unwrap()
}

fn coordinator(
    ledger: Arc<JobLedger>,
    primary: Option<Arc<dyn Detector>>,
) -> (MaskingCoordinator, watch::Sender<bool>) {
    let (tx, rx) = watch::channel(false);
    let coordinator = MaskingCoordinator::with_components(
        ledger,
        primary,
        Arc::new(LocalPatternDetector::new().unwrap()),
        no_delay(),
        rx,
    );
    (coordinator, tx)
}

fn params(chunk_size: usize, max_concurrency: usize, max_retries: u32) -> MaskingParams {
    MaskingParams {
        chunk_size,
        max_concurrency,
        max_retries,
        failure_policy: FailurePolicy::FailJob,
    }
}

fn fake_rows(count: usize) -> Vec<Vec<String>> {
    (0..count)
        .map(|i| {
            let sentence: String = Sentence(2..5).fake();
            let comment = match i % 3 {
                0 => format!("{} contact {}", sentence, SafeEmail().fake::<String>()),
                1 => format!("{} card 4111111111111111", sentence),
                _ => sentence,
            };
            vec![i.to_string(), comment, FirstName().fake::<String>()]
        })
        .collect()
}

#[tokio::test]
async fn test_transient_remote_falls_back_to_local() {
    let ledger = Arc::new(JobLedger::in_memory());
    let remote = FailingDetector::new(DetectorError::Transient("HTTP 503".to_string()));
    let (coordinator, _tx) = coordinator(ledger.clone(), Some(remote.clone()));
    let input = Table::new(
        vec![b"Id".to_vec(), b"Comments".to_vec()],
        "Comments",
        vec![
            Row::from_strs(0, &["1", "email: a@b.com"]),
            Row::from_strs(1, &["2", "card 4111111111111111"]),
        ],
    )
    .unwrap();

    let outcome = coordinator
        .run(None, &input, &params(1, 8, 3), None)
        .await
        .unwrap();

    let rows = outcome.merged.unwrap().rows;
    assert_eq!(rows[0].field_str(0), Some("1"));
    assert_eq!(rows[0].field_str(1), Some("email: <PII_EMAIL>"));
    assert_eq!(rows[1].field_str(0), Some("2"));
    assert_eq!(rows[1].field_str(1), Some("card <PII_CREDIT_CARD>"));

    assert_eq!(outcome.summary.state, JobState::Completed);
    assert_eq!(outcome.summary.chunks_completed, 2);
    assert_eq!(outcome.summary.local_chunks, 2);
    assert_eq!(remote.calls.load(Ordering::SeqCst), 8);

    let record = ledger.get_job_state(&outcome.summary.job_id).await.unwrap();
    assert_eq!(record.state, JobState::Completed);
    assert_eq!(record.chunks_completed, 2);
    for chunk in record.chunks.values() {
        assert_eq!(chunk.detector_used, DetectorKind::Local);
        assert_eq!(chunk.attempt_count, 4);
        assert_eq!(chunk.last_error_class, Some(ErrorClass::Transient));
    }
}

#[tokio::test]
async fn test_permanent_error_makes_one_attempt_per_chunk() {
    let ledger = Arc::new(JobLedger::in_memory());
    let remote = FailingDetector::new(DetectorError::Permanent("HTTP 401".to_string()));
    let (coordinator, _tx) = coordinator(ledger, Some(remote.clone()));
    let input = table(fake_rows(9));

    let outcome = coordinator
        .run(None, &input, &params(3, 2, 3), None)
        .await
        .unwrap();

    assert_eq!(outcome.summary.state, JobState::Completed);
    assert_eq!(remote.calls.load(Ordering::SeqCst), 3);
    assert_eq!(outcome.summary.remote_attempts, 3);
}

#[tokio::test]
async fn test_rows_conserved_and_only_masked_column_changes() {
    let ledger = Arc::new(JobLedger::in_memory());
    let (coordinator, _tx) = coordinator(ledger, None);
    let raw = fake_rows(137);
    let input = table(raw.clone());

    for chunk_size in [1, 7, 50, 137, 500] {
        let outcome = coordinator
            .run(None, &input, &params(chunk_size, 4, 0), None)
            .await
            .unwrap();
        let rows = outcome.merged.unwrap().rows;

        assert_eq!(rows.len(), raw.len(), "chunk_size={chunk_size}");
        for (i, (row, original)) in rows.iter().zip(&raw).enumerate() {
            assert_eq!(row.index, i);
            assert_eq!(row.field_str(0), Some(original[0].as_str()));
            assert_eq!(row.field_str(2), Some(original[2].as_str()));
            let masked = row.field_str(1).unwrap();
            assert!(!masked.contains('@'), "unmasked email in {masked}");
            assert!(!masked.contains("4111111111111111"));
        }
    }
}

#[tokio::test]
async fn test_masking_masked_output_is_a_no_op() {
    let ledger = Arc::new(JobLedger::in_memory());
    let (coordinator, _tx) = coordinator(ledger, None);

    let first = coordinator
        .run(None, &table(fake_rows(20)), &params(6, 3, 0), None)
        .await
        .unwrap();
    let masked_rows = first.merged.unwrap().rows;
    let masked = Table::new(
        vec![b"Id".to_vec(), b"Comments".to_vec(), b"Region".to_vec()],
        "Comments",
        masked_rows.clone(),
    )
    .unwrap();

    let second = coordinator
        .run(None, &masked, &params(6, 3, 0), None)
        .await
        .unwrap();
    assert_eq!(second.merged.unwrap().rows, masked_rows);
}

#[tokio::test]
async fn test_order_preserved_under_random_completion() {
    let ledger = Arc::new(JobLedger::in_memory());
    let remote = JitteryDetector::new(15);
    let (coordinator, _tx) = coordinator(ledger, Some(remote.clone()));
    let raw = fake_rows(60);
    let input = table(raw.clone());

    let outcome = coordinator
        .run(None, &input, &params(2, 5, 0), None)
        .await
        .unwrap();

    assert_eq!(outcome.summary.remote_chunks, 30);
    assert!(outcome.summary.peak_concurrency <= 5);
    assert!(remote.peak.load(Ordering::SeqCst) <= 5);

    let rows = outcome.merged.unwrap().rows;
    let ids: Vec<&str> = rows.iter().map(|r| r.field_str(0).unwrap()).collect();
    let expected: Vec<&str> = raw.iter().map(|r| r[0].as_str()).collect();
    assert_eq!(ids, expected);
}

#[tokio::test]
async fn test_partial_policy_omits_failed_rows() {
    let ledger = Arc::new(JobLedger::in_memory());
    let (coordinator, _tx) = coordinator(ledger.clone(), None);
    let mut raw = fake_rows(6);
    raw[3].truncate(1);
    let input = table(raw);

    let params = MaskingParams {
        failure_policy: FailurePolicy::Partial,
        ..params(2, 2, 0)
    };
    let outcome = coordinator.run(None, &input, &params, None).await.unwrap();

    assert_eq!(outcome.summary.state, JobState::PartiallyFailed);
    assert_eq!(outcome.summary.chunks_failed, 1);
    assert_eq!(outcome.summary.missing_rows, vec![2, 3]);
    assert_eq!(outcome.summary.failed_chunks[0].chunk_index, 1);
    assert_eq!(
        outcome.summary.failed_chunks[0].error_class,
        Some(ErrorClass::Local)
    );

    let merged = outcome.merged.unwrap();
    let indices: Vec<usize> = merged.rows.iter().map(|r| r.index).collect();
    assert_eq!(indices, vec![0, 1, 4, 5]);
}

#[tokio::test]
async fn test_fail_job_policy_produces_no_output() {
    let ledger = Arc::new(JobLedger::in_memory());
    let (coordinator, _tx) = coordinator(ledger.clone(), None);
    let mut raw = fake_rows(4);
    raw[0].truncate(1);

    let outcome = coordinator
        .run(None, &table(raw), &params(2, 2, 0), None)
        .await
        .unwrap();

    assert_eq!(outcome.summary.state, JobState::Failed);
    assert!(outcome.merged.is_none());
    let record = ledger.get_job_state(&outcome.summary.job_id).await.unwrap();
    assert_eq!(record.state, JobState::Failed);
    assert!(record.failure_reason.unwrap().contains('0'));
}

#[tokio::test]
async fn test_resume_reuses_succeeded_chunks() {
    let dir = tempfile::TempDir::new().unwrap();
    let ledger = Arc::new(JobLedger::new(Arc::new(FileLedgerStore::new(dir.path()))));
    let input = table(fake_rows(6));
    let job_id = JobId::new("resume-job").unwrap();

    // An earlier run finished chunk 0 only.
    let record = JobRecordBuilder::new(job_id.clone(), 3)
        .total_rows(6)
        .input_fingerprint(input.fingerprint())
        .build();
    ledger.register(record).await.unwrap();
    ledger.mark_running(&job_id).await.unwrap();
    let earlier = ChunkResult {
        chunk_index: 0,
        start_row_index: 0,
        row_count: 2,
        masked_rows: vec![
            Row::from_strs(0, &["0", "<PII_NAME>", "r"]),
            Row::from_strs(1, &["1", "<PII_NAME>", "r"]),
        ],
        detector_used: DetectorKind::Local,
        attempt_count: 0,
        status: ChunkStatus::Succeeded,
        last_error: None,
        last_error_class: None,
        history: vec![
            ChunkStatus::Pending,
            ChunkStatus::LocalFallback,
            ChunkStatus::Succeeded,
        ],
    };
    ledger.save_chunk_result(&job_id, &earlier).await.unwrap();
    ledger
        .record_chunk_outcome(&job_id, 0, &earlier.outcome())
        .await
        .unwrap();

    let remote = JitteryDetector::new(0);
    let (coordinator, _tx) = coordinator(ledger.clone(), Some(remote.clone()));
    let outcome = coordinator
        .run(Some(job_id.clone()), &input, &params(2, 2, 0), None)
        .await
        .unwrap();

    assert_eq!(outcome.summary.state, JobState::Completed);
    assert_eq!(outcome.summary.chunks_resumed, 1);
    assert_eq!(remote.calls.load(Ordering::SeqCst), 2);

    let rows = outcome.merged.unwrap().rows;
    assert_eq!(rows.len(), 6);
    assert_eq!(rows[0].field_str(1), Some("<PII_NAME>"));
    assert_eq!(rows[2].field_str(0), Some("2"));
}

#[tokio::test]
async fn test_cancellation_leaves_job_running_and_resumable() {
    let dir = tempfile::TempDir::new().unwrap();
    let ledger = Arc::new(JobLedger::new(Arc::new(FileLedgerStore::new(dir.path()))));
    let input = table(fake_rows(6));
    let job_id = JobId::new("cancel-job").unwrap();

    let (tx, rx) = watch::channel(false);
    let remote = Arc::new(ShutdownDetector {
        shutdown: Mutex::new(Some(tx)),
    });
    let interrupted = MaskingCoordinator::with_components(
        ledger.clone(),
        Some(remote),
        Arc::new(LocalPatternDetector::new().unwrap()),
        no_delay(),
        rx,
    );

    let outcome = interrupted
        .run(Some(job_id.clone()), &input, &params(2, 1, 3), None)
        .await
        .unwrap();

    assert!(outcome.summary.cancelled);
    assert!(outcome.merged.is_none());
    let record = ledger.get_job_state(&job_id).await.unwrap();
    assert_eq!(record.state, JobState::Running);
    assert_eq!(record.chunks_completed, 0);
    assert!(ledger.load_chunk_results(&job_id).await.unwrap().is_empty());

    let (resumed, _tx) = coordinator(ledger.clone(), None);
    let outcome = resumed
        .run(Some(job_id.clone()), &input, &params(2, 1, 3), None)
        .await
        .unwrap();

    assert_eq!(outcome.summary.state, JobState::Completed);
    assert_eq!(outcome.merged.unwrap().rows.len(), 6);
}
