//! Ledger persistence backends

use crate::config::{LedgerBackend, LedgerConfig};
use crate::core::ledger::record::JobRecord;
use crate::core::orchestrator::ChunkResult;
use crate::domain::{JobId, MaskError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Storage backend for job records and succeeded chunk results
///
/// Implementations only store and load; state rules live in
/// [`JobRecord`] and [`crate::core::ledger::JobLedger`].
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Load a job record, `Ok(None)` if the job does not exist
    async fn load_job(&self, job_id: &JobId) -> Result<Option<JobRecord>>;

    /// Create or replace a job record
    async fn save_job(&self, record: &JobRecord) -> Result<()>;

    /// All job records, oldest first
    async fn list_jobs(&self) -> Result<Vec<JobRecord>>;

    /// Create or replace the result of one chunk
    async fn save_chunk_result(&self, job_id: &JobId, result: &ChunkResult) -> Result<()>;

    /// All stored chunk results of a job, ordered by chunk index
    async fn load_chunk_results(&self, job_id: &JobId) -> Result<Vec<ChunkResult>>;
}

/// Process-local ledger store
#[derive(Default)]
pub struct InMemoryLedgerStore {
    jobs: RwLock<HashMap<JobId, JobRecord>>,
    results: RwLock<HashMap<JobId, BTreeMap<usize, ChunkResult>>>,
}

impl InMemoryLedgerStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn load_job(&self, job_id: &JobId) -> Result<Option<JobRecord>> {
        Ok(self.jobs.read().await.get(job_id).cloned())
    }

    async fn save_job(&self, record: &JobRecord) -> Result<()> {
        self.jobs
            .write()
            .await
            .insert(record.job_id.clone(), record.clone());
        Ok(())
    }

    async fn list_jobs(&self) -> Result<Vec<JobRecord>> {
        let mut jobs: Vec<JobRecord> = self.jobs.read().await.values().cloned().collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.job_id.cmp(&b.job_id)));
        Ok(jobs)
    }

    async fn save_chunk_result(&self, job_id: &JobId, result: &ChunkResult) -> Result<()> {
        self.results
            .write()
            .await
            .entry(job_id.clone())
            .or_default()
            .insert(result.chunk_index, result.clone());
        Ok(())
    }

    async fn load_chunk_results(&self, job_id: &JobId) -> Result<Vec<ChunkResult>> {
        Ok(self
            .results
            .read()
            .await
            .get(job_id)
            .map(|r| r.values().cloned().collect())
            .unwrap_or_default())
    }
}

/// JSON file ledger store
///
/// Layout:
///
/// ```text
/// <root>/<job_id>/job.json
/// <root>/<job_id>/chunks/<chunk_index>.json
/// ```
///
/// Every write goes to a temporary file that is renamed into place, so a
/// crash never leaves a half-written document.
pub struct FileLedgerStore {
    root: PathBuf,
}

impl FileLedgerStore {
    /// Creates a store rooted at `root` (created on first write)
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of the store
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn job_dir(&self, job_id: &JobId) -> PathBuf {
        self.root.join(job_id.as_str())
    }

    fn chunks_dir(&self, job_id: &JobId) -> PathBuf {
        self.job_dir(job_id).join("chunks")
    }

    async fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                MaskError::Ledger(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }
        let body = serde_json::to_vec_pretty(value)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| MaskError::Ledger(format!("Failed to write {}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| MaskError::Ledger(format!("Failed to replace {}: {}", path.display(), e)))
    }

    async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map(Some).map_err(|e| {
                MaskError::Ledger(format!("Corrupt ledger document {}: {}", path.display(), e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(MaskError::Ledger(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn list_dir(path: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = match tokio::fs::read_dir(path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(MaskError::Ledger(format!(
                    "Failed to list {}: {}",
                    path.display(),
                    e
                )))
            }
        };
        let mut paths = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| MaskError::Ledger(format!("Failed to list {}: {}", path.display(), e)))?
        {
            paths.push(entry.path());
        }
        Ok(paths)
    }
}

#[async_trait]
impl LedgerStore for FileLedgerStore {
    async fn load_job(&self, job_id: &JobId) -> Result<Option<JobRecord>> {
        Self::read_json(&self.job_dir(job_id).join("job.json")).await
    }

    async fn save_job(&self, record: &JobRecord) -> Result<()> {
        Self::write_json(&self.job_dir(&record.job_id).join("job.json"), record).await
    }

    async fn list_jobs(&self) -> Result<Vec<JobRecord>> {
        let mut jobs = Vec::new();
        for dir in Self::list_dir(&self.root).await? {
            if !dir.is_dir() {
                continue;
            }
            if let Some(record) = Self::read_json::<JobRecord>(&dir.join("job.json")).await? {
                jobs.push(record);
            }
        }
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.job_id.cmp(&b.job_id)));
        Ok(jobs)
    }

    async fn save_chunk_result(&self, job_id: &JobId, result: &ChunkResult) -> Result<()> {
        let path = self
            .chunks_dir(job_id)
            .join(format!("{}.json", result.chunk_index));
        Self::write_json(&path, result).await
    }

    async fn load_chunk_results(&self, job_id: &JobId) -> Result<Vec<ChunkResult>> {
        let mut results = Vec::new();
        for path in Self::list_dir(&self.chunks_dir(job_id)).await? {
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(result) = Self::read_json::<ChunkResult>(&path).await? {
                results.push(result);
            }
        }
        results.sort_by_key(|r| r.chunk_index);
        Ok(results)
    }
}

/// Creates the store selected by the `[ledger]` section
pub fn create_ledger_store(config: &LedgerConfig) -> Arc<dyn LedgerStore> {
    match config.backend {
        LedgerBackend::Memory => Arc::new(InMemoryLedgerStore::new()),
        LedgerBackend::File => Arc::new(FileLedgerStore::new(&config.path)),
    }
}
