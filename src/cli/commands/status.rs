//! Status command implementation
//!
//! This module implements the `status` command for displaying masking jobs
//! recorded in the job ledger.

use crate::config::load_config_or_default;
use crate::core::ledger::{create_ledger_store, JobLedger, JobRecord, JobState};
use crate::domain::{JobId, MaskError};
use clap::Args;

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Show one job with its chunk records
    #[arg(long)]
    pub job_id: Option<String>,
}

impl StatusArgs {
    /// Execute the status command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!("Checking job status");

        println!("📊 Job Status");
        println!();

        let config = match load_config_or_default(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        let ledger = JobLedger::new(create_ledger_store(&config.ledger));

        if let Some(id) = &self.job_id {
            let job_id = match JobId::new(id.as_str()) {
                Ok(j) => j,
                Err(e) => {
                    println!("❌ Invalid job id: {e}");
                    return Ok(2);
                }
            };
            return match ledger.get_job_state(&job_id).await {
                Ok(record) => {
                    print_job(&record);
                    Ok(0)
                }
                Err(MaskError::JobNotFound(_)) => {
                    println!("❌ Job not found: {job_id}");
                    Ok(3)
                }
                Err(e) => {
                    println!("❌ Failed to read job ledger");
                    println!("   Error: {e}");
                    Ok(5)
                }
            };
        }

        let jobs = match ledger.list_jobs().await {
            Ok(j) => j,
            Err(e) => {
                println!("❌ Failed to read job ledger");
                println!("   Error: {e}");
                return Ok(5);
            }
        };

        if jobs.is_empty() {
            println!("No masking jobs found.");
            println!("Run 'piimask mask <INPUT>' to start a job.");
            return Ok(0);
        }

        println!("Found {} job(s):", jobs.len());
        println!();
        println!(
            "{:<36} {:<22} {:>8} {:>10} {:>8} {:<20}",
            "Job ID", "State", "Chunks", "Completed", "Failed", "Updated"
        );
        println!("{}", "-".repeat(110));

        for job in &jobs {
            println!(
                "{:<36} {:<22} {:>8} {:>10} {:>8} {:<20}",
                job.job_id.as_str(),
                state_label(job.state),
                job.total_chunks,
                job.chunks_completed,
                job.chunks_failed,
                job.updated_at.format("%Y-%m-%d %H:%M:%S")
            );
        }
        println!();

        Ok(0)
    }
}

fn state_label(state: JobState) -> &'static str {
    match state {
        JobState::Created => "⏸️  Created",
        JobState::Running => "🔄 Running",
        JobState::Completed => "✅ Completed",
        JobState::PartiallyFailed => "⚠️  Partially failed",
        JobState::Failed => "❌ Failed",
    }
}

fn print_job(record: &JobRecord) {
    println!("Job: {}", record.job_id);
    println!("  State: {}", state_label(record.state));
    println!("  Rows: {}", record.total_rows);
    println!(
        "  Chunks: {} total, {} completed, {} failed, {} pending",
        record.total_chunks,
        record.chunks_completed,
        record.chunks_failed,
        record.chunks_pending()
    );
    if let Some(source) = &record.source_file {
        println!("  Source: {source}");
    }
    if let Some(output) = &record.output_location {
        println!("  Output: {output}");
    }
    if let Some(reason) = &record.failure_reason {
        println!("  Failure: {reason}");
    }
    println!("  Created: {}", record.created_at.format("%Y-%m-%d %H:%M:%S"));
    println!("  Updated: {}", record.updated_at.format("%Y-%m-%d %H:%M:%S"));
    println!();

    if record.chunks.is_empty() {
        return;
    }

    println!(
        "{:>6} {:<15} {:<8} {:>8} {:<10} {}",
        "Chunk", "Status", "Detector", "Attempts", "Error", "Message"
    );
    println!("{}", "-".repeat(80));
    for chunk in record.chunks.values() {
        println!(
            "{:>6} {:<15} {:<8} {:>8} {:<10} {}",
            chunk.chunk_index,
            chunk.status.to_string(),
            chunk.detector_used.to_string(),
            chunk.attempt_count,
            chunk
                .last_error_class
                .map(|c| c.to_string())
                .unwrap_or_default(),
            chunk.last_error.as_deref().unwrap_or("")
        );
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_file(dir: &TempDir) -> String {
        let path = dir.path().join("piimask.toml");
        std::fs::write(
            &path,
            format!(
                "[ledger]\nbackend = \"file\"\npath = \"{}\"\n",
                dir.path().join("jobs").display()
            ),
        )
        .unwrap();
        path.to_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_status_empty_ledger() {
        let dir = TempDir::new().unwrap();
        let args = StatusArgs { job_id: None };
        assert_eq!(args.execute(&config_file(&dir)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_status_unknown_job() {
        let dir = TempDir::new().unwrap();
        let args = StatusArgs {
            job_id: Some("missing-job".to_string()),
        };
        assert_eq!(args.execute(&config_file(&dir)).await.unwrap(), 3);
    }

    #[test]
    fn test_state_labels() {
        assert!(state_label(JobState::Completed).contains("Completed"));
        assert!(state_label(JobState::Running).contains("Running"));
    }
}
