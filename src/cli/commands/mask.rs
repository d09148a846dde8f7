//! Mask command implementation
//!
//! This module implements the `mask` command: read a delimited file, mask
//! the configured column and write the result next to the input.

use crate::adapters::csv::{
    default_output_path, missing_rows_path, read_table_from_path, write_missing_rows,
    write_table_to_path, CsvOptions,
};
use crate::config::{load_config_or_default, FailurePolicy, MaskConfig};
use crate::core::job::{MaskingCoordinator, MaskingParams};
use crate::core::ledger::JobState;
use crate::domain::{JobId, MaskError};
use crate::log_error_with_context;
use clap::Args;
use std::path::PathBuf;
use tokio::sync::watch;

/// Arguments for the mask command
#[derive(Args, Debug)]
pub struct MaskArgs {
    /// Input file
    pub input: PathBuf,

    /// Output file (default: processed-<input name> next to the input)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Override the column to mask
    #[arg(long)]
    pub column: Option<String>,

    /// Job id; reusing an id resumes that job
    #[arg(long)]
    pub job_id: Option<String>,

    /// Override rows per chunk
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Override maximum chunks in flight
    #[arg(long)]
    pub max_concurrency: Option<usize>,

    /// Override remote retries per chunk
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Override the failure policy (fail_job or partial)
    #[arg(long, value_name = "POLICY")]
    pub failure_policy: Option<FailurePolicy>,

    /// Use only the local pattern detector
    #[arg(long)]
    pub local_only: bool,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

impl MaskArgs {
    /// Execute the mask command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!(input = %self.input.display(), "Starting mask command");

        let mut config = match load_config_or_default(config_path) {
            Ok(c) => c,
            Err(e) => {
                log_error_with_context!(e, "Failed to load configuration");
                eprintln!("Failed to load configuration: {e}");
                return Ok(2);
            }
        };
        self.apply_overrides(&mut config);

        if let Err(e) = config.validate() {
            log_error_with_context!(e, "Configuration validation failed");
            eprintln!("Configuration validation failed: {e}");
            return Ok(2);
        }
        let delimiter = match config.input.delimiter_byte() {
            Ok(d) => d,
            Err(e) => {
                eprintln!("Configuration validation failed: {e}");
                return Ok(2);
            }
        };

        let job_id = match self.job_id.as_deref().map(JobId::new).transpose() {
            Ok(id) => id,
            Err(e) => {
                eprintln!("Invalid job id: {e}");
                return Ok(2);
            }
        };

        let output = self.output.clone().unwrap_or_else(|| {
            default_output_path(&self.input, &config.input.output_prefix)
        });
        let params = MaskingParams::from_config(&config.job);

        if !self.yes {
            println!("Mask Configuration:");
            println!("  Input: {}", self.input.display());
            println!("  Output: {}", output.display());
            println!("  Column: {}", config.input.masked_column);
            println!(
                "  Detector: {}",
                if config.remote.enabled {
                    "remote with local fallback"
                } else {
                    "local patterns"
                }
            );
            println!("  Chunk size: {}", params.chunk_size);
            println!("  Max concurrency: {}", params.max_concurrency);
            println!("  Failure policy: {}", params.failure_policy);
            println!();
            print!("Proceed with masking? [y/N]: ");
            use std::io::{self, Write};
            io::stdout().flush()?;

            let mut input = String::new();
            io::stdin().read_line(&mut input)?;

            if !input.trim().eq_ignore_ascii_case("y") {
                println!("Masking cancelled.");
                return Ok(0);
            }
        }

        let options = CsvOptions {
            delimiter,
            masked_column: config.input.masked_column.clone(),
        };
        let table = match read_table_from_path(&self.input, &options) {
            Ok(t) => t,
            Err(e) => {
                log_error_with_context!(e, "Failed to read input");
                eprintln!("❌ Failed to read input: {e}");
                return Ok(exit_code(&e));
            }
        };

        let coordinator = match MaskingCoordinator::new(&config, shutdown_signal) {
            Ok(c) => c,
            Err(e) => {
                log_error_with_context!(e, "Failed to create masking coordinator");
                eprintln!("Failed to initialize masking: {e}");
                return Ok(exit_code(&e));
            }
        };

        println!("🚀 Masking {} row(s)...", table.len());
        println!();

        let source = self.input.display().to_string();
        let outcome = match coordinator.run(job_id, &table, &params, Some(&source)).await {
            Ok(o) => o,
            Err(e) => {
                log_error_with_context!(e, "Masking failed");
                eprintln!("❌ Masking failed: {e}");
                return Ok(exit_code(&e));
            }
        };
        let summary = &outcome.summary;

        if let Some(merged) = &outcome.merged {
            write_table_to_path(&output, &table.headers, &merged.rows, delimiter)?;
            if !merged.missing_rows.is_empty() {
                let sidecar = missing_rows_path(&output);
                write_missing_rows(&sidecar, &merged.missing_rows)?;
                println!("📝 Omitted row indices written to {}", sidecar.display());
            }
            coordinator
                .ledger()
                .set_output_location(&summary.job_id, output.display().to_string())
                .await?;
            println!("📝 Output written to {}", output.display());
            println!();
        }

        println!("📊 Mask Summary:");
        println!("  Job ID: {}", summary.job_id);
        println!("  State: {}", summary.state);
        println!("  Rows: {}", summary.total_rows);
        println!(
            "  Chunks: {} total, {} succeeded, {} failed, {} resumed",
            summary.total_chunks,
            summary.chunks_completed,
            summary.chunks_failed,
            summary.chunks_resumed
        );
        println!(
            "  Detectors: {} remote, {} local ({} remote call(s))",
            summary.remote_chunks, summary.local_chunks, summary.remote_attempts
        );
        println!("  Duration: {:.2}s", summary.duration.as_secs_f64());
        println!();

        if !summary.failed_chunks.is_empty() {
            println!("⚠️  Chunks that could not be masked:");
            for failure in &summary.failed_chunks {
                let class = failure
                    .error_class
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                println!("  - chunk {} ({}): {}", failure.chunk_index, class, failure.message);
            }
            println!();
        }

        let exit_code = if summary.cancelled {
            println!("⚠️  Masking interrupted. Progress saved.");
            println!("   Run again with --job-id {} to resume.", summary.job_id);
            println!();
            tracing::info!("Masking interrupted by user signal");
            130
        } else {
            match summary.state {
                JobState::Completed => {
                    println!("✅ Masking completed successfully!");
                    0
                }
                JobState::PartiallyFailed => {
                    println!("⚠️  Masking completed with omitted rows");
                    1
                }
                _ => {
                    println!("❌ Masking failed, no output written");
                    5
                }
            }
        };

        Ok(exit_code)
    }

    fn apply_overrides(&self, config: &mut MaskConfig) {
        if let Some(column) = &self.column {
            tracing::info!(column = %column, "Overriding masked column from CLI");
            config.input.masked_column = column.clone();
        }
        if let Some(chunk_size) = self.chunk_size {
            config.job.chunk_size = chunk_size;
        }
        if let Some(max_concurrency) = self.max_concurrency {
            config.job.max_concurrency = max_concurrency;
        }
        if let Some(max_retries) = self.max_retries {
            config.job.max_retries = max_retries;
        }
        if let Some(policy) = self.failure_policy {
            config.job.failure_policy = policy;
        }
        if self.local_only {
            tracing::info!("Remote detector disabled from CLI");
            config.remote.enabled = false;
        }
    }
}

/// Exit code for an error that stopped the command
pub fn exit_code(error: &MaskError) -> i32 {
    match error {
        MaskError::Configuration(_) | MaskError::InvalidConfiguration(_) => 2,
        MaskError::MissingColumn { .. } | MaskError::Input(_) => 3,
        _ => 5,
    }
}
