//! Core pipeline logic for piimask.
//!
//! # Modules
//!
//! - [`chunking`] - Splits rows into fixed-size ordered chunks
//! - [`orchestrator`] - Per-chunk detection with retry, fallback and a concurrency cap
//! - [`merge`] - Order-preserving reassembly of chunk results
//! - [`ledger`] - Job and chunk records with pluggable persistence
//! - [`job`] - The masking coordinator tying the pipeline together
//!
//! # Masking Workflow
//!
//! 1. **Split**: Divide the table rows into chunks of `chunk_size`
//! 2. **Register**: Create (or resume) the job in the ledger
//! 3. **Detect**: Mask every pending chunk, remote first, local as fallback
//! 4. **Record**: Persist each finished chunk and its outcome
//! 5. **Merge**: Concatenate masked rows in chunk order
//! 6. **Finalize**: Move the job to its terminal state
//!
//! # Example
//!
//! ```rust,no_run
//! use piimask::config::load_config;
//! use piimask::core::job::{MaskingCoordinator, MaskingParams};
//! use piimask::adapters::csv::{read_table_from_path, CsvOptions};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("piimask.toml")?;
//! let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//!
//! let table = read_table_from_path("comments.csv", &CsvOptions::default())?;
//! let coordinator = MaskingCoordinator::new(&config, shutdown_rx)?;
//! let params = MaskingParams::from_config(&config.job);
//!
//! let outcome = coordinator.run(None, &table, &params, Some("comments.csv")).await?;
//! println!("State: {}", outcome.summary.state);
//! # Ok(())
//! # }
//! ```

pub mod chunking;
pub mod job;
pub mod ledger;
pub mod merge;
pub mod orchestrator;
