// Piimask - Chunked PII masking for CSV files
// Copyright (c) 2025 Piimask Contributors
// Licensed under the MIT License

//! # piimask - Chunked PII masking for CSV files
//!
//! piimask replaces personally identifiable information in one text column
//! of a delimited file with placeholder tags such as `<PII_EMAIL>`, leaving
//! every other field byte-identical and every row in its original position.
//!
//! ## Overview
//!
//! The input is split into fixed-size chunks that are masked in parallel.
//! Each chunk goes to a remote semantic detector first, with bounded retries
//! and exponential backoff, and falls back to a deterministic local pattern
//! detector when the remote one gives up. A job ledger records every chunk
//! outcome so an interrupted job can be resumed.
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Chunking, orchestration, merge, job ledger and coordinator
//! - [`detection`] - Detector trait, local pattern detector, placeholder tagger
//! - [`adapters`] - CSV input/output and the remote detector HTTP client
//! - [`domain`] - Core domain types and errors
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use piimask::adapters::csv::{read_table_from_path, CsvOptions};
//! use piimask::config::MaskConfig;
//! use piimask::core::job::{MaskingCoordinator, MaskingParams};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = MaskConfig::default();
//!     let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//!
//!     let table = read_table_from_path("comments.csv", &CsvOptions::default())?;
//!     let coordinator = MaskingCoordinator::new(&config, shutdown_rx)?;
//!     let outcome = coordinator
//!         .run(None, &table, &MaskingParams::default(), Some("comments.csv"))
//!         .await?;
//!
//!     println!("Job {} is {}", outcome.summary.job_id, outcome.summary.state);
//!     Ok(())
//! }
//! ```
//!
//! ## Local Detection
//!
//! The local detector can be used on its own:
//!
//! ```rust
//! use piimask::detection::LocalPatternDetector;
//!
//! # fn example() -> anyhow::Result<()> {
//! let detector = LocalPatternDetector::new()?;
//! assert_eq!(detector.mask_text("mail a@b.com"), "mail <PII_EMAIL>");
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Library operations return [`domain::Result`], whose error type is
//! [`domain::MaskError`]. Detector failures are [`domain::DetectorError`]
//! values that stay inside the orchestrator and surface only as ledger
//! state.

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod detection;
pub mod domain;
pub mod logging;
