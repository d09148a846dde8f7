//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for piimask using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// piimask - Chunked PII masking for CSV files
#[derive(Parser, Debug)]
#[command(name = "piimask")]
#[command(version, about, long_about = None)]
#[command(author = "Piimask Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "piimask.toml", env = "PIIMASK_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "PIIMASK_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Mask PII in the configured column of a delimited file
    Mask(commands::mask::MaskArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Show masking jobs recorded in the job ledger
    Status(commands::status::StatusArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}
