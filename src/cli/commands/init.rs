//! Init command implementation
//!
//! This module implements the `init` command for generating a sample
//! configuration file.

use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = "piimask.toml")]
    pub output: String,

    /// Include example values and comments
    #[arg(long)]
    pub with_examples: bool,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        println!("📝 Initializing piimask configuration");
        println!();

        if Path::new(&self.output).exists() && !self.force {
            println!("❌ Configuration file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(2);
        }

        let config_content = if self.with_examples {
            Self::generate_config_with_examples()
        } else {
            Self::generate_minimal_config()
        };

        match fs::write(&self.output, config_content) {
            Ok(_) => {
                println!("✅ Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Edit {} with your settings", self.output);
                println!("  2. To use a remote detector, set [remote] endpoint and enabled = true");
                println!("     and put the API key in PIIMASK_REMOTE_API_KEY (or a .env file)");
                println!("  3. Validate configuration: piimask validate-config");
                println!("  4. Mask a file: piimask mask comments.csv");
                println!();
                Ok(0)
            }
            Err(e) => {
                println!("❌ Failed to write configuration file");
                println!("   Error: {e}");
                Ok(5)
            }
        }
    }

    /// Generate minimal configuration
    fn generate_minimal_config() -> String {
        r#"# piimask configuration

[application]
log_level = "info"

[input]
masked_column = "Comments"
delimiter = ","

[job]
chunk_size = 100
max_concurrency = 8
max_retries = 3
failure_policy = "fail_job"

[remote]
enabled = false

[ledger]
backend = "file"
path = ".piimask/jobs"
"#
        .to_string()
    }

    /// Generate configuration with examples
    fn generate_config_with_examples() -> String {
        r#"# piimask configuration
# Chunked PII masking for CSV files

# ============================================================================
# Application Settings
# ============================================================================
[application]
# Log level: trace, debug, info, warn, error
log_level = "info"

# ============================================================================
# Input Settings
# ============================================================================
[input]
# Header name of the column whose values are masked
masked_column = "Comments"

# Field delimiter (single character; "\t" or "tab" for tab-separated files)
delimiter = ","

# Output is written next to the input as <output_prefix><input name>
output_prefix = "processed-"

# ============================================================================
# Job Settings
# ============================================================================
[job]
# Rows per chunk (1-100000)
chunk_size = 100

# Chunks processed at the same time (1-256)
max_concurrency = 8

# Remote retries per chunk after the first attempt (0-10)
max_retries = 3

# What to do with chunks no detector could mask:
#   fail_job - the job fails and no output is written
#   partial  - rows of failed chunks are left out and listed in
#              <output>.missing-rows.txt
failure_policy = "fail_job"

# ============================================================================
# Retry Backoff
# ============================================================================
[retry]
# Delay before the first retry; doubles on each further retry
base_delay_ms = 500

# Upper bound of the delay
max_delay_ms = 8000

# Random jitter added to each delay
jitter_ms = 250

# ============================================================================
# Remote Semantic Detector
# ============================================================================
[remote]
enabled = false
# endpoint = "https://detector.example.com/v1/detect"
# api_key = "${PIIMASK_DETECTOR_KEY}"
timeout_seconds = 30

# Response body format: spans or annotated_text
response_format = "spans"

# ============================================================================
# Local Pattern Detector
# ============================================================================
[local]
# Custom pattern library (built-in library when unset)
# pattern_library = "patterns/custom.toml"

# Enabled categories (all when empty)
# categories = ["EMAIL", "PHONE", "CREDIT_CARD"]

# Terms that are never masked
allow_list = []

# Terms that are always masked as SENSITIVE
deny_list = []

# ============================================================================
# Job Ledger
# ============================================================================
[ledger]
# memory (lost on exit) or file (resumable)
backend = "file"
path = ".piimask/jobs"

# ============================================================================
# Logging Configuration
# ============================================================================
[logging]
# Enable local JSON file logging
local_enabled = false

# Local log directory
local_path = "./logs"

# Log rotation: daily, hourly or never
local_rotation = "daily"
"#
        .to_string()
    }
}
