//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the piimask configuration file.

use crate::config::load_config;
use crate::detection::LocalPatternDetector;
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        let config = match load_config(config_path) {
            Ok(c) => {
                println!("✅ Configuration file loaded successfully");
                c
            }
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        if let Err(e) = config.validate() {
            println!("❌ Configuration validation failed");
            println!("   Error: {e}");
            println!();
            return Ok(2);
        }

        // The pattern library is only parsed when the detector is built.
        let detector = match LocalPatternDetector::from_config(&config.local) {
            Ok(d) => d,
            Err(e) => {
                println!("❌ Local pattern library is invalid");
                println!("   Error: {e:#}");
                println!();
                return Ok(2);
            }
        };

        println!("✅ Configuration is valid");
        println!();
        println!("Configuration Summary:");
        println!("  Log Level: {}", config.application.log_level);
        println!("  Masked Column: {}", config.input.masked_column);
        println!("  Delimiter: {:?}", config.input.delimiter);
        println!("  Chunk Size: {}", config.job.chunk_size);
        println!("  Max Concurrency: {}", config.job.max_concurrency);
        println!("  Max Retries: {}", config.job.max_retries);
        println!("  Failure Policy: {}", config.job.failure_policy);
        println!(
            "  Backoff: {}ms base, {}ms cap, {}ms jitter",
            config.retry.base_delay_ms, config.retry.max_delay_ms, config.retry.jitter_ms
        );
        if config.remote.enabled {
            println!(
                "  Remote Detector: {}",
                config.remote.endpoint.as_deref().unwrap_or("(none)")
            );
            println!(
                "  Remote API Key: {}",
                if config.remote.api_key.is_some() {
                    "set"
                } else {
                    "not set"
                }
            );
        } else {
            println!("  Remote Detector: disabled");
        }
        println!("  Local Matchers: {}", detector.matcher_count());
        println!("  Ledger: {:?} at {}", config.ledger.backend, config.ledger.path);
        println!();
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_validate_valid_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("piimask.toml");
        std::fs::write(&path, "[job]\nchunk_size = 50\n").unwrap();

        let code = ValidateArgs {}.execute(path.to_str().unwrap()).await.unwrap();
        assert_eq!(code, 0);
    }

    #[tokio::test]
    async fn test_validate_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.toml");

        let code = ValidateArgs {}.execute(path.to_str().unwrap()).await.unwrap();
        assert_eq!(code, 2);
    }

    #[tokio::test]
    async fn test_validate_unknown_category() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("piimask.toml");
        std::fs::write(&path, "[local]\ncategories = [\"SHOE_SIZE\"]\n").unwrap();

        let code = ValidateArgs {}.execute(path.to_str().unwrap()).await.unwrap();
        assert_eq!(code, 2);
    }
}
