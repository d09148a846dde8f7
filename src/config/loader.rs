//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::MaskConfig;
use crate::config::secret_string;
use crate::domain::errors::MaskError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into MaskConfig
/// 4. Applies environment variable overrides (PIIMASK_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns an error if:
/// - File cannot be read
/// - TOML parsing fails
/// - A referenced environment variable is not set
/// - Configuration validation fails
///
/// # Examples
///
/// ```no_run
/// use piimask::config::loader::load_config;
///
/// let config = load_config("piimask.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<MaskConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MaskError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        MaskError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    parse_config(&contents)
}

/// Loads the configuration file if it exists, defaults otherwise
///
/// Environment overrides and validation are applied in both cases.
pub fn load_config_or_default(path: impl AsRef<Path>) -> Result<MaskConfig> {
    let path = path.as_ref();
    if path.exists() {
        return load_config(path);
    }

    tracing::debug!(path = %path.display(), "No configuration file, using defaults");
    let mut config = MaskConfig::default();
    apply_env_overrides(&mut config)?;
    validate(&config)?;
    Ok(config)
}

/// Parses configuration from TOML text
pub fn parse_config(contents: &str) -> Result<MaskConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: MaskConfig = toml::from_str(&contents)
        .map_err(|e| MaskError::Configuration(format!("Failed to parse TOML: {}", e)))?;

    apply_env_overrides(&mut config)?;
    validate(&config)?;

    Ok(config)
}

fn validate(config: &MaskConfig) -> Result<()> {
    config.validate().map_err(|e| {
        MaskError::Configuration(format!("Configuration validation failed: {}", e))
    })
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// # Errors
///
/// Returns an error if a referenced environment variable is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| MaskError::Other(format!("Invalid substitution pattern: {e}")))?;
    let mut result = String::new();
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        let trimmed = line.trim_start();

        // Skip comment lines - don't process env vars in comments
        if trimmed.starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    let placeholder = format!("${{{}}}", var_name);
                    processed_line = processed_line.replace(&placeholder, &value);
                }
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        result.push_str(&processed_line);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(MaskError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

fn parse_env<T: std::str::FromStr>(name: &str, val: &str) -> Result<T> {
    val.parse().map_err(|_| {
        MaskError::Configuration(format!("Invalid value '{val}' for environment variable {name}"))
    })
}

/// Applies environment variable overrides using PIIMASK_* prefix
///
/// Environment variables follow the pattern: PIIMASK_<SECTION>_<KEY>
/// For example: PIIMASK_JOB_CHUNK_SIZE, PIIMASK_REMOTE_ENDPOINT
fn apply_env_overrides(config: &mut MaskConfig) -> Result<()> {
    // Application overrides
    if let Ok(val) = std::env::var("PIIMASK_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }

    // Input overrides
    if let Ok(val) = std::env::var("PIIMASK_INPUT_MASKED_COLUMN") {
        config.input.masked_column = val;
    }
    if let Ok(val) = std::env::var("PIIMASK_INPUT_DELIMITER") {
        config.input.delimiter = val;
    }

    // Job overrides
    if let Ok(val) = std::env::var("PIIMASK_JOB_CHUNK_SIZE") {
        config.job.chunk_size = parse_env("PIIMASK_JOB_CHUNK_SIZE", &val)?;
    }
    if let Ok(val) = std::env::var("PIIMASK_JOB_MAX_CONCURRENCY") {
        config.job.max_concurrency = parse_env("PIIMASK_JOB_MAX_CONCURRENCY", &val)?;
    }
    if let Ok(val) = std::env::var("PIIMASK_JOB_MAX_RETRIES") {
        config.job.max_retries = parse_env("PIIMASK_JOB_MAX_RETRIES", &val)?;
    }
    if let Ok(val) = std::env::var("PIIMASK_JOB_FAILURE_POLICY") {
        config.job.failure_policy = val.parse().map_err(MaskError::Configuration)?;
    }

    // Retry overrides
    if let Ok(val) = std::env::var("PIIMASK_RETRY_BASE_DELAY_MS") {
        config.retry.base_delay_ms = parse_env("PIIMASK_RETRY_BASE_DELAY_MS", &val)?;
    }
    if let Ok(val) = std::env::var("PIIMASK_RETRY_MAX_DELAY_MS") {
        config.retry.max_delay_ms = parse_env("PIIMASK_RETRY_MAX_DELAY_MS", &val)?;
    }

    // Remote detector overrides
    if let Ok(val) = std::env::var("PIIMASK_REMOTE_ENABLED") {
        config.remote.enabled = val.parse().unwrap_or(false);
    }
    if let Ok(val) = std::env::var("PIIMASK_REMOTE_ENDPOINT") {
        config.remote.endpoint = Some(val);
    }
    if let Ok(val) = std::env::var("PIIMASK_REMOTE_API_KEY") {
        config.remote.api_key = Some(secret_string(val));
    }
    if let Ok(val) = std::env::var("PIIMASK_REMOTE_TIMEOUT_SECONDS") {
        config.remote.timeout_seconds = parse_env("PIIMASK_REMOTE_TIMEOUT_SECONDS", &val)?;
    }

    // Ledger overrides
    if let Ok(val) = std::env::var("PIIMASK_LEDGER_PATH") {
        config.ledger.path = val;
    }

    // Logging overrides
    if let Ok(val) = std::env::var("PIIMASK_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = val.parse().unwrap_or(false);
    }
    if let Ok(val) = std::env::var("PIIMASK_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }

    Ok(())
}
