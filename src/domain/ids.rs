//! Domain identifier types with validation

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Masking job identifier newtype wrapper
///
/// Job ids double as ledger keys and directory names in the file-backed
/// ledger, so path separators and parent references are rejected.
///
/// # Examples
///
/// ```
/// use piimask::domain::ids::JobId;
/// use std::str::FromStr;
///
/// let job_id = JobId::from_str("pii-job-20250101-nightly").unwrap();
/// assert_eq!(job_id.as_str(), "pii-job-20250101-nightly");
///
/// let generated = JobId::generate();
/// assert!(generated.as_str().starts_with("pii-job-"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(String);

impl JobId {
    /// Creates a new JobId from a string
    ///
    /// # Returns
    ///
    /// Returns `Ok(JobId)` if the ID is valid, `Err` otherwise
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err("Job ID cannot be empty".to_string());
        }
        if id.contains('/') || id.contains('\\') || id == "." || id.contains("..") {
            return Err(format!(
                "Job ID must not contain path separators or '..', got: {id}"
            ));
        }
        if id.chars().any(char::is_control) {
            return Err("Job ID must not contain control characters".to_string());
        }
        Ok(Self(id))
    }

    /// Generates a fresh job id of the form `pii-job-{timestamp}-{suffix}`
    pub fn generate() -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self(format!(
            "pii-job-{}-{}",
            Utc::now().format("%Y%m%d%H%M%S"),
            &suffix[..8]
        ))
    }

    /// Returns the job ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes self and returns the inner String
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for JobId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
