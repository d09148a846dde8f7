//! PII detection module
//!
//! Provides the async detector interface shared by the remote semantic
//! detector and the local pattern detector.

pub mod local;
pub mod patterns;

use crate::detection::models::{DetectorKind, PiiSpan};
use crate::domain::DetectorError;
use async_trait::async_trait;

/// Detection backend
///
/// `detect` receives the masked-column texts of one chunk and must return
/// exactly one span set per text, in the same order. Span offsets are byte
/// offsets into the corresponding text; `row_index` is the position in the
/// batch.
#[async_trait]
pub trait Detector: Send + Sync {
    /// Which kind of detector this is
    fn kind(&self) -> DetectorKind;

    /// Detect PII in a batch of texts
    async fn detect(&self, texts: &[String]) -> Result<Vec<Vec<PiiSpan>>, DetectorError>;
}

pub use local::LocalPatternDetector;
pub use patterns::PatternRegistry;
