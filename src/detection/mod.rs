//! PII detection for piimask
//!
//! # Architecture
//!
//! - **Models**: categories, spans and detector kinds
//! - **Detectors**: the async [`Detector`] trait with the deterministic
//!   [`LocalPatternDetector`]; the remote implementation lives in
//!   [`crate::adapters::remote`]
//! - **Tagger**: replacement of spans with `<PII_*>` placeholders
//! - **Annotation**: span recovery from pre-masked service output
//! - **Audit**: hashed detection logging
//!
//! # Usage
//!
//! ```rust
//! use piimask::detection::LocalPatternDetector;
//!
//! let detector = LocalPatternDetector::new().unwrap();
//! assert_eq!(detector.mask_text("email: a@b.com"), "email: <PII_EMAIL>");
//! ```

pub mod annotation;
pub mod audit;
pub mod detector;
pub mod models;
pub mod tagger;

// Re-export main types
pub use detector::{Detector, LocalPatternDetector, PatternRegistry};
pub use models::{DetectorKind, PiiCategory, PiiSpan};
