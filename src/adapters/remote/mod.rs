//! Remote semantic detection service
//!
//! The service contract is a single JSON endpoint:
//!
//! ```text
//! POST {endpoint}
//! Authorization: Bearer {api_key}
//! {"texts": ["...", "..."]}
//! ```
//!
//! answered with either `{"results": [{"spans": [{"category", "start", "end"}]}]}`
//! or `{"results": [{"text": "... <PII_EMAIL> ..."}]}`.

pub mod http;

pub use http::{classify_status, HttpSemanticDetector};
