//! Detection audit logging
//!
//! Detections are logged by category with a SHA-256 hash of the matched
//! value. Plaintext PII is never written to logs.

use crate::detection::models::PiiSpan;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Audit entry for one detection (hashed value only)
#[derive(Debug, Clone, Serialize)]
pub struct AuditDetection {
    /// Row the detection belongs to
    pub row_index: usize,
    /// Category label
    pub category: String,
    /// Detector that produced the span
    pub source: String,
    /// SHA-256 of the original value
    pub value_hash: String,
}

/// Hash a value with SHA-256 and return the hex digest
pub fn hash_value(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Build audit entries for spans detected in `text`
pub fn audit_entries(text: &str, spans: &[PiiSpan]) -> Vec<AuditDetection> {
    spans
        .iter()
        .filter(|s| s.is_valid_for(text))
        .map(|s| AuditDetection {
            row_index: s.row_index,
            category: s.category.label().to_string(),
            source: s.source.to_string(),
            value_hash: hash_value(&text[s.start..s.end]),
        })
        .collect()
}

/// Emit one trace event per detection
pub fn log_detections(text: &str, spans: &[PiiSpan]) {
    if !tracing::enabled!(tracing::Level::TRACE) {
        return;
    }
    for entry in audit_entries(text, spans) {
        tracing::trace!(
            row_index = entry.row_index,
            category = %entry.category,
            source = %entry.source,
            value_hash = %entry.value_hash,
            "PII detected"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::models::{DetectorKind, PiiCategory};

    #[test]
    fn test_hash_value_is_stable_hex() {
        let hash = hash_value("a@b.com");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash_value("a@b.com"));
        assert_ne!(hash, hash_value("c@d.com"));
    }

    #[test]
    fn test_audit_entries_never_contain_plaintext() {
        let text = "email: a@b.com";
        let spans = vec![PiiSpan::new(4, PiiCategory::Email, 7, 14, DetectorKind::Local)];
        let entries = audit_entries(text, &spans);

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].row_index, 4);
        assert_eq!(entries[0].category, "EMAIL");
        assert_eq!(entries[0].source, "local");
        let json = serde_json::to_string(&entries).unwrap();
        assert!(!json.contains("a@b.com"));
    }
}
