//! Placeholder tagging
//!
//! Replaces detected spans with canonical `<PII_{CATEGORY}>` tokens.

use crate::detection::models::{PiiCategory, PiiSpan};
use regex::Regex;
use std::sync::OnceLock;

/// Canonical placeholder token for a category
///
/// ```
/// use piimask::detection::{tagger, PiiCategory};
///
/// assert_eq!(tagger::placeholder(PiiCategory::Email), "<PII_EMAIL>");
/// assert_eq!(tagger::placeholder(PiiCategory::DateOfBirth), "<PII_DOB>");
/// ```
pub fn placeholder(category: PiiCategory) -> String {
    format!("<PII_{}>", category.token_suffix())
}

/// Regex matching any placeholder token
pub fn token_regex() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| Regex::new(r"<PII_([A-Z_]+)>").expect("token regex is valid"))
}

/// Byte ranges of placeholder tokens already present in `text`
pub fn token_ranges(text: &str) -> Vec<(usize, usize)> {
    token_regex()
        .find_iter(text)
        .map(|m| (m.start(), m.end()))
        .collect()
}

/// Applies spans to `text`, replacing each with its placeholder
///
/// Spans are applied in descending start order so earlier offsets stay
/// valid. Spans that are out of bounds, not on char boundaries, or that
/// overlap an already applied span are skipped. An empty span set returns
/// the input unchanged.
pub fn apply_spans(text: &str, spans: &[PiiSpan]) -> String {
    if spans.is_empty() {
        return text.to_string();
    }

    let mut ordered: Vec<&PiiSpan> = spans.iter().collect();
    ordered.sort_by(|a, b| b.start.cmp(&a.start).then(b.end.cmp(&a.end)));

    let mut result = text.to_string();
    let mut applied_floor = text.len();

    for span in ordered {
        if !span.is_valid_for(text) {
            tracing::debug!(
                start = span.start,
                end = span.end,
                text_len = text.len(),
                "Skipping span outside text or char boundary"
            );
            continue;
        }
        if span.end > applied_floor {
            tracing::debug!(
                start = span.start,
                end = span.end,
                "Skipping overlapping span"
            );
            continue;
        }
        result.replace_range(span.start..span.end, &placeholder(span.category));
        applied_floor = span.start;
    }

    result
}

/// Applies spans to a raw field value
///
/// Non-UTF-8 values are opaque and returned unchanged.
pub fn apply_spans_bytes(value: &[u8], spans: &[PiiSpan]) -> Vec<u8> {
    match std::str::from_utf8(value) {
        Ok(text) => apply_spans(text, spans).into_bytes(),
        Err(_) => value.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::models::DetectorKind;

    fn span(category: PiiCategory, start: usize, end: usize) -> PiiSpan {
        PiiSpan::new(0, category, start, end, DetectorKind::Local)
    }

    #[test]
    fn test_apply_single_span() {
        let text = "email: a@b.com";
        let masked = apply_spans(text, &[span(PiiCategory::Email, 7, 14)]);
        assert_eq!(masked, "email: <PII_EMAIL>");
    }

    #[test]
    fn test_apply_multiple_spans_any_order() {
        let text = "call 555-123-4567 or mail x@y.org";
        let spans = vec![
            span(PiiCategory::Phone, 5, 17),
            span(PiiCategory::Email, 26, 33),
        ];
        let mut reversed = spans.clone();
        reversed.reverse();

        let expected = "call <PII_PHONE> or mail <PII_EMAIL>";
        assert_eq!(apply_spans(text, &spans), expected);
        assert_eq!(apply_spans(text, &reversed), expected);
    }

    #[test]
    fn test_empty_spans_is_identity() {
        let text = "nothing to see";
        assert_eq!(apply_spans(text, &[]), text);
    }

    #[test]
    fn test_invalid_spans_are_skipped() {
        let text = "héllo";
        let masked = apply_spans(
            text,
            &[span(PiiCategory::Name, 0, 2), span(PiiCategory::Name, 3, 40)],
        );
        assert_eq!(masked, text);
    }

    #[test]
    fn test_overlapping_spans_keep_later_start() {
        let text = "abcdefgh";
        let masked = apply_spans(
            text,
            &[span(PiiCategory::Name, 0, 5), span(PiiCategory::Phone, 3, 8)],
        );
        assert_eq!(masked, "abc<PII_PHONE>");
    }

    #[test]
    fn test_token_ranges() {
        let text = "x <PII_EMAIL> y <PII_DOB>";
        assert_eq!(token_ranges(text), vec![(2, 13), (16, 25)]);
    }

    #[test]
    fn test_apply_spans_bytes_opaque() {
        let value = vec![0xff, b'a', b'b'];
        let masked = apply_spans_bytes(&value, &[span(PiiCategory::Name, 1, 3)]);
        assert_eq!(masked, value);
    }
}
