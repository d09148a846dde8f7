//! Alignment of annotated text against its original
//!
//! Some semantic services return the input text with PII already replaced by
//! `<PII_*>` tokens instead of span offsets. This module recovers the spans by
//! walking the annotated text and locating each literal segment in the
//! original.

use crate::detection::models::{DetectorKind, PiiCategory, PiiSpan};
use crate::detection::tagger;

#[derive(Debug)]
enum Segment<'a> {
    Literal(&'a str),
    Token(PiiCategory),
}

fn segments(annotated: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut cursor = 0;
    for captures in tagger::token_regex().captures_iter(annotated) {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        if whole.start() > cursor {
            out.push(Segment::Literal(&annotated[cursor..whole.start()]));
        }
        let category = captures
            .get(1)
            .and_then(|m| PiiCategory::parse(m.as_str()))
            .unwrap_or(PiiCategory::Sensitive);
        out.push(Segment::Token(category));
        cursor = whole.end();
    }
    if cursor < annotated.len() {
        out.push(Segment::Literal(&annotated[cursor..]));
    }
    out
}

/// Derives spans from an annotated rendering of `original`
///
/// # Errors
///
/// Returns a description of the mismatch when the annotated text cannot be
/// aligned: literal text that differs from the original, two tokens with no
/// text between them, or a token that covers no characters.
pub fn spans_from_annotated(
    original: &str,
    annotated: &str,
    row_index: usize,
) -> Result<Vec<PiiSpan>, String> {
    let mut spans = Vec::new();
    let mut pos = 0;
    let mut pending: Option<PiiCategory> = None;

    for segment in segments(annotated) {
        match segment {
            Segment::Token(category) => {
                if pending.is_some() {
                    return Err(format!(
                        "adjacent placeholders at offset {pos} cannot be aligned"
                    ));
                }
                pending = Some(category);
            }
            Segment::Literal(literal) => {
                let rest = &original[pos..];
                match pending.take() {
                    Some(category) => {
                        let found = rest.find(literal).ok_or_else(|| {
                            format!("annotated text diverges from original after offset {pos}")
                        })?;
                        if found == 0 {
                            return Err(format!("empty placeholder region at offset {pos}"));
                        }
                        spans.push(PiiSpan::new(
                            row_index,
                            category,
                            pos,
                            pos + found,
                            DetectorKind::Remote,
                        ));
                        pos += found + literal.len();
                    }
                    None => {
                        if !rest.starts_with(literal) {
                            return Err(format!(
                                "annotated text diverges from original at offset {pos}"
                            ));
                        }
                        pos += literal.len();
                    }
                }
            }
        }
    }

    match pending {
        Some(category) => {
            if pos >= original.len() {
                return Err(format!("empty placeholder region at offset {pos}"));
            }
            spans.push(PiiSpan::new(
                row_index,
                category,
                pos,
                original.len(),
                DetectorKind::Remote,
            ));
        }
        None => {
            if pos != original.len() {
                return Err(format!(
                    "annotated text ends early at offset {pos} of {}",
                    original.len()
                ));
            }
        }
    }

    Ok(spans)
}
