//! Deterministic local pattern detector

use super::patterns::PatternRegistry;
use super::Detector;
use crate::config::LocalDetectorConfig;
use crate::detection::models::{DetectorKind, PiiCategory, PiiSpan};
use crate::detection::tagger;
use crate::domain::DetectorError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;

/// Offline detector over an ordered pattern library
///
/// Output depends only on the input text and the configured library, allow
/// list and deny list. Deny-list terms are always masked as `SENSITIVE` and
/// win over every matcher; allow-list terms are never masked. Existing
/// placeholder tokens are never matched, so masking masked text is a no-op.
pub struct LocalPatternDetector {
    registry: Arc<PatternRegistry>,
    allow_list: HashSet<String>,
    deny_list: Option<Regex>,
}

impl LocalPatternDetector {
    /// Create a new detector with the built-in pattern library
    pub fn new() -> Result<Self> {
        let registry = PatternRegistry::default_patterns()?;
        Ok(Self::with_registry(registry))
    }

    /// Create a new detector with a custom pattern registry
    pub fn with_registry(registry: PatternRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            allow_list: HashSet::new(),
            deny_list: None,
        }
    }

    /// Build a detector from the `[local]` configuration section
    pub fn from_config(config: &LocalDetectorConfig) -> Result<Self> {
        let mut registry = match &config.pattern_library {
            Some(path) => PatternRegistry::from_file(path)?,
            None => PatternRegistry::default_patterns()?,
        };

        if !config.categories.is_empty() {
            let categories = config
                .categories
                .iter()
                .map(|c| {
                    PiiCategory::parse(c).with_context(|| format!("Unknown PII category: {c}"))
                })
                .collect::<Result<Vec<_>>>()?;
            registry.retain_categories(&categories);
        }

        Self::with_registry(registry)
            .with_allow_list(config.allow_list.iter().cloned())
            .with_deny_list(config.deny_list.iter().cloned())
    }

    /// Terms that are never masked (case-insensitive, whole candidate)
    pub fn with_allow_list<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allow_list = terms
            .into_iter()
            .map(|t| t.into().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        self
    }

    /// Terms that are always masked as `SENSITIVE` (case-insensitive)
    pub fn with_deny_list<I, S>(mut self, terms: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut escaped: Vec<String> = terms
            .into_iter()
            .map(Into::into)
            .filter(|t| !t.trim().is_empty())
            .map(|t| regex::escape(t.trim()))
            .collect();

        if escaped.is_empty() {
            self.deny_list = None;
            return Ok(self);
        }

        // Longest first so overlapping terms prefer the longer match.
        escaped.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
        let pattern = format!("(?i){}", escaped.join("|"));
        self.deny_list = Some(Regex::new(&pattern).context("Failed to compile deny list")?);
        Ok(self)
    }

    /// Number of active matchers
    pub fn matcher_count(&self) -> usize {
        self.registry.matchers().len()
    }

    /// Detect PII in one text
    ///
    /// Returns non-overlapping spans sorted by start offset. `row_index` is
    /// left at 0.
    pub fn detect_text(&self, text: &str) -> Vec<PiiSpan> {
        let mut reserved: Vec<(usize, usize)> = tagger::token_ranges(text);
        let mut spans = Vec::new();

        if let Some(deny) = &self.deny_list {
            for m in deny.find_iter(text) {
                self.accept(
                    text,
                    m.start(),
                    m.end(),
                    PiiCategory::Sensitive,
                    &mut reserved,
                    &mut spans,
                    false,
                );
            }
        }

        for matcher in self.registry.matchers() {
            for regex in &matcher.regexes {
                for captures in regex.captures_iter(text) {
                    let Some(m) = captures.name("value").or_else(|| captures.get(0)) else {
                        continue;
                    };
                    if let Some(validator) = matcher.validator {
                        if !validator.accepts(m.as_str()) {
                            continue;
                        }
                    }
                    self.accept(
                        text,
                        m.start(),
                        m.end(),
                        matcher.category,
                        &mut reserved,
                        &mut spans,
                        true,
                    );
                }
            }
        }

        spans.sort_by_key(|s: &PiiSpan| s.start);
        spans
    }

    /// Detect and mask one text
    pub fn mask_text(&self, text: &str) -> String {
        tagger::apply_spans(text, &self.detect_text(text))
    }

    #[allow(clippy::too_many_arguments)]
    fn accept(
        &self,
        text: &str,
        start: usize,
        end: usize,
        category: PiiCategory,
        reserved: &mut Vec<(usize, usize)>,
        spans: &mut Vec<PiiSpan>,
        honour_allow_list: bool,
    ) {
        if start >= end {
            return;
        }
        if reserved.iter().any(|&(s, e)| start < e && s < end) {
            return;
        }
        if honour_allow_list
            && !self.allow_list.is_empty()
            && self
                .allow_list
                .contains(&text[start..end].trim().to_lowercase())
        {
            return;
        }
        reserved.push((start, end));
        spans.push(PiiSpan::new(0, category, start, end, DetectorKind::Local));
    }
}

#[async_trait]
impl Detector for LocalPatternDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Local
    }

    async fn detect(&self, texts: &[String]) -> Result<Vec<Vec<PiiSpan>>, DetectorError> {
        Ok(texts
            .iter()
            .enumerate()
            .map(|(i, text)| {
                let mut spans = self.detect_text(text);
                for span in &mut spans {
                    span.row_index = i;
                }
                spans
            })
            .collect())
    }
}
