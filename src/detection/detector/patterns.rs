//! Pattern library for local PII detection
//!
//! The library is an ordered list of `[[matcher]]` tables. Order is
//! significant: it is the priority used to resolve overlapping candidates.

use crate::detection::models::PiiCategory;
use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;
use std::path::Path;

/// Matcher definition from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct MatcherDefinition {
    /// Matcher name used in logs
    pub name: String,
    /// PII category label
    pub category: String,
    /// Regex patterns for this matcher
    pub patterns: Vec<String>,
    /// Optional post-match validator
    #[serde(default)]
    pub validator: Option<String>,
}

/// Post-match validation applied to a candidate's text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validator {
    /// Luhn checksum over the digits (13 to 19 digits)
    Luhn,
}

impl Validator {
    fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "luhn" => Ok(Self::Luhn),
            _ => anyhow::bail!("Unknown validator: {s}"),
        }
    }

    /// Returns true if the candidate passes validation
    pub fn accepts(&self, candidate: &str) -> bool {
        match self {
            Self::Luhn => luhn_valid(candidate),
        }
    }
}

/// Luhn checksum over the ASCII digits of `candidate`
pub fn luhn_valid(candidate: &str) -> bool {
    let digits: Vec<u32> = candidate.chars().filter_map(|c| c.to_digit(10)).collect();
    if !(13..=19).contains(&digits.len()) {
        return false;
    }

    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();

    sum % 10 == 0
}

/// Compiled matcher with metadata
#[derive(Debug, Clone)]
pub struct CompiledMatcher {
    /// Matcher name
    pub name: String,
    /// PII category
    pub category: PiiCategory,
    /// Compiled regexes, tried in order
    pub regexes: Vec<Regex>,
    /// Optional validator
    pub validator: Option<Validator>,
}

/// Pattern library container
#[derive(Debug, Deserialize)]
struct PatternLibrary {
    #[serde(default)]
    matcher: Vec<MatcherDefinition>,
}

/// Ordered registry of compiled matchers
#[derive(Debug, Clone)]
pub struct PatternRegistry {
    matchers: Vec<CompiledMatcher>,
}

impl PatternRegistry {
    /// Create a new pattern registry from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).with_context(|| {
            format!(
                "Failed to read pattern library: {}",
                path.as_ref().display()
            )
        })?;

        Self::from_toml(&content)
    }

    /// Create a pattern registry from TOML content
    pub fn from_toml(content: &str) -> Result<Self> {
        let library: PatternLibrary =
            toml::from_str(content).context("Failed to parse pattern library TOML")?;

        if library.matcher.is_empty() {
            anyhow::bail!("Pattern library defines no matchers");
        }

        let mut matchers = Vec::with_capacity(library.matcher.len());
        for def in library.matcher {
            let category = PiiCategory::parse(&def.category).with_context(|| {
                format!("Invalid category in matcher '{}': {}", def.name, def.category)
            })?;

            let regexes = def
                .patterns
                .iter()
                .map(|p| {
                    Regex::new(p)
                        .with_context(|| format!("Invalid regex in matcher '{}': {p}", def.name))
                })
                .collect::<Result<Vec<_>>>()?;

            let validator = def.validator.as_deref().map(Validator::parse).transpose()?;

            matchers.push(CompiledMatcher {
                name: def.name,
                category,
                regexes,
                validator,
            });
        }

        Ok(Self { matchers })
    }

    /// Create a default pattern registry with built-in patterns
    pub fn default_patterns() -> Result<Self> {
        let default_toml = include_str!("../../../patterns/pii_patterns.toml");
        Self::from_toml(default_toml)
    }

    /// All matchers in priority order
    pub fn matchers(&self) -> &[CompiledMatcher] {
        &self.matchers
    }

    /// Keeps only matchers for the given categories, preserving order
    pub fn retain_categories(&mut self, categories: &[PiiCategory]) {
        self.matchers.retain(|m| categories.contains(&m.category));
    }

    /// Matchers for a specific category
    pub fn matchers_for_category(&self, category: PiiCategory) -> Vec<&CompiledMatcher> {
        self.matchers
            .iter()
            .filter(|m| m.category == category)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_default_patterns() {
        let registry = PatternRegistry::default_patterns().unwrap();
        assert!(!registry.matchers().is_empty());
        assert_eq!(registry.matchers()[0].category, PiiCategory::Email);
    }

    #[test]
    fn test_email_pattern() {
        let registry = PatternRegistry::default_patterns().unwrap();
        let email = registry.matchers_for_category(PiiCategory::Email);
        assert!(!email.is_empty());

        let regex = &email[0].regexes[0];
        assert!(regex.is_match("test@example.com"));
        assert!(regex.is_match("a@b.com"));
        assert!(!regex.is_match("not-an-email"));
    }

    #[test]
    fn test_phone_pattern() {
        let registry = PatternRegistry::default_patterns().unwrap();
        let phone = registry.matchers_for_category(PiiCategory::Phone);
        let text = "Call me at (555) 123-4567";
        assert!(phone
            .iter()
            .any(|m| m.regexes.iter().any(|r| r.is_match(text))));
    }

    #[test]
    fn test_credit_card_uses_luhn() {
        let registry = PatternRegistry::default_patterns().unwrap();
        let cards = registry.matchers_for_category(PiiCategory::CreditCard);
        assert_eq!(cards[0].validator, Some(Validator::Luhn));
    }

    #[test]
    fn test_luhn() {
        assert!(luhn_valid("4111111111111111"));
        assert!(luhn_valid("4111 1111 1111 1111"));
        assert!(luhn_valid("5500-0000-0000-0004"));
        assert!(!luhn_valid("4111111111111112"));
        assert!(!luhn_valid("1234"));
    }

    #[test]
    fn test_order_is_preserved() {
        let toml = r#"
[[matcher]]
name = "second"
category = "PHONE"
patterns = ['\d+']

[[matcher]]
name = "first"
category = "SSN"
patterns = ['\d{3}-\d{2}-\d{4}']
"#;
        let registry = PatternRegistry::from_toml(toml).unwrap();
        let names: Vec<&str> = registry.matchers().iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["second", "first"]);
    }

    #[test]
    fn test_invalid_category_rejected() {
        let toml = r#"
[[matcher]]
name = "bad"
category = "NOT_A_CATEGORY"
patterns = ['x']
"#;
        assert!(PatternRegistry::from_toml(toml).is_err());
    }

    #[test]
    fn test_invalid_regex_rejected() {
        let toml = r#"
[[matcher]]
name = "bad"
category = "EMAIL"
patterns = ['(unclosed']
"#;
        let err = PatternRegistry::from_toml(toml).unwrap_err();
        assert!(format!("{err:#}").contains("Invalid regex"));
    }

    #[test]
    fn test_retain_categories() {
        let mut registry = PatternRegistry::default_patterns().unwrap();
        registry.retain_categories(&[PiiCategory::Email, PiiCategory::Ssn]);
        assert!(registry
            .matchers()
            .iter()
            .all(|m| matches!(m.category, PiiCategory::Email | PiiCategory::Ssn)));
        assert_eq!(registry.matchers().len(), 2);
    }
}
