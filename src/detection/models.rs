//! PII span and category models

use serde::{Deserialize, Serialize};
use std::fmt;

/// PII categories recognized by both detectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PiiCategory {
    /// Email addresses
    Email,
    /// Telephone numbers
    Phone,
    /// Payment card numbers
    CreditCard,
    /// Social Security Numbers
    Ssn,
    /// Passport, driver license and other government identifiers
    GovId,
    /// Bank account numbers and IBANs
    BankAccount,
    /// Person names
    Name,
    /// Postal addresses
    Address,
    /// Dates of birth
    DateOfBirth,
    /// Coordinates and other precise locations
    GeoLocation,
    /// IP addresses, MAC addresses, device identifiers
    DigitalSignature,
    /// Medical record numbers and health identifiers
    Medical,
    /// Organization account or customer numbers
    OrgAccount,
    /// Identifiers associated with a person (member ids, usernames)
    AssociatedId,
    /// Passwords and secrets
    Password,
    /// Anything else that must not leave the system
    Sensitive,
}

impl PiiCategory {
    /// All categories in declaration order
    pub const ALL: [PiiCategory; 16] = [
        Self::Email,
        Self::Phone,
        Self::CreditCard,
        Self::Ssn,
        Self::GovId,
        Self::BankAccount,
        Self::Name,
        Self::Address,
        Self::DateOfBirth,
        Self::GeoLocation,
        Self::DigitalSignature,
        Self::Medical,
        Self::OrgAccount,
        Self::AssociatedId,
        Self::Password,
        Self::Sensitive,
    ];

    /// Canonical category label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Email => "EMAIL",
            Self::Phone => "PHONE",
            Self::CreditCard => "CREDIT_CARD",
            Self::Ssn => "SSN",
            Self::GovId => "GOV_ID",
            Self::BankAccount => "BANK_ACCOUNT",
            Self::Name => "NAME",
            Self::Address => "ADDRESS",
            Self::DateOfBirth => "DATE_OF_BIRTH",
            Self::GeoLocation => "GEO_LOCATION",
            Self::DigitalSignature => "DIGITAL_SIGNATURE",
            Self::Medical => "MEDICAL",
            Self::OrgAccount => "ORG_ACCOUNT",
            Self::AssociatedId => "ASSOCIATED_ID",
            Self::Password => "PASSWORD",
            Self::Sensitive => "SENSITIVE",
        }
    }

    /// Suffix used inside the placeholder token (`<PII_{suffix}>`)
    pub fn token_suffix(&self) -> &'static str {
        match self {
            Self::DateOfBirth => "DOB",
            Self::GeoLocation => "GEOLOCATION",
            Self::DigitalSignature => "DIGITAL_SIG",
            other => other.label(),
        }
    }

    /// Parses a category label, token suffix or common alias
    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.trim().to_uppercase().replace(['-', ' '], "_");
        let category = match normalized.as_str() {
            "EMAIL" | "EMAIL_ADDRESS" => Self::Email,
            "PHONE" | "PHONE_NUMBER" | "TELEPHONE" => Self::Phone,
            "CREDIT_CARD" | "CARD" | "PAYMENT_CARD" => Self::CreditCard,
            "SSN" => Self::Ssn,
            "GOV_ID" | "GOVERNMENT_ID" | "PASSPORT" | "DRIVER_LICENSE" => Self::GovId,
            "BANK_ACCOUNT" | "IBAN" | "ACCOUNT_NUMBER" => Self::BankAccount,
            "NAME" | "PERSON" => Self::Name,
            "ADDRESS" | "POSTAL_ADDRESS" => Self::Address,
            "DOB" | "DATE_OF_BIRTH" => Self::DateOfBirth,
            "GEOLOCATION" | "GEO_LOCATION" | "LOCATION" => Self::GeoLocation,
            "DIGITAL_SIG" | "DIGITAL_SIGNATURE" | "IP_ADDRESS" | "MAC_ADDRESS"
            | "DEVICE_ID" => Self::DigitalSignature,
            "MEDICAL" | "MRN" | "MEDICAL_RECORD_NUMBER" => Self::Medical,
            "ORG_ACCOUNT" | "CUSTOMER_ID" => Self::OrgAccount,
            "ASSOCIATED_ID" | "USERNAME" | "MEMBER_ID" => Self::AssociatedId,
            "PASSWORD" | "SECRET" => Self::Password,
            "SENSITIVE" | "OTHER" => Self::Sensitive,
            _ => return None,
        };
        Some(category)
    }
}

impl fmt::Display for PiiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Which detector produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    /// Remote semantic detection service
    Remote,
    /// Deterministic local pattern detector
    Local,
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote => write!(f, "remote"),
            Self::Local => write!(f, "local"),
        }
    }
}

/// A detected PII region inside one field value
///
/// `start` and `end` are byte offsets into the original field text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PiiSpan {
    /// Position of the text in the detector batch
    pub row_index: usize,
    /// Category of PII
    pub category: PiiCategory,
    /// Start byte offset (inclusive)
    pub start: usize,
    /// End byte offset (exclusive)
    pub end: usize,
    /// Detector that produced the span
    pub source: DetectorKind,
}

impl PiiSpan {
    /// Create a new span
    pub fn new(
        row_index: usize,
        category: PiiCategory,
        start: usize,
        end: usize,
        source: DetectorKind,
    ) -> Self {
        Self {
            row_index,
            category,
            start,
            end,
            source,
        }
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Returns true for zero-length spans
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if the two spans share at least one byte
    pub fn overlaps(&self, other: &PiiSpan) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Returns true if the span is a valid, non-empty region of `text`
    pub fn is_valid_for(&self, text: &str) -> bool {
        self.start < self.end
            && self.end <= text.len()
            && text.is_char_boundary(self.start)
            && text.is_char_boundary(self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_suffixes() {
        assert_eq!(PiiCategory::Email.token_suffix(), "EMAIL");
        assert_eq!(PiiCategory::CreditCard.token_suffix(), "CREDIT_CARD");
        assert_eq!(PiiCategory::DateOfBirth.token_suffix(), "DOB");
        assert_eq!(PiiCategory::GeoLocation.token_suffix(), "GEOLOCATION");
        assert_eq!(PiiCategory::DigitalSignature.token_suffix(), "DIGITAL_SIG");
    }

    #[test]
    fn test_parse_round_trips_labels_and_suffixes() {
        for category in PiiCategory::ALL {
            assert_eq!(PiiCategory::parse(category.label()), Some(category));
            assert_eq!(PiiCategory::parse(category.token_suffix()), Some(category));
        }
    }

    #[test]
    fn test_parse_aliases() {
        assert_eq!(PiiCategory::parse("ip address"), Some(PiiCategory::DigitalSignature));
        assert_eq!(PiiCategory::parse("iban"), Some(PiiCategory::BankAccount));
        assert_eq!(PiiCategory::parse("unknown"), None);
    }

    #[test]
    fn test_span_overlap() {
        let a = PiiSpan::new(0, PiiCategory::Email, 0, 5, DetectorKind::Local);
        let b = PiiSpan::new(0, PiiCategory::Phone, 4, 8, DetectorKind::Local);
        let c = PiiSpan::new(0, PiiCategory::Phone, 5, 8, DetectorKind::Local);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn test_span_validity() {
        let text = "héllo";
        assert!(PiiSpan::new(0, PiiCategory::Name, 0, 3, DetectorKind::Remote).is_valid_for(text));
        assert!(!PiiSpan::new(0, PiiCategory::Name, 0, 2, DetectorKind::Remote).is_valid_for(text));
        assert!(!PiiSpan::new(0, PiiCategory::Name, 3, 3, DetectorKind::Remote).is_valid_for(text));
        assert!(!PiiSpan::new(0, PiiCategory::Name, 0, 9, DetectorKind::Remote).is_valid_for(text));
    }

    #[test]
    fn test_detector_kind_serde() {
        assert_eq!(serde_json::to_string(&DetectorKind::Local).unwrap(), "\"local\"");
        assert_eq!(DetectorKind::Remote.to_string(), "remote");
    }
}
