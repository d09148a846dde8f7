//! Row and table models
//!
//! Field values are kept as raw bytes so that columns which are never masked
//! are written back exactly as they were read, even when they are not valid
//! UTF-8.

use crate::domain::errors::MaskError;
use crate::domain::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One input record with its original 0-based position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    /// Position of the row in the input (data rows only, header excluded)
    pub index: usize,

    /// Field values in column order
    #[serde(with = "base64_fields")]
    pub fields: Vec<Vec<u8>>,
}

impl Row {
    /// Creates a row from raw field bytes
    pub fn new(index: usize, fields: Vec<Vec<u8>>) -> Self {
        Self { index, fields }
    }

    /// Creates a row from string fields
    pub fn from_strs<S: AsRef<str>>(index: usize, fields: &[S]) -> Self {
        Self {
            index,
            fields: fields
                .iter()
                .map(|f| f.as_ref().as_bytes().to_vec())
                .collect(),
        }
    }

    /// Returns the raw bytes of a field
    pub fn field(&self, column: usize) -> Option<&[u8]> {
        self.fields.get(column).map(Vec::as_slice)
    }

    /// Returns a field as text if it is valid UTF-8
    pub fn field_str(&self, column: usize) -> Option<&str> {
        self.field(column)
            .and_then(|bytes| std::str::from_utf8(bytes).ok())
    }

    /// Returns a copy of this row with one field replaced
    ///
    /// # Errors
    ///
    /// Returns an error if the row has no such column.
    pub fn with_field(&self, column: usize, value: Vec<u8>) -> Result<Self> {
        if column >= self.fields.len() {
            return Err(MaskError::Input(format!(
                "row {} has {} field(s), column {} is out of range",
                self.index,
                self.fields.len(),
                column
            )));
        }
        let mut row = self.clone();
        row.fields[column] = value;
        Ok(row)
    }
}

/// Parsed input: header, rows, and the resolved masked column
#[derive(Debug, Clone)]
pub struct Table {
    /// Header fields
    pub headers: Vec<Vec<u8>>,

    /// Position of the masked column in each row
    pub masked_column: usize,

    /// Data rows in input order
    pub rows: Vec<Row>,
}

impl Table {
    /// Builds a table, resolving `column_name` against the header
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::MissingColumn`] if no header field matches.
    pub fn new(headers: Vec<Vec<u8>>, column_name: &str, rows: Vec<Row>) -> Result<Self> {
        let masked_column = find_column(&headers, column_name).ok_or_else(|| {
            MaskError::MissingColumn {
                column: column_name.to_string(),
            }
        })?;

        Ok(Self {
            headers,
            masked_column,
            rows,
        })
    }

    /// Number of data rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the table has no data rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// SHA-256 over header and rows, hex encoded
    ///
    /// Used to refuse resuming a job against different input.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update((self.masked_column as u64).to_le_bytes());
        hash_fields(&mut hasher, &self.headers);
        for row in &self.rows {
            hasher.update((row.index as u64).to_le_bytes());
            hash_fields(&mut hasher, &row.fields);
        }
        format!("{:x}", hasher.finalize())
    }
}

fn hash_fields(hasher: &mut Sha256, fields: &[Vec<u8>]) {
    hasher.update((fields.len() as u64).to_le_bytes());
    for field in fields {
        hasher.update((field.len() as u64).to_le_bytes());
        hasher.update(field);
    }
}

/// Finds a header field equal to `name`, ignoring surrounding whitespace
pub fn find_column(headers: &[Vec<u8>], name: &str) -> Option<usize> {
    let wanted = name.trim().as_bytes();
    headers.iter().position(|h| trim_ascii(h) == wanted)
}

fn trim_ascii(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |p| p + 1);
    &bytes[start..end]
}

/// Serde adapter storing byte fields as base64 strings
pub mod base64_fields {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(fields: &[Vec<u8>], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let encoded: Vec<String> = fields.iter().map(|f| STANDARD.encode(f)).collect();
        encoded.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = Vec::<String>::deserialize(deserializer)?;
        encoded
            .iter()
            .map(|s| STANDARD.decode(s).map_err(serde::de::Error::custom))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers() -> Vec<Vec<u8>> {
        vec![b"Id".to_vec(), b" Comments ".to_vec()]
    }

    #[test]
    fn test_table_resolves_column() {
        let table = Table::new(headers(), "Comments", vec![]).unwrap();
        assert_eq!(table.masked_column, 1);
        assert!(table.is_empty());
    }

    #[test]
    fn test_table_missing_column() {
        let err = Table::new(headers(), "Notes", vec![]).unwrap_err();
        assert!(matches!(err, MaskError::MissingColumn { ref column } if column == "Notes"));
    }

    #[test]
    fn test_row_with_field_replaces_only_target() {
        let row = Row::from_strs(0, &["1", "secret"]);
        let masked = row.with_field(1, b"<PII_NAME>".to_vec()).unwrap();
        assert_eq!(masked.field(0), Some(&b"1"[..]));
        assert_eq!(masked.field_str(1), Some("<PII_NAME>"));
        assert_eq!(row.field_str(1), Some("secret"));
    }

    #[test]
    fn test_row_with_field_out_of_range() {
        let row = Row::from_strs(4, &["only"]);
        assert!(row.with_field(1, vec![]).is_err());
    }

    #[test]
    fn test_field_str_rejects_invalid_utf8() {
        let row = Row::new(0, vec![vec![0xff, 0xfe]]);
        assert!(row.field_str(0).is_none());
        assert!(row.field(0).is_some());
    }

    #[test]
    fn test_fingerprint_changes_with_content() {
        let a = Table::new(headers(), "Comments", vec![Row::from_strs(0, &["1", "x"])]).unwrap();
        let b = Table::new(headers(), "Comments", vec![Row::from_strs(0, &["1", "y"])]).unwrap();
        assert_eq!(a.fingerprint(), a.clone().fingerprint());
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }

    #[test]
    fn test_row_serde_preserves_bytes() {
        let row = Row::new(3, vec![vec![0xff, 0x00, b'a'], b"plain".to_vec()]);
        let json = serde_json::to_string(&row).unwrap();
        let back: Row = serde_json::from_str(&json).unwrap();
        assert_eq!(back, row);
    }
}
