//! Chunk splitting
//!
//! Splits the ordered input rows into fixed-size chunks. Chunks are the unit
//! of detection, retry and ledger bookkeeping.

use crate::domain::{MaskError, Result, Row};
use serde::{Deserialize, Serialize};

/// Default number of rows per chunk
pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// A contiguous run of input rows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Position of the chunk, starting at 0
    pub chunk_index: usize,

    /// Index of the first row in the chunk
    pub start_row_index: usize,

    /// Rows in input order
    pub rows: Vec<Row>,
}

impl Chunk {
    /// Number of rows in the chunk
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Splits rows into chunks of at most `chunk_size` rows
///
/// The last chunk may be smaller. Empty input yields no chunks.
///
/// # Errors
///
/// Returns `MaskError::InvalidConfiguration` if `chunk_size` is 0.
///
/// # Examples
///
/// ```
/// use piimask::core::chunking::split_rows;
/// use piimask::domain::Row;
///
/// let rows: Vec<Row> = (0..5).map(|i| Row::from_strs(i, &["x"])).collect();
/// let chunks = split_rows(rows, 2).unwrap();
///
/// assert_eq!(chunks.len(), 3);
/// assert_eq!(chunks[2].row_count(), 1);
/// assert_eq!(chunks[2].start_row_index, 4);
/// ```
pub fn split_rows(rows: Vec<Row>, chunk_size: usize) -> Result<Vec<Chunk>> {
    if chunk_size == 0 {
        return Err(MaskError::InvalidConfiguration(
            "chunk_size must be at least 1".to_string(),
        ));
    }

    let mut chunks = Vec::with_capacity(chunk_count(rows.len(), chunk_size));
    let mut rows = rows.into_iter().peekable();
    let mut chunk_index = 0;

    while let Some(first) = rows.next() {
        let start_row_index = first.index;
        let mut chunk_rows = Vec::with_capacity(chunk_size.min(rows.len() + 1));
        chunk_rows.push(first);
        while chunk_rows.len() < chunk_size {
            match rows.next() {
                Some(row) => chunk_rows.push(row),
                None => break,
            }
        }
        chunks.push(Chunk {
            chunk_index,
            start_row_index,
            rows: chunk_rows,
        });
        chunk_index += 1;
    }

    Ok(chunks)
}

/// Number of chunks `row_count` rows split into
pub fn chunk_count(row_count: usize, chunk_size: usize) -> usize {
    if chunk_size == 0 {
        return 0;
    }
    row_count.div_ceil(chunk_size)
}
