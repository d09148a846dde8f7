//! Domain models and types for piimask.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Strongly-typed identifiers** ([`JobId`])
//! - **Input models** ([`Row`], [`Table`])
//! - **Error types** ([`MaskError`], [`DetectorError`])
//! - **Result type alias** ([`Result`])
//!
//! # Error Handling
//!
//! All fallible library operations return [`Result<T, MaskError>`]:
//!
//! ```rust
//! use piimask::domain::{MaskError, Result, Table};
//!
//! fn example() -> Result<()> {
//!     let headers = vec![b"Id".to_vec(), b"Comments".to_vec()];
//!     let table = Table::new(headers, "Comments", vec![])?;
//!     assert_eq!(table.masked_column, 1);
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod ids;
pub mod result;
pub mod row;

// Re-export commonly used types for convenience
pub use errors::{ChunkFailureDetail, DetectorError, ErrorClass, MaskError};
pub use ids::JobId;
pub use result::Result;
pub use row::{Row, Table};
