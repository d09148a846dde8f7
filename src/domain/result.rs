//! Result type alias for piimask
//!
//! This module provides a convenient Result type alias that uses MaskError
//! as the error type.

use super::errors::MaskError;

/// Result type alias for piimask operations
///
/// # Examples
///
/// ```
/// use piimask::domain::result::Result;
/// use piimask::domain::errors::MaskError;
///
/// fn example_function() -> Result<String> {
///     Ok("success".to_string())
/// }
///
/// fn failing_function() -> Result<()> {
///     Err(MaskError::Input("unterminated quote".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, MaskError>;
