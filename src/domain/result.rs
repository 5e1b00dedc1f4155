//! Result type alias for Pagefold
//!
//! This module provides a convenient Result type alias that uses PagefoldError
//! as the error type.

use super::errors::PagefoldError;

/// Result type alias for Pagefold operations
///
/// # Examples
///
/// ```
/// use pagefold::domain::result::Result;
/// use pagefold::domain::errors::PagefoldError;
///
/// fn example_function() -> Result<String> {
///     Ok("success".to_string())
/// }
///
/// fn failing_function() -> Result<()> {
///     Err(PagefoldError::Validation("Invalid input".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, PagefoldError>;
