//! # Error Types
//!
//! This module defines error types used throughout the sello library.
//!
//! Each variant maps to one failure class: input validation errors are
//! produced at the boundary before any state mutation, parse/decode errors
//! leave prior state untouched, and font failures are absorbed by the font
//! service and reported as fallback decisions rather than bubbling through
//! the rendering core.

use thiserror::Error;

/// Main error type for sello operations
#[derive(Debug, Error)]
pub enum SelloError {
    /// Input rejected before processing (wrong type, size, dimensions,
    /// empty dataset, no columns, no active fields)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Malformed tabular data
    #[error("Parse error: {0}")]
    Parse(String),

    /// Template image decoding error
    #[error("Image error: {0}")]
    Image(String),

    /// Font acquisition or rasterization error
    #[error("Font error: {0}")]
    Font(String),

    /// A single row failed to render during export
    #[error("Render error: {0}")]
    Render(String),

    /// Archive construction error, including whole-batch failure
    /// (zero successful rows)
    #[error("Archive error: {0}")]
    Archive(String),

    /// Saved-state read/write error
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            SelloError::InvalidInput("x".into())
                .to_string()
                .starts_with("Invalid input:")
        );
        assert!(
            SelloError::Render("x".into())
                .to_string()
                .starts_with("Render error:")
        );
        assert!(
            SelloError::Archive("x".into())
                .to_string()
                .starts_with("Archive error:")
        );
    }
}
