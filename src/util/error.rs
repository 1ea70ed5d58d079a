//! Error types for feature table operations.

use thiserror::Error;

/// Main error type for feature table operations.
///
/// Reads against data that has not arrived yet are *not* errors; they
/// return `Ok(None)` instead.
#[derive(Error, Debug)]
pub enum Error {
    /// Feature id outside `[0, count)`
    #[error("Feature id {id} out of range (count: {count})")]
    OutOfRange { id: usize, count: usize },

    /// Property not found by name
    #[error("Unknown property: {0}")]
    UnknownProperty(String),

    /// Supplied value or result slot disagrees with the declared type
    #[error("Shape mismatch for property '{property}': expected {expected}, got {actual}")]
    ShapeMismatch {
        property: String,
        expected: String,
        actual: String,
    },

    /// Schema description cannot be turned into storage
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    /// URI cannot be resolved against the cache base
    #[error("Invalid URI '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    /// Property cannot be written
    #[error("Property is read-only: {0}")]
    ReadOnly(String),

    /// Transport failure. The cache never surfaces this to property readers.
    #[error("Fetch failed: {0}")]
    Fetch(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parse error
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create an invalid schema error.
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::InvalidSchema(msg.into())
    }

    /// Create a fetch error.
    pub fn fetch(msg: impl Into<String>) -> Self {
        Self::Fetch(msg.into())
    }

    /// Create a shape mismatch error.
    pub fn shape_mismatch(
        property: impl Into<String>,
        expected: impl ToString,
        actual: impl ToString,
    ) -> Self {
        Self::ShapeMismatch {
            property: property.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

/// Result type alias for feature table operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::OutOfRange { id: 5, count: 3 };
        assert!(e.to_string().contains('5'));
        assert!(e.to_string().contains('3'));

        let e = Error::shape_mismatch("color", "VEC4", "VEC3");
        let msg = e.to_string();
        assert!(msg.contains("color"));
        assert!(msg.contains("VEC4"));
        assert!(msg.contains("VEC3"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
