//! Error types for collection operations.
//!
//! Errors are descriptive at the core level; the CLI layer maps each
//! variant to an exit code and a user-facing hint.

use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, AnkiError>;

/// Core error type.
#[derive(Debug, Error)]
pub enum AnkiError {
    /// A path segment did not resolve against the collection
    #[error("Not found: '{segment}' in {path}")]
    NotFound { segment: String, path: String },

    /// A name matched more than one entity
    #[error("Ambiguous: '{segment}' matches {candidates:?}")]
    Ambiguous {
        segment: String,
        candidates: Vec<i64>,
    },

    /// Address string could not be parsed
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Operation preconditions unmet
    #[error("Validation error: {0}")]
    Validation(String),

    /// Archive generation unrecognized or malformed config blob
    #[error("Schema error: {0}")]
    Schema(String),

    /// Post-mutation invariant violated
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// External annotation call failed or timed out
    #[error("External service error: {0}")]
    ExternalService(String),

    /// Archive or database I/O error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid user input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Work was abandoned before it started
    #[error("Cancelled")]
    Cancelled,
}

impl AnkiError {
    pub(crate) fn not_found(segment: impl Into<String>, path: impl Into<String>) -> Self {
        AnkiError::NotFound {
            segment: segment.into(),
            path: path.into(),
        }
    }

    /// Whether the error is recoverable per note inside a populate batch.
    pub fn is_per_note(&self) -> bool {
        matches!(
            self,
            AnkiError::ExternalService(_) | AnkiError::InvalidInput(_)
        )
    }
}

impl From<std::io::Error> for AnkiError {
    fn from(err: std::io::Error) -> Self {
        AnkiError::Storage(err.to_string())
    }
}

impl From<rusqlite::Error> for AnkiError {
    fn from(err: rusqlite::Error) -> Self {
        AnkiError::Storage(format!("SQLite: {}", err))
    }
}

impl From<zip::result::ZipError> for AnkiError {
    fn from(err: zip::result::ZipError) -> Self {
        AnkiError::Storage(format!("Zip: {}", err))
    }
}

impl From<serde_json::Error> for AnkiError {
    fn from(err: serde_json::Error) -> Self {
        AnkiError::Schema(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_names_segment() {
        let err = AnkiError::not_found("Nonexistent", "/models/Basic/fields/Nonexistent");
        assert_eq!(
            err.to_string(),
            "Not found: 'Nonexistent' in /models/Basic/fields/Nonexistent"
        );
    }

    #[test]
    fn test_per_note_classification() {
        assert!(AnkiError::ExternalService("timeout".into()).is_per_note());
        assert!(!AnkiError::Integrity("count".into()).is_per_note());
    }
}
