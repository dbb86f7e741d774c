//! Error types for bundle operations.

use thiserror::Error;

/// Error type for bundle operations.
#[derive(Error, Debug)]
pub enum BundleError {
    /// Reading the source or writing the sink failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The bytes were read but the gzip or tar structure is malformed.
    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Bundle has no manifest entry")]
    MissingManifest,

    #[error("Invalid archive entry {path}: {reason}")]
    InvalidEntry { path: String, reason: String },

    #[error("Invalid label {label:?}: {reason}")]
    InvalidLabel { label: String, reason: String },

    #[error("No bundle entry labelled {0:?}")]
    NotFound(String),

    #[error("Schema validation failed: {0}")]
    Schema(String),
}

impl BundleError {
    pub(crate) fn encoding(err: impl std::fmt::Display) -> Self {
        BundleError::Encoding(err.to_string())
    }

    /// True when the failure came from malformed content rather than the
    /// underlying source or sink.
    pub fn is_encoding(&self) -> bool {
        matches!(
            self,
            BundleError::Encoding(_)
                | BundleError::Json(_)
                | BundleError::MissingManifest
                | BundleError::InvalidEntry { .. }
        )
    }
}

/// Result type alias for bundle operations.
pub type Result<T> = std::result::Result<T, BundleError>;
