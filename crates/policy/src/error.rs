//! Policy error types.

use scangate_detect::{DetectError, Format};
use thiserror::Error;

/// Problems with the policy document or external signal data.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Malformed policy document: {0}")]
    Malformed(String),

    /// An absent section never passes silently.
    #[error("Policy document has no '{0}' section")]
    MissingSection(String),

    #[error("Invalid '{section}' section: {reason}")]
    InvalidSection { section: String, reason: String },

    #[error("Invalid {kind} data: {reason}")]
    ExternalData { kind: &'static str, reason: String },
}

/// Error type for policy validation.
#[derive(Error, Debug)]
pub enum PolicyError {
    /// One or more rules failed. Every failure is kept.
    #[error("Policy violations: {}", .failures.join("; "))]
    Violation { failures: Vec<String> },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Expected a {expected} report, got {actual}")]
    UnexpectedFormat { expected: Format, actual: Format },

    #[error(transparent)]
    Detect(#[from] DetectError),
}

impl PolicyError {
    /// Individual rule failures, empty for non-violation errors.
    pub fn failures(&self) -> &[String] {
        match self {
            PolicyError::Violation { failures } => failures,
            _ => &[],
        }
    }
}
