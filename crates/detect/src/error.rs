//! Detection error types.

use std::time::Duration;
use thiserror::Error;

/// Error type for format detection.
#[derive(Error, Debug)]
pub enum DetectError {
    /// Reading the input failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Every candidate finished and none found the input plausible.
    #[error("Unsupported format: no decoder recognized the input")]
    Unsupported,

    /// The deadline passed before any candidate produced a match.
    #[error("Detection cancelled after {timeout:?} without a match")]
    Cancelled { timeout: Duration },

    #[error("Unknown format name: {0}")]
    UnknownFormat(String),
}

impl DetectError {
    /// True when detection ran out of time; retrying with a longer timeout
    /// may succeed.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DetectError::Cancelled { .. })
    }

    /// True when detection finished without a match.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, DetectError::Unsupported)
    }
}
