//! Format detection for security scan reports.
//!
//! Every supported report kind is a [`Candidate`]: a permissive decode plus a
//! plausibility check. The [`Detector`] races all candidates over one shared
//! buffer and returns the first plausible [`Decoded`] value.

pub mod candidate;
pub mod cyclonedx;
pub mod detector;
pub mod error;
pub mod finding;
pub mod format;
pub mod gitleaks;
pub mod grype;
pub mod semgrep;

pub use candidate::{default_candidates, Candidate};
pub use detector::{DetectMode, Detector, DEFAULT_TIMEOUT};
pub use error::DetectError;
pub use finding::Finding;
pub use format::{Decoded, Format};
