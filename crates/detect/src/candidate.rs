//! Candidate decoders: one per recognized format.

use crate::format::{Decoded, Format};
use crate::{cyclonedx, gitleaks, grype, semgrep};
use scangate_bundle::Bundle;
use std::fmt;

/// A decode-and-check function paired with the format it recognizes.
#[derive(Clone, Copy)]
pub struct Candidate {
    format: Format,
    decode: fn(&[u8]) -> Option<Decoded>,
}

impl Candidate {
    pub const fn new(format: Format, decode: fn(&[u8]) -> Option<Decoded>) -> Self {
        Self { format, decode }
    }

    pub fn format(&self) -> Format {
        self.format
    }

    /// Decode `bytes` and return the value only if it is plausibly this
    /// candidate's format.
    pub fn try_decode(&self, bytes: &[u8]) -> Option<Decoded> {
        (self.decode)(bytes)
    }
}

impl fmt::Debug for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Candidate")
            .field("format", &self.format)
            .finish()
    }
}

/// Bundles are recognized by running the full bundle decode.
fn decode_bundle(bytes: &[u8]) -> Option<Decoded> {
    Bundle::from_bytes(bytes).ok().map(Decoded::Bundle)
}

/// The built-in candidates, in list order.
pub fn default_candidates() -> Vec<Candidate> {
    vec![
        Candidate::new(Format::Grype, grype::decode),
        Candidate::new(Format::Semgrep, semgrep::decode),
        Candidate::new(Format::Gitleaks, gitleaks::decode),
        Candidate::new(Format::CycloneDx, cyclonedx::decode),
        Candidate::new(Format::Bundle, decode_bundle),
    ]
}
