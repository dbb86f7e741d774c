//! Format tags and decoded report values.

use crate::cyclonedx::CycloneDxReport;
use crate::error::DetectError;
use crate::finding::Finding;
use crate::gitleaks::GitleaksReport;
use crate::grype::GrypeReport;
use crate::semgrep::SemgrepReport;
use scangate_bundle::Bundle;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// The closed set of recognized input kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Grype,
    Semgrep,
    Gitleaks,
    CycloneDx,
    Bundle,
    /// Anything no decoder recognized.
    Generic,
}

impl Format {
    /// Human-readable description used for display.
    pub fn file_type(&self) -> &'static str {
        match self {
            Format::Grype => "Anchore Grype Scan Report",
            Format::Semgrep => "Semgrep SAST Report",
            Format::Gitleaks => "Gitleaks Secrets Report",
            Format::CycloneDx => "CycloneDX SBOM",
            Format::Bundle => "Scangate Bundle",
            Format::Generic => "Generic File",
        }
    }

    /// Guess a format from a trusted hint such as a file name. Returns
    /// `Generic` when the hint says nothing.
    pub fn from_hint(hint: &str) -> Format {
        let name = Path::new(hint)
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        if name.contains("grype") {
            Format::Grype
        } else if name.contains("semgrep") {
            Format::Semgrep
        } else if name.contains("gitleaks") {
            Format::Gitleaks
        } else if name.contains("cyclonedx") || name.ends_with(".cdx.json") || name.contains("sbom")
        {
            Format::CycloneDx
        } else if name.contains("bundle") || name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Format::Bundle
        } else {
            Format::Generic
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Format::Grype => "grype",
            Format::Semgrep => "semgrep",
            Format::Gitleaks => "gitleaks",
            Format::CycloneDx => "cyclonedx",
            Format::Bundle => "bundle",
            Format::Generic => "generic",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Format {
    type Err = DetectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "grype" => Ok(Format::Grype),
            "semgrep" => Ok(Format::Semgrep),
            "gitleaks" => Ok(Format::Gitleaks),
            "cyclonedx" | "cdx" => Ok(Format::CycloneDx),
            "bundle" => Ok(Format::Bundle),
            "generic" => Ok(Format::Generic),
            _ => Err(DetectError::UnknownFormat(s.to_string())),
        }
    }
}

/// A successfully decoded and plausible input.
#[derive(Debug, Clone)]
pub enum Decoded {
    Grype(GrypeReport),
    Semgrep(SemgrepReport),
    Gitleaks(GitleaksReport),
    CycloneDx(CycloneDxReport),
    Bundle(Bundle),
}

impl Decoded {
    pub fn format(&self) -> Format {
        match self {
            Decoded::Grype(_) => Format::Grype,
            Decoded::Semgrep(_) => Format::Semgrep,
            Decoded::Gitleaks(_) => Format::Gitleaks,
            Decoded::CycloneDx(_) => Format::CycloneDx,
            Decoded::Bundle(_) => Format::Bundle,
        }
    }

    /// Findings carried by a report. Bundles carry none; their entries are
    /// evaluated individually.
    pub fn findings(&self) -> Option<Vec<Finding>> {
        match self {
            Decoded::Grype(report) => Some(report.findings()),
            Decoded::Semgrep(report) => Some(report.findings()),
            Decoded::Gitleaks(report) => Some(report.findings()),
            Decoded::CycloneDx(report) => Some(report.findings()),
            Decoded::Bundle(_) => None,
        }
    }
}
