//! Anchore Grype vulnerability reports.

use crate::finding::Finding;
use crate::format::Decoded;
use scangate_common::Severity;
use serde::{Deserialize, Serialize};

/// The subset of a Grype JSON report needed for policy evaluation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GrypeReport {
    pub matches: Vec<GrypeMatch>,
    pub descriptor: GrypeDescriptor,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GrypeMatch {
    pub vulnerability: GrypeVulnerability,
    pub artifact: GrypeArtifact,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GrypeVulnerability {
    pub id: String,
    pub severity: String,
    pub data_source: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GrypeArtifact {
    pub name: String,
    pub version: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Identifies the tool that produced the report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GrypeDescriptor {
    pub name: String,
    pub version: String,
}

impl GrypeReport {
    /// Any JSON object decodes into this shape; only a populated descriptor
    /// makes it a Grype report.
    pub fn is_plausible(&self) -> bool {
        !self.descriptor.name.is_empty()
    }

    pub fn findings(&self) -> Vec<Finding> {
        self.matches
            .iter()
            .map(|m| {
                Finding::new(
                    m.vulnerability.id.clone(),
                    Severity::from_label(&m.vulnerability.severity),
                    format!("{}@{}", m.artifact.name, m.artifact.version),
                )
            })
            .collect()
    }
}

/// Candidate decoder for Grype reports.
pub fn decode(bytes: &[u8]) -> Option<Decoded> {
    serde_json::from_slice::<GrypeReport>(bytes)
        .ok()
        .filter(GrypeReport::is_plausible)
        .map(Decoded::Grype)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = include_str!("../testdata/grype-report.json");

    #[test]
    fn test_decode_sample() {
        let Some(Decoded::Grype(report)) = decode(SAMPLE.as_bytes()) else {
            panic!("sample should decode as grype");
        };
        assert_eq!(report.descriptor.name, "grype");

        let findings = report.findings();
        assert_eq!(findings.len(), 3);
        assert_eq!(findings[0].id, "CVE-2023-0286");
        assert_eq!(findings[0].severity, Severity::High);
        assert_eq!(findings[0].subject, "libssl3@3.0.7-r0");
    }

    #[test]
    fn test_object_without_descriptor_is_implausible() {
        assert!(decode(br#"{"matches": []}"#).is_none());
        assert!(decode(br#"{"descriptor": {"name": ""}}"#).is_none());
        assert!(decode(b"[]").is_none());
    }
}
