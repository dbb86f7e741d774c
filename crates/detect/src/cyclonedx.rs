//! CycloneDX SBOMs with embedded vulnerabilities.

use crate::finding::Finding;
use crate::format::Decoded;
use scangate_common::Severity;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CycloneDxReport {
    pub bom_format: String,
    pub spec_version: String,
    pub metadata: Option<serde_json::Value>,
    pub components: Vec<CycloneDxComponent>,
    pub vulnerabilities: Vec<CycloneDxVulnerability>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CycloneDxComponent {
    #[serde(rename = "bom-ref")]
    pub bom_ref: String,
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CycloneDxVulnerability {
    pub id: String,
    pub ratings: Vec<CycloneDxRating>,
    pub affects: Vec<CycloneDxAffect>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CycloneDxRating {
    pub severity: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CycloneDxAffect {
    #[serde(rename = "ref")]
    pub reference: String,
}

impl CycloneDxReport {
    /// Requires `specVersion` and the `metadata` object.
    pub fn is_plausible(&self) -> bool {
        !self.spec_version.is_empty() && self.metadata.is_some()
    }

    /// One finding per vulnerability, rated by its most severe rating.
    pub fn findings(&self) -> Vec<Finding> {
        self.vulnerabilities
            .iter()
            .map(|v| {
                let severity = v
                    .ratings
                    .iter()
                    .map(|r| Severity::from_label(&r.severity))
                    .max()
                    .unwrap_or_default();
                let subject = v
                    .affects
                    .iter()
                    .map(|a| self.component_name(&a.reference))
                    .collect::<Vec<_>>()
                    .join(", ");
                Finding::new(v.id.clone(), severity, subject)
            })
            .collect()
    }

    fn component_name(&self, bom_ref: &str) -> String {
        self.components
            .iter()
            .find(|c| c.bom_ref == bom_ref)
            .map(|c| format!("{}@{}", c.name, c.version))
            .unwrap_or_else(|| bom_ref.to_string())
    }
}

/// Candidate decoder for CycloneDX documents.
pub fn decode(bytes: &[u8]) -> Option<Decoded> {
    serde_json::from_slice::<CycloneDxReport>(bytes)
        .ok()
        .filter(CycloneDxReport::is_plausible)
        .map(Decoded::CycloneDx)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = include_str!("../testdata/cyclonedx-sbom.json");

    #[test]
    fn test_decode_sample() {
        let Some(Decoded::CycloneDx(report)) = decode(SAMPLE.as_bytes()) else {
            panic!("sample should decode as cyclonedx");
        };
        let findings = report.findings();
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].id, "CVE-2022-42889");
        assert_eq!(findings[0].severity, Severity::Critical);
        assert_eq!(findings[0].subject, "commons-text@1.9");
        assert_eq!(findings[1].severity, Severity::Unknown);
        assert_eq!(findings[1].subject, "pkg:unknown/missing");
    }

    #[test]
    fn test_requires_spec_version_and_metadata() {
        assert!(decode(br#"{"bomFormat": "CycloneDX", "specVersion": "1.5"}"#).is_none());
        assert!(decode(br#"{"metadata": {}}"#).is_none());
        assert!(decode(br#"{"specVersion": "1.5", "metadata": {}}"#).is_some());
    }
}
