//! Semgrep SAST reports.

use crate::finding::Finding;
use crate::format::Decoded;
use scangate_common::Severity;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SemgrepReport {
    pub version: String,
    pub results: Vec<SemgrepResult>,
    pub errors: Vec<serde_json::Value>,
    pub paths: Option<SemgrepPaths>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SemgrepPaths {
    pub scanned: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SemgrepResult {
    pub check_id: String,
    pub path: String,
    pub start: SemgrepPosition,
    pub extra: SemgrepExtra,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SemgrepPosition {
    pub line: u64,
    pub col: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SemgrepExtra {
    pub severity: String,
    pub message: String,
}

impl SemgrepReport {
    /// Requires the version string and the `paths` object.
    pub fn is_plausible(&self) -> bool {
        !self.version.is_empty() && self.paths.is_some()
    }

    /// Semgrep's `ERROR`, `WARNING` and `INFO` map to High, Medium and Info.
    pub fn findings(&self) -> Vec<Finding> {
        self.results
            .iter()
            .map(|r| {
                Finding::new(
                    r.check_id.clone(),
                    Severity::from_label(&r.extra.severity),
                    format!("{}:{}", r.path, r.start.line),
                )
            })
            .collect()
    }
}

/// Candidate decoder for Semgrep reports.
pub fn decode(bytes: &[u8]) -> Option<Decoded> {
    serde_json::from_slice::<SemgrepReport>(bytes)
        .ok()
        .filter(SemgrepReport::is_plausible)
        .map(Decoded::Semgrep)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = include_str!("../testdata/semgrep-report.json");

    #[test]
    fn test_decode_sample() {
        let Some(Decoded::Semgrep(report)) = decode(SAMPLE.as_bytes()) else {
            panic!("sample should decode as semgrep");
        };
        let findings = report.findings();
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].severity, Severity::High);
        assert_eq!(findings[1].severity, Severity::Medium);
        assert_eq!(findings[0].subject, "app/db.py:42");
    }

    #[test]
    fn test_requires_version_and_paths() {
        assert!(decode(br#"{"version": "1.50.0", "results": []}"#).is_none());
        assert!(decode(br#"{"paths": {"scanned": []}}"#).is_none());
        assert!(decode(br#"{"version": "1.50.0", "paths": {}}"#).is_some());
    }
}
