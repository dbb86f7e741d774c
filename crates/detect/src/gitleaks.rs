//! Gitleaks secret-scanning reports.

use crate::finding::Finding;
use crate::format::Decoded;
use scangate_common::Severity;
use serde::{Deserialize, Serialize};

/// A Gitleaks report is a bare JSON array of findings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GitleaksReport {
    pub findings: Vec<GitleaksFinding>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct GitleaksFinding {
    pub description: String,
    pub start_line: u64,
    pub end_line: u64,
    pub file: String,
    pub commit: String,
    #[serde(rename = "RuleID")]
    pub rule_id: String,
    #[serde(skip_serializing)]
    pub secret: String,
}

impl GitleaksReport {
    /// A clean scan is the literal `[]`; otherwise at least one finding must
    /// name its rule.
    pub fn is_plausible(&self, raw: &[u8]) -> bool {
        if self.findings.is_empty() {
            return is_empty_array(raw);
        }
        self.findings.iter().any(|f| !f.rule_id.is_empty())
    }

    /// Gitleaks has no severity; every leak is reported as `Unknown`.
    pub fn findings(&self) -> Vec<Finding> {
        self.findings
            .iter()
            .map(|f| {
                Finding::new(
                    f.rule_id.clone(),
                    Severity::Unknown,
                    format!("{}:{}", f.file, f.start_line),
                )
            })
            .collect()
    }
}

fn is_empty_array(raw: &[u8]) -> bool {
    std::str::from_utf8(raw)
        .map(|s| s.trim() == "[]")
        .unwrap_or(false)
}

/// Candidate decoder for Gitleaks reports.
pub fn decode(bytes: &[u8]) -> Option<Decoded> {
    serde_json::from_slice::<GitleaksReport>(bytes)
        .ok()
        .filter(|report| report.is_plausible(bytes))
        .map(Decoded::Gitleaks)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = include_str!("../testdata/gitleaks-report.json");

    #[test]
    fn test_decode_sample() {
        let Some(Decoded::Gitleaks(report)) = decode(SAMPLE.as_bytes()) else {
            panic!("sample should decode as gitleaks");
        };
        let findings = report.findings();
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].id, "aws-access-token");
        assert_eq!(findings[0].subject, "deploy/config.env:3");
    }

    #[test]
    fn test_empty_sentinel() {
        assert!(decode(b"[]").is_some());
        assert!(decode(b"  []\n").is_some());
    }

    #[test]
    fn test_array_without_rule_ids_is_implausible() {
        assert!(decode(br#"[{"File": "a.txt"}]"#).is_none());
        assert!(decode(br#"[{}]"#).is_none());
        assert!(decode(br#"{"RuleID": "x"}"#).is_none());
    }
}
