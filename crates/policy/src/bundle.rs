//! Recursive validation of bundle members.

use crate::context::ValidationContext;
use crate::error::PolicyError;
use crate::validators::validate_report;
use scangate_bundle::Bundle;
use scangate_detect::{Decoded, Format};
use std::future::Future;
use std::pin::Pin;
use tracing::{debug, info};

/// What happened to one bundle entry.
#[derive(Debug)]
pub enum EntryOutcome {
    Passed { format: Format },
    /// No decoder recognized the entry.
    Skipped,
    Failed(PolicyError),
}

#[derive(Debug)]
pub struct EntryReport {
    pub label: String,
    pub outcome: EntryOutcome,
}

/// Validate any decoded value: reports against their policy section, bundles
/// member by member.
pub fn validate_decoded<'a>(
    decoded: &'a Decoded,
    raw_doc: &'a [u8],
    ctx: &'a ValidationContext,
) -> Pin<Box<dyn Future<Output = Result<(), PolicyError>> + Send + 'a>> {
    Box::pin(async move {
        match decoded {
            Decoded::Bundle(bundle) => validate_bundle(bundle, raw_doc, ctx).await,
            report => validate_report(report, raw_doc, ctx),
        }
    })
}

/// Detect and validate every entry of `bundle`. Each entry gets its own
/// detector; the label is used as a detection hint. Unrecognized entries are
/// skipped and nested bundles are walked recursively.
pub async fn validate_bundle_entries(
    bundle: &Bundle,
    raw_doc: &[u8],
    ctx: &ValidationContext,
) -> Vec<EntryReport> {
    let mut reports = Vec::with_capacity(bundle.len());

    for (label, content) in bundle.entries() {
        let detector = ctx.detector();
        let detected = detector
            .detect_with_hint(label, content.to_vec(), ctx.detect_timeout)
            .await;

        let outcome = match detected {
            Ok(decoded) => {
                let format = decoded.format();
                debug!("Entry {} detected as {}", label, format);
                match validate_decoded(&decoded, raw_doc, ctx).await {
                    Ok(()) => EntryOutcome::Passed { format },
                    Err(e) => EntryOutcome::Failed(e),
                }
            }
            Err(e) if e.is_unsupported() => {
                info!("Skipping unrecognized bundle entry {}", label);
                EntryOutcome::Skipped
            }
            Err(e) => EntryOutcome::Failed(e.into()),
        };

        reports.push(EntryReport {
            label: label.to_string(),
            outcome,
        });
    }

    reports
}

/// Validate every entry and fold the results into one verdict. Failures are
/// prefixed with the entry label.
pub async fn validate_bundle(
    bundle: &Bundle,
    raw_doc: &[u8],
    ctx: &ValidationContext,
) -> Result<(), PolicyError> {
    let failures: Vec<String> = validate_bundle_entries(bundle, raw_doc, ctx)
        .await
        .into_iter()
        .filter_map(|report| match report.outcome {
            EntryOutcome::Failed(e) => Some(format!("{}: {}", report.label, e)),
            _ => None,
        })
        .collect();

    if failures.is_empty() {
        Ok(())
    } else {
        Err(PolicyError::Violation { failures })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    const GRYPE: &str = include_str!("../../detect/testdata/grype-report.json");
    const GITLEAKS: &str = include_str!("../../detect/testdata/gitleaks-report.json");

    const PERMISSIVE: &[u8] = b"grype:\n  critical: -1\n  high: -1\n  low: -1\ngitleaks:\n  secretsAllowed: true\n";
    const STRICT: &[u8] = b"grype:\n  low: -1\ngitleaks:\n";

    fn bundle_of(entries: &[(&str, &[u8])]) -> Bundle {
        let mut bundle = Bundle::new();
        for (label, content) in entries {
            bundle
                .add(*label, content.to_vec(), BTreeMap::new())
                .unwrap();
        }
        bundle
    }

    fn outcomes(reports: &[EntryReport]) -> Vec<(String, String)> {
        reports
            .iter()
            .map(|r| {
                let outcome = match &r.outcome {
                    EntryOutcome::Passed { format } => format!("passed {}", format),
                    EntryOutcome::Skipped => "skipped".to_string(),
                    EntryOutcome::Failed(_) => "failed".to_string(),
                };
                (r.label.clone(), outcome)
            })
            .collect()
    }

    #[tokio::test]
    async fn test_unrecognized_entries_are_skipped() {
        let bundle = bundle_of(&[
            ("grype.json", GRYPE.as_bytes()),
            ("notes.txt", b"release notes, not a report".as_slice()),
        ]);

        let reports = validate_bundle_entries(&bundle, PERMISSIVE, &ValidationContext::default()).await;
        assert_eq!(
            outcomes(&reports),
            vec![
                ("grype.json".to_string(), "passed grype".to_string()),
                ("notes.txt".to_string(), "skipped".to_string()),
            ]
        );
        assert!(validate_bundle(&bundle, PERMISSIVE, &ValidationContext::default())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_failures_are_prefixed_with_labels() {
        let bundle = bundle_of(&[
            ("scan.json", GRYPE.as_bytes()),
            ("leaks.json", GITLEAKS.as_bytes()),
            ("notes.txt", b"hello".as_slice()),
        ]);

        let err = validate_bundle(&bundle, STRICT, &ValidationContext::default().sequential())
            .await
            .unwrap_err();
        let failures = err.failures();
        assert_eq!(failures.len(), 2);
        assert!(failures[0].starts_with("leaks.json: "), "{}", failures[0]);
        assert!(failures[0].contains("2 secrets detected"));
        assert!(failures[1].starts_with("scan.json: "), "{}", failures[1]);
        assert!(failures[1].contains("Critical (1 found > 0 allowed)"));
    }

    #[tokio::test]
    async fn test_nested_bundles_are_walked() {
        let inner = bundle_of(&[
            ("grype.json", GRYPE.as_bytes()),
            ("random.bin", [0u8, 159, 146, 150].as_slice()),
        ]);
        let inner_bytes = inner.to_bytes().unwrap();
        let outer = bundle_of(&[("inner.tar.gz", inner_bytes.as_slice())]);

        let reports = validate_bundle_entries(&outer, PERMISSIVE, &ValidationContext::default()).await;
        assert_eq!(
            outcomes(&reports),
            vec![("inner.tar.gz".to_string(), "passed bundle".to_string())]
        );

        let err = validate_bundle(&outer, STRICT, &ValidationContext::default())
            .await
            .unwrap_err();
        assert!(err.failures()[0].starts_with("inner.tar.gz: "));
        assert!(err.to_string().contains("grype.json: "));
    }

    #[tokio::test]
    async fn test_decoded_bundle_dispatch() {
        let bundle = bundle_of(&[("grype.json", GRYPE.as_bytes())]);
        let decoded = Decoded::Bundle(bundle);
        assert!(validate_decoded(&decoded, PERMISSIVE, &ValidationContext::default())
            .await
            .is_ok());
        assert!(validate_decoded(&decoded, STRICT, &ValidationContext::default())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_empty_bundle_passes() {
        let reports = validate_bundle_entries(&Bundle::new(), STRICT, &ValidationContext::default()).await;
        assert!(reports.is_empty());
    }
}
