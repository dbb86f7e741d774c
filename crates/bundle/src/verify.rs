//! Bundle verification: manifest schema, digests and index consistency.

use crate::archive::Bundle;
use crate::error::BundleError;
use crate::manifest::{Manifest, MANIFEST_VERSION};
use crate::schema;
use jsonschema::JSONSchema;
use scangate_common::hash::{is_sha256_hex, sha256_bytes};
use serde_json::Value;
use thiserror::Error;

/// One way a bundle can fail verification.
#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("Manifest does not match its schema: {0}")]
    Schema(String),

    #[error("Entry {label} has a malformed digest {digest:?}")]
    MalformedDigest { label: String, digest: String },

    #[error("Digest mismatch for {label}: expected {expected}, got {actual}")]
    DigestMismatch {
        label: String,
        expected: String,
        actual: String,
    },

    #[error("Entry {0} has no manifest descriptor")]
    MissingDescriptor(String),

    #[error("Manifest describes {0} but the bundle has no such entry")]
    MissingContent(String),
}

/// Everything [`verify_bundle`] found. Notes never make a bundle invalid.
#[derive(Debug, Default)]
pub struct VerifyReport {
    pub problems: Vec<VerifyError>,
    pub notes: Vec<String>,
}

impl VerifyReport {
    pub fn is_valid(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Verify a decoded bundle: manifest schema, every digest, and that content
/// and manifest describe the same labels.
pub fn verify_bundle(bundle: &Bundle) -> Result<VerifyReport, BundleError> {
    let manifest = bundle.manifest();
    let mut problems = schema_problems(&serde_json::to_value(manifest)?)?;
    problems.extend(digest_problems(bundle));
    problems.extend(index_problems(bundle));

    Ok(VerifyReport {
        problems,
        notes: notes(bundle, manifest),
    })
}

fn schema_problems(manifest: &Value) -> Result<Vec<VerifyError>, BundleError> {
    let schema_value = schema::manifest_schema();
    let compiled =
        JSONSchema::compile(&schema_value).map_err(|e| BundleError::Schema(e.to_string()))?;

    let problems = match compiled.validate(manifest) {
        Ok(()) => Vec::new(),
        Err(errors) => errors
            .map(|e| VerifyError::Schema(format!("{} at {}", e, e.instance_path)))
            .collect(),
    };
    Ok(problems)
}

/// Entries whose recorded digest is malformed or does not match the content.
fn digest_problems(bundle: &Bundle) -> Vec<VerifyError> {
    bundle
        .entries()
        .filter_map(|(label, content)| {
            let recorded = &bundle.descriptor(label)?.digest;
            if !is_sha256_hex(recorded) {
                return Some(VerifyError::MalformedDigest {
                    label: label.to_string(),
                    digest: recorded.clone(),
                });
            }
            let actual = sha256_bytes(content);
            (*recorded != actual).then(|| VerifyError::DigestMismatch {
                label: label.to_string(),
                expected: recorded.clone(),
                actual,
            })
        })
        .collect()
}

/// Labels present on only one side of content and manifest.
fn index_problems(bundle: &Bundle) -> Vec<VerifyError> {
    let undescribed = bundle
        .labels()
        .filter(|label| bundle.descriptor(label).is_none())
        .map(|label| VerifyError::MissingDescriptor(label.to_string()));
    let orphaned = bundle
        .manifest()
        .files
        .keys()
        .filter(|label| bundle.get(label).is_err())
        .map(|label| VerifyError::MissingContent(label.clone()));
    undescribed.chain(orphaned).collect()
}

fn notes(bundle: &Bundle, manifest: &Manifest) -> Vec<String> {
    let mut notes = Vec::new();
    if manifest.version != MANIFEST_VERSION {
        notes.push(format!(
            "Manifest version {} differs from supported version {}",
            manifest.version, MANIFEST_VERSION
        ));
    }
    if bundle.is_empty() {
        notes.push("Bundle has no entries".to_string());
    }
    notes
}
