//! Manifest types for the bundle archive.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reserved archive entry holding the JSON manifest.
pub const MANIFEST_FILENAME: &str = "scangate-manifest.json";

/// Manifest format version written by this crate.
pub const MANIFEST_VERSION: &str = "1";

/// The index of a bundle: one descriptor per stored label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// When the bundle was first created.
    pub created_at: DateTime<Utc>,
    /// Manifest format version.
    pub version: String,
    /// Descriptors keyed by label.
    #[serde(default)]
    pub files: BTreeMap<String, FileDescriptor>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            created_at: Utc::now(),
            version: MANIFEST_VERSION.to_string(),
            files: BTreeMap::new(),
        }
    }
}

/// Metadata recorded for a single bundle entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    /// When the entry was added (or last overwritten).
    pub added_at: DateTime<Utc>,
    /// Free-form tags, e.g. the detected file type.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    /// Lowercase hex SHA256 of the stored bytes.
    pub digest: String,
}

impl FileDescriptor {
    /// Describe `content` as of now.
    pub fn new(content: &[u8], properties: BTreeMap<String, String>) -> Self {
        Self {
            added_at: Utc::now(),
            properties,
            digest: scangate_common::hash::sha256_bytes(content),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_json_field_names() {
        let mut manifest = Manifest::default();
        manifest.files.insert(
            "grype.json".to_string(),
            FileDescriptor::new(b"{}", BTreeMap::new()),
        );

        let value = serde_json::to_value(&manifest).unwrap();
        assert!(value.get("createdAt").is_some());
        assert_eq!(value["version"], "1");
        let file = &value["files"]["grype.json"];
        assert!(file.get("addedAt").is_some());
        assert!(file["properties"].is_object());
        assert_eq!(
            file["digest"],
            "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a"
        );
    }

    #[test]
    fn test_manifest_parses_without_files() {
        let manifest: Manifest =
            serde_json::from_str(r#"{"createdAt":"2024-01-01T00:00:00Z","version":"1"}"#).unwrap();
        assert!(manifest.files.is_empty());
        assert_eq!(manifest.version, "1");
    }
}
