//! Bundle encoding and decoding.
//!
//! Serialized layout: a gzip stream wrapping a tar stream with one flat
//! regular-file entry per label plus the [`MANIFEST_FILENAME`] entry.

use crate::error::{BundleError, Result};
use crate::manifest::{FileDescriptor, Manifest, MANIFEST_FILENAME};
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::Component;
use tar::{Archive, Builder, EntryType, Header};
use tracing::debug;

/// A collection of labelled artifacts with a manifest.
///
/// No internal locking: callers must not mutate and encode the same bundle
/// from several tasks at once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bundle {
    content: BTreeMap<String, Vec<u8>>,
    manifest: Manifest,
}

impl Bundle {
    /// Create an empty bundle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `content` under `label`, replacing any existing entry and its
    /// descriptor.
    pub fn add(
        &mut self,
        label: impl Into<String>,
        content: impl Into<Vec<u8>>,
        properties: BTreeMap<String, String>,
    ) -> Result<()> {
        let label = label.into();
        validate_label(&label)?;

        let content = content.into();
        let descriptor = FileDescriptor::new(&content, properties);
        debug!("Adding {} ({} bytes, sha256 {})", label, content.len(), descriptor.digest);

        self.manifest.files.insert(label.clone(), descriptor);
        self.content.insert(label, content);
        Ok(())
    }

    /// Delete an entry and its descriptor. Absent labels are ignored.
    pub fn remove(&mut self, label: &str) {
        self.content.remove(label);
        self.manifest.files.remove(label);
    }

    /// Bytes stored under `label`.
    pub fn get(&self, label: &str) -> Result<&[u8]> {
        self.content
            .get(label)
            .map(Vec::as_slice)
            .ok_or_else(|| BundleError::NotFound(label.to_string()))
    }

    pub fn descriptor(&self, label: &str) -> Option<&FileDescriptor> {
        self.manifest.files.get(label)
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Labels in sorted order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.content.keys().map(String::as_str)
    }

    /// `(label, bytes)` pairs in label order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.content
            .iter()
            .map(|(label, bytes)| (label.as_str(), bytes.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Serialize the bundle into `sink`.
    ///
    /// The manifest entry is written from a snapshot; the bundle itself is
    /// never modified, so a failed write leaves it intact.
    pub fn encode<W: Write>(&self, mut sink: W) -> Result<()> {
        let bytes = self.to_bytes()?;
        sink.write_all(&bytes)?;
        sink.flush()?;
        Ok(())
    }

    /// Serialize the bundle into an in-memory buffer.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let manifest_json = serde_json::to_vec_pretty(&self.manifest)?;

        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut archive = Builder::new(encoder);

        append_entry(
            &mut archive,
            MANIFEST_FILENAME,
            &manifest_json,
            self.manifest.created_at,
        )?;

        for (label, content) in &self.content {
            let added_at = self
                .manifest
                .files
                .get(label)
                .map(|d| d.added_at)
                .unwrap_or(self.manifest.created_at);
            append_entry(&mut archive, label, content, added_at)?;
        }

        let encoder = archive.into_inner().map_err(BundleError::encoding)?;
        let bytes = encoder.finish().map_err(BundleError::encoding)?;
        debug!(
            "Encoded bundle with {} entries ({} compressed bytes)",
            self.content.len(),
            bytes.len()
        );
        Ok(bytes)
    }

    /// Deserialize a bundle from `source`.
    pub fn decode<R: Read>(mut source: R) -> Result<Self> {
        let mut raw = Vec::new();
        source.read_to_end(&mut raw)?;
        Self::from_bytes(&raw)
    }

    /// Deserialize a bundle from an in-memory buffer.
    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        let mut archive = Archive::new(GzDecoder::new(raw));
        let mut content = BTreeMap::new();

        for entry in archive.entries().map_err(BundleError::encoding)? {
            let mut entry = entry.map_err(BundleError::encoding)?;
            let path = entry
                .path()
                .map_err(BundleError::encoding)?
                .into_owned();

            let entry_type = entry.header().entry_type();
            if entry_type != EntryType::Regular {
                return Err(BundleError::InvalidEntry {
                    path: path.display().to_string(),
                    reason: format!("unsupported entry type {:?}", entry_type),
                });
            }

            let mut components = path.components();
            let label = match (components.next(), components.next()) {
                (Some(Component::Normal(name)), None) => name.to_str().map(str::to_string),
                _ => None,
            }
            .ok_or_else(|| BundleError::InvalidEntry {
                path: path.display().to_string(),
                reason: "entries must be flat UTF-8 file names".to_string(),
            })?;
            if let Some(reason) = label_problem(&label).filter(|_| label != MANIFEST_FILENAME) {
                return Err(BundleError::InvalidEntry {
                    path: label,
                    reason: reason.to_string(),
                });
            }

            let mut bytes = Vec::new();
            entry
                .read_to_end(&mut bytes)
                .map_err(BundleError::encoding)?;
            content.insert(label, bytes);
        }

        let manifest_json = content
            .remove(MANIFEST_FILENAME)
            .ok_or(BundleError::MissingManifest)?;
        let manifest: Manifest = serde_json::from_slice(&manifest_json)?;

        debug!("Decoded bundle with {} entries", content.len());
        Ok(Self { content, manifest })
    }
}

/// Why `label` cannot name a bundle entry, if it cannot.
fn label_problem(label: &str) -> Option<&'static str> {
    if label.is_empty() {
        Some("label is empty")
    } else if label.contains('/') || label.contains('\\') {
        Some("label must not contain path separators")
    } else if label == "." || label == ".." {
        Some("label must name a file")
    } else if label == MANIFEST_FILENAME {
        Some("label is reserved for the bundle manifest")
    } else {
        None
    }
}

fn validate_label(label: &str) -> Result<()> {
    match label_problem(label) {
        Some(reason) => Err(BundleError::InvalidLabel {
            label: label.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

fn append_entry<W: Write>(
    archive: &mut Builder<W>,
    path: &str,
    content: &[u8],
    modified: DateTime<Utc>,
) -> Result<()> {
    let mut header = Header::new_gnu();
    header.set_entry_type(EntryType::Regular);
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(modified.timestamp().max(0) as u64);
    header.set_cksum();

    archive
        .append_data(&mut header, path, content)
        .map_err(BundleError::encoding)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn props(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn contents(bundle: &Bundle) -> Vec<(String, Vec<u8>, BTreeMap<String, String>)> {
        bundle
            .entries()
            .map(|(label, bytes)| {
                (
                    label.to_string(),
                    bytes.to_vec(),
                    bundle.descriptor(label).unwrap().properties.clone(),
                )
            })
            .collect()
    }

    fn tarball(entries: &[(&str, EntryType, &[u8])]) -> Vec<u8> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut archive = Builder::new(encoder);
        for (path, entry_type, data) in entries {
            let mut header = Header::new_gnu();
            header.set_entry_type(*entry_type);
            header.set_size(data.len() as u64);
            header.set_mode(0o755);
            header.set_cksum();
            archive.append_data(&mut header, path, *data).unwrap();
        }
        archive.into_inner().unwrap().finish().unwrap()
    }

    #[test]
    fn test_round_trip_empty_bundle() {
        let bundle = Bundle::new();
        let decoded = Bundle::from_bytes(&bundle.to_bytes().unwrap()).unwrap();
        assert!(decoded.is_empty());
        assert_eq!(decoded.manifest(), bundle.manifest());
    }

    #[test]
    fn test_round_trip_many_entries() {
        let mut bundle = Bundle::new();
        bundle
            .add("grype.json", b"{\"matches\":[]}".to_vec(), props(&[("filetype", "grype")]))
            .unwrap();
        bundle.add("empty.txt", Vec::new(), BTreeMap::new()).unwrap();
        bundle
            .add("notes.md", "# notes".as_bytes(), props(&[("owner", "sec"), ("kind", "doc")]))
            .unwrap();

        let mut buf = Vec::new();
        bundle.encode(&mut buf).unwrap();
        let decoded = Bundle::decode(&buf[..]).unwrap();

        assert_eq!(contents(&decoded), contents(&bundle));
        assert_eq!(decoded.get("empty.txt").unwrap(), b"");
        assert_eq!(decoded, bundle);
    }

    #[test]
    fn test_manifest_never_listed_after_decode() {
        let mut bundle = Bundle::new();
        bundle.add("a.txt", b"a".to_vec(), BTreeMap::new()).unwrap();
        let decoded = Bundle::from_bytes(&bundle.to_bytes().unwrap()).unwrap();

        assert_eq!(decoded.labels().collect::<Vec<_>>(), vec!["a.txt"]);
        assert!(decoded.get(MANIFEST_FILENAME).is_err());
        assert!(decoded.descriptor(MANIFEST_FILENAME).is_none());
    }

    #[test]
    fn test_encode_leaves_bundle_untouched() {
        let mut bundle = Bundle::new();
        bundle.add("a.txt", b"a".to_vec(), BTreeMap::new()).unwrap();
        let before = bundle.clone();

        bundle.to_bytes().unwrap();

        assert_eq!(bundle, before);
        assert_eq!(bundle.len(), 1);
    }

    #[test]
    fn test_add_overwrites_entry_and_digest() {
        let mut bundle = Bundle::new();
        bundle.add("x", b"first".to_vec(), props(&[("v", "1")])).unwrap();
        bundle.add("x", b"second".to_vec(), props(&[("v", "2")])).unwrap();

        assert_eq!(bundle.len(), 1);
        assert_eq!(bundle.manifest().files.len(), 1);
        assert_eq!(bundle.get("x").unwrap(), b"second");
        let descriptor = bundle.descriptor("x").unwrap();
        assert_eq!(descriptor.digest, scangate_common::hash::sha256_bytes(b"second"));
        assert_eq!(descriptor.properties, props(&[("v", "2")]));
    }

    #[test]
    fn test_remove_and_get() {
        let mut bundle = Bundle::new();
        bundle.add("a", b"a".to_vec(), BTreeMap::new()).unwrap();
        bundle.remove("a");
        bundle.remove("never-added");

        assert!(bundle.is_empty());
        assert!(bundle.manifest().files.is_empty());
        assert!(matches!(bundle.get("a"), Err(BundleError::NotFound(label)) if label == "a"));
    }

    #[test]
    fn test_add_rejects_bad_labels() {
        let mut bundle = Bundle::new();
        for label in ["", "dir/file", "..", MANIFEST_FILENAME] {
            let err = bundle.add(label, b"x".to_vec(), BTreeMap::new()).unwrap_err();
            assert!(matches!(err, BundleError::InvalidLabel { .. }), "{label}");
        }
        assert!(bundle.is_empty());
    }

    #[test]
    fn test_decode_requires_manifest() {
        let raw = tarball(&[("report.json", EntryType::Regular, b"{}".as_slice())]);
        let err = Bundle::from_bytes(&raw).unwrap_err();
        assert!(matches!(err, BundleError::MissingManifest));
        assert!(err.is_encoding());
    }

    #[test]
    fn test_decode_rejects_directories() {
        let manifest = serde_json::to_vec(&Manifest::default()).unwrap();
        let raw = tarball(&[
            (MANIFEST_FILENAME, EntryType::Regular, manifest.as_slice()),
            ("reports", EntryType::Directory, b"".as_slice()),
        ]);
        let err = Bundle::from_bytes(&raw).unwrap_err();
        assert!(matches!(err, BundleError::InvalidEntry { .. }));
    }

    #[test]
    fn test_decode_rejects_nested_paths() {
        let manifest = serde_json::to_vec(&Manifest::default()).unwrap();
        let raw = tarball(&[
            (MANIFEST_FILENAME, EntryType::Regular, manifest.as_slice()),
            ("reports/grype.json", EntryType::Regular, b"{}".as_slice()),
        ]);
        let err = Bundle::from_bytes(&raw).unwrap_err();
        assert!(matches!(err, BundleError::InvalidEntry { path, .. } if path == "reports/grype.json"));
    }

    #[test]
    fn test_decode_rejects_labels_add_would_refuse() {
        let manifest = serde_json::to_vec(&Manifest::default()).unwrap();
        let raw = tarball(&[
            (MANIFEST_FILENAME, EntryType::Regular, manifest.as_slice()),
            ("reports\\grype.json", EntryType::Regular, b"{}".as_slice()),
        ]);
        let err = Bundle::from_bytes(&raw).unwrap_err();
        assert!(
            matches!(err, BundleError::InvalidEntry { ref path, .. } if path == "reports\\grype.json"),
            "{err}"
        );

        let mut bundle = Bundle::new();
        assert!(bundle.add("reports\\grype.json", b"{}".to_vec(), props(&[])).is_err());
    }

    #[test]
    fn test_decode_garbage_is_encoding_error() {
        let err = Bundle::from_bytes(b"definitely not gzip").unwrap_err();
        assert!(err.is_encoding(), "{err}");
    }

    #[test]
    fn test_nested_bundle_entry() {
        let mut inner = Bundle::new();
        inner.add("inner.txt", b"inner".to_vec(), BTreeMap::new()).unwrap();

        let mut outer = Bundle::new();
        outer
            .add("inner.tar.gz", inner.to_bytes().unwrap(), BTreeMap::new())
            .unwrap();

        let decoded = Bundle::from_bytes(&outer.to_bytes().unwrap()).unwrap();
        let nested = Bundle::from_bytes(decoded.get("inner.tar.gz").unwrap()).unwrap();
        assert_eq!(nested.get("inner.txt").unwrap(), b"inner");
    }
}
