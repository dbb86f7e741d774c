//! Bundle archive for scangate.
//!
//! A bundle groups labelled artifacts into a single gzip-compressed tarball
//! indexed by a JSON manifest carrying per-file digests and properties.

pub mod archive;
pub mod error;
pub mod manifest;
pub mod schema;
pub mod update;
pub mod verify;

pub use archive::Bundle;
pub use error::{BundleError, Result};
pub use manifest::{FileDescriptor, Manifest, MANIFEST_FILENAME, MANIFEST_VERSION};
pub use update::{update_in_place, Truncate};
pub use verify::{verify_bundle, VerifyError, VerifyReport};
