//! Rewriting a bundle archive in place.

use crate::archive::Bundle;
use crate::error::Result;
use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use tracing::info;

/// A destination that can be emptied before it is rewritten.
pub trait Truncate {
    /// Discard all existing content.
    fn truncate(&mut self) -> io::Result<()>;
}

impl Truncate for File {
    fn truncate(&mut self) -> io::Result<()> {
        self.set_len(0)
    }
}

impl Truncate for Cursor<Vec<u8>> {
    fn truncate(&mut self) -> io::Result<()> {
        self.get_mut().clear();
        Ok(())
    }
}

/// Decode the bundle stored in `dest`, apply `edit`, and write the result
/// back over `dest`.
///
/// An empty destination starts a new bundle. The new archive is fully encoded
/// before `dest` is truncated, so a failing `edit` or encode leaves the
/// destination untouched.
pub fn update_in_place<D, F>(dest: &mut D, edit: F) -> Result<Bundle>
where
    D: Read + Write + Seek + Truncate,
    F: FnOnce(&mut Bundle) -> Result<()>,
{
    dest.seek(SeekFrom::Start(0))?;
    let mut existing = Vec::new();
    dest.read_to_end(&mut existing)?;

    let mut bundle = if existing.is_empty() {
        Bundle::new()
    } else {
        Bundle::from_bytes(&existing)?
    };

    edit(&mut bundle)?;
    let encoded = bundle.to_bytes()?;

    dest.truncate()?;
    dest.seek(SeekFrom::Start(0))?;
    dest.write_all(&encoded)?;
    dest.flush()?;

    info!(
        "Bundle rewritten with {} entries ({} bytes)",
        bundle.len(),
        encoded.len()
    );
    Ok(bundle)
}
