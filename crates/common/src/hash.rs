//! Content digests for bundle entries.

use sha2::{Digest, Sha256};

/// Length of a hex-encoded SHA256 digest.
pub const SHA256_HEX_LEN: usize = 64;

/// Compute the lowercase hex SHA256 digest of bytes.
pub fn sha256_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Check that a string looks like a digest produced by [`sha256_bytes`].
pub fn is_sha256_hex(digest: &str) -> bool {
    digest.len() == SHA256_HEX_LEN
        && digest
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
