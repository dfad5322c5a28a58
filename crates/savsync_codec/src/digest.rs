//! Content hashing for error-archive naming.
//!
//! Archived copies of files the codec rejected are named after a hash of
//! their own contents, so repeated backups of identical content never
//! collide or duplicate. The digest is not part of the wire format.

use sha2::{Digest, Sha256};

/// Hashes file contents for a content-addressed backup name.
///
/// Returns the SHA-256 digest rendered as lowercase hex.
#[must_use]
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vector() {
        // SHA-256 of the empty string.
        assert_eq!(
            content_hash(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn lowercase_hex() {
        let digest = content_hash(b"some save data");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn identical_content_identical_name() {
        assert_eq!(content_hash(b"abc"), content_hash(b"abc"));
        assert_ne!(content_hash(b"abc"), content_hash(b"abd"));
    }
}
