//! SHA-256 content hashing
//!
//! Entry states and the once-script history are keyed by the SHA-256 of
//! contents, so hashes recorded by one machine stay meaningful on another.

use sha2::{Digest, Sha256};

/// A SHA-256 digest
pub type Sha256Hash = [u8; 32];

/// Hash content with SHA-256
///
/// # Examples
///
/// ```
/// use hearth_engine::hash::{hash_content, to_hex};
///
/// let hash = hash_content(b"");
/// assert_eq!(
///     to_hex(&hash),
///     "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
/// );
/// ```
#[must_use]
pub fn hash_content(content: &[u8]) -> Sha256Hash {
    Sha256::digest(content).into()
}

/// Lowercase hex encoding of a digest
pub fn to_hex(hash: &Sha256Hash) -> String {
    hex::encode(hash)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_hash_content_known_value() {
        assert_eq!(
            to_hex(&hash_content(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_hash_content_different() {
        assert_ne!(hash_content(b"Hello, world!"), hash_content(b"Hello, world?"));
    }
}
