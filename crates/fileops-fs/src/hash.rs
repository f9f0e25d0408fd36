//! Content hashing shared by the filesystem implementations.

use fileops_core::HashAlgorithm;
use sha2::{Digest, Sha256, Sha512};

use crate::FsError;

/// Incremental hasher producing a lowercase hex digest.
pub(crate) trait ContentHasher {
    fn update(&mut self, data: &[u8]);
    fn finish_hex(self: Box<Self>) -> String;
}

struct Sha2Hasher<D>(D);

impl<D: Digest> ContentHasher for Sha2Hasher<D> {
    fn update(&mut self, data: &[u8]) {
        Digest::update(&mut self.0, data);
    }

    fn finish_hex(self: Box<Self>) -> String {
        let Sha2Hasher(digest) = *self;
        digest.finalize().iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl ContentHasher for blake3::Hasher {
    fn update(&mut self, data: &[u8]) {
        blake3::Hasher::update(self, data);
    }

    fn finish_hex(self: Box<Self>) -> String {
        self.finalize().to_hex().to_string()
    }
}

/// Create a hasher for `algorithm`, or fail if it is not available.
pub(crate) fn content_hasher(algorithm: HashAlgorithm) -> Result<Box<dyn ContentHasher>, FsError> {
    match algorithm {
        HashAlgorithm::Sha256 => Ok(Box::new(Sha2Hasher(Sha256::new()))),
        HashAlgorithm::Sha512 => Ok(Box::new(Sha2Hasher(Sha512::new()))),
        HashAlgorithm::Blake3 => Ok(Box::new(blake3::Hasher::new())),
        other => Err(FsError::UnsupportedHash {
            algorithm: other.to_string(),
        }),
    }
}

/// Hash an in-memory buffer.
pub(crate) fn hash_bytes(algorithm: HashAlgorithm, data: &[u8]) -> Result<String, FsError> {
    let mut hasher = content_hasher(algorithm)?;
    hasher.update(data);
    Ok(hasher.finish_hex())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha512_length() {
        let digest = hash_bytes(HashAlgorithm::Sha512, b"hello").unwrap();
        assert_eq!(digest.len(), 128);
    }

    #[test]
    fn test_unsupported_algorithm() {
        assert!(matches!(
            hash_bytes(HashAlgorithm::Crc32, b""),
            Err(FsError::UnsupportedHash { .. })
        ));
    }
}
