//! Content hashing for resource bodies.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Digest of a resource body.
///
/// Locally the hash is persisted base64-encoded; the service reports it as
/// raw bytes. Comparisons always happen on the decoded bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(Vec<u8>);

impl ContentHash {
    /// Wraps raw digest bytes.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Computes the digest of a body.
    #[must_use]
    pub fn of(body: &[u8]) -> Self {
        Self(Sha256::digest(body).to_vec())
    }

    /// Decodes a persisted base64 hash. Returns `None` for malformed input.
    #[must_use]
    pub fn from_base64(encoded: &str) -> Option<Self> {
        STANDARD.decode(encoded.trim()).ok().map(Self)
    }

    /// Encodes the hash for persistence.
    #[must_use]
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.0)
    }

    /// Returns the raw digest bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_stable() {
        assert_eq!(ContentHash::of(b"body"), ContentHash::of(b"body"));
        assert_ne!(ContentHash::of(b"body"), ContentHash::of(b"other"));
        assert_eq!(ContentHash::of(b"").as_bytes().len(), 32);
    }

    #[test]
    fn persisted_encoding_decodes_to_same_hash() {
        let hash = ContentHash::of(b"attachment");
        let encoded = hash.to_base64();
        assert_eq!(ContentHash::from_base64(&encoded), Some(hash));
    }

    #[test]
    fn malformed_encoding_is_none() {
        assert_eq!(ContentHash::from_base64("not base64!!"), None);
    }
}
