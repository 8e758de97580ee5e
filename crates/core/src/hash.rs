//! SHA-256 content hashes used for transaction ids and attachment ids.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::CoreError;

/// A 32-byte SHA-256 digest, displayed as lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SecureHash([u8; 32]);

/// Identifier of a transaction: the hash of its wire bytes.
pub type TxId = SecureHash;

/// Identifier of an attachment blob: the hash of its content.
pub type AttachmentHash = SecureHash;

impl SecureHash {
    /// Hash arbitrary bytes.
    pub fn sha256(bytes: &[u8]) -> Self {
        Self(Sha256::digest(bytes).into())
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First 12 hex characters, for log lines.
    pub fn short(&self) -> String {
        self.to_hex()[..12].to_string()
    }
}

impl fmt::Display for SecureHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for SecureHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecureHash({})", self.short())
    }
}

impl FromStr for SecureHash {
    type Err = CoreError;

    /// Accepts upper- or lowercase hex.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s.trim()).map_err(|e| CoreError::InvalidHash {
            value: s.to_string(),
            reason: e.to_string(),
        })?;
        let bytes: [u8; 32] = bytes.try_into().map_err(|_| CoreError::InvalidHash {
            value: s.to_string(),
            reason: "expected 32 bytes".to_string(),
        })?;
        Ok(Self(bytes))
    }
}

impl Serialize for SecureHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for SecureHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(SecureHash::sha256(b"abc"), SecureHash::sha256(b"abc"));
        assert_ne!(SecureHash::sha256(b"abc"), SecureHash::sha256(b"abd"));
    }

    #[test]
    fn known_sha256_vector() {
        assert_eq!(
            SecureHash::sha256(b"abc").to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn parses_uppercase_hex() {
        let h = SecureHash::sha256(b"doc");
        let parsed: SecureHash = h.to_hex().to_uppercase().parse().unwrap();
        assert_eq!(parsed, h);
    }

    #[test]
    fn rejects_short_hex() {
        let err = "abcd".parse::<SecureHash>().unwrap_err();
        assert!(matches!(err, CoreError::InvalidHash { .. }));
    }
}
