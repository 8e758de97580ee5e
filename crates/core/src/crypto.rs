//! Ed25519 keys and transaction signatures.
//!
//! Keys and signatures travel as base64 strings, the same encoding the
//! `keygen` command writes to disk.

use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;
use crate::hash::TxId;

/// A party's Ed25519 verifying key.
///
/// Stored as raw bytes so it can be ordered and used as a map key; the
/// bytes are checked to be a valid curve point on construction.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PublicKey([u8; 32]);

impl PublicKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, CoreError> {
        VerifyingKey::from_bytes(&bytes).map_err(|e| CoreError::InvalidKey(e.to_string()))?;
        Ok(Self(bytes))
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0
    }

    pub fn from_base64(encoded: &str) -> Result<Self, CoreError> {
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|e| CoreError::InvalidKey(e.to_string()))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CoreError::InvalidKey("expected 32 bytes".to_string()))?;
        Self::from_bytes(bytes)
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0)
    }

    /// Short hex fingerprint (first 8 key bytes).
    pub fn fingerprint(&self) -> String {
        self.0[..8].iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Verify `signature` over `message` with this key.
    pub fn verify(&self, message: &[u8], signature: &SignatureBytes) -> Result<(), CoreError> {
        let key =
            VerifyingKey::from_bytes(&self.0).map_err(|e| CoreError::InvalidKey(e.to_string()))?;
        key.verify(message, &Signature::from_bytes(&signature.0))
            .map_err(|_| CoreError::InvalidSignature {
                signer: self.fingerprint(),
            })
    }
}

impl From<VerifyingKey> for PublicKey {
    fn from(key: VerifyingKey) -> Self {
        Self(key.to_bytes())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.fingerprint())
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_base64(&s).map_err(serde::de::Error::custom)
    }
}

/// A raw 64-byte Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SignatureBytes([u8; 64]);

impl SignatureBytes {
    pub fn to_bytes(&self) -> [u8; 64] {
        self.0
    }
}

impl fmt::Debug for SignatureBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignatureBytes({}..)", hex::encode(&self.0[..6]))
    }
}

impl Serialize for SignatureBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(self.0))
    }
}

impl<'de> Deserialize<'de> for SignatureBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = BASE64.decode(s.trim()).map_err(serde::de::Error::custom)?;
        let bytes: [u8; 64] = bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("expected 64 signature bytes"))?;
        Ok(Self(bytes))
    }
}

/// One signer's signature over a transaction id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSignature {
    pub signer: PublicKey,
    pub signature: SignatureBytes,
}

impl TransactionSignature {
    pub fn verify(&self, tx_id: &TxId) -> Result<(), CoreError> {
        self.signer.verify(tx_id.as_bytes(), &self.signature)
    }
}

/// A party's signing key.
#[derive(Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    pub fn generate() -> Self {
        let mut rng = rand::rngs::OsRng;
        Self {
            signing_key: SigningKey::generate(&mut rng),
        }
    }

    /// Rebuild a key pair from its 32-byte seed.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    pub fn seed(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    pub fn public_key(&self) -> PublicKey {
        self.signing_key.verifying_key().into()
    }

    pub fn sign(&self, message: &[u8]) -> SignatureBytes {
        SignatureBytes(self.signing_key.sign(message).to_bytes())
    }

    pub fn sign_transaction(&self, tx_id: &TxId) -> TransactionSignature {
        TransactionSignature {
            signer: self.public_key(),
            signature: self.sign(tx_id.as_bytes()),
        }
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

/// Serde adapter for byte vectors carried as base64 strings.
pub(crate) mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        BASE64.decode(s.trim()).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::SecureHash;

    #[test]
    fn signature_verifies_against_signer_key() {
        let keys = KeyPair::generate();
        let id = SecureHash::sha256(b"tx");
        let sig = keys.sign_transaction(&id);
        sig.verify(&id).expect("signature should verify");
    }

    #[test]
    fn signature_does_not_verify_for_other_id() {
        let keys = KeyPair::generate();
        let sig = keys.sign_transaction(&SecureHash::sha256(b"tx-1"));
        let err = sig.verify(&SecureHash::sha256(b"tx-2")).unwrap_err();
        assert!(matches!(err, CoreError::InvalidSignature { .. }));
    }

    #[test]
    fn seed_roundtrip_preserves_public_key() {
        let keys = KeyPair::generate();
        let restored = KeyPair::from_seed(keys.seed());
        assert_eq!(keys.public_key(), restored.public_key());
    }

    #[test]
    fn public_key_base64_roundtrip() {
        let key = KeyPair::generate().public_key();
        assert_eq!(PublicKey::from_base64(&key.to_base64()).unwrap(), key);
    }

    #[test]
    fn public_key_rejects_wrong_length() {
        assert!(PublicKey::from_base64("AAAA").is_err());
    }
}
