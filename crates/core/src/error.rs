use crate::hash::TxId;

/// Errors raised while decoding, hashing, or signing ledger values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// A hex-encoded hash could not be parsed.
    #[error("invalid hash '{value}': {reason}")]
    InvalidHash { value: String, reason: String },

    /// Bytes that do not form a valid Ed25519 verifying key.
    #[error("invalid public key: {0}")]
    InvalidKey(String),

    /// A signature did not verify against the transaction id.
    #[error("invalid signature from {signer}")]
    InvalidSignature { signer: String },

    /// The wire bytes of a signed transaction no longer hash to its id.
    #[error("transaction id mismatch: expected {expected}, wire bytes hash to {actual}")]
    TxIdMismatch { expected: TxId, actual: TxId },

    /// One or more required signers have not signed.
    #[error("missing signatures from {}", .0.join(", "))]
    MissingSignatures(Vec<String>),

    /// A date string that is not `YYYY-MM-DD`.
    #[error("invalid date '{value}': {reason}")]
    InvalidDate { value: String, reason: String },

    /// A transaction builder was finished before a required part was set.
    #[error("incomplete transaction: {0}")]
    IncompleteTransaction(String),

    /// Serialization or deserialization of a wire value failed.
    #[error("encoding error: {0}")]
    Encoding(String),
}
