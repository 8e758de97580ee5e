use idledger_core::{ContractViolation, CoreError, FailureKind, FlowFailure, StateRef, TxId};
use idledger_storage::StorageError;

/// Everything that can stop a flow.
///
/// Every variant classifies into exactly one [`FailureKind`]; the
/// orchestrator turns the error into a `FlowResult::Failure` carrying that
/// kind and this error's display text as the reason.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("a record with business key {key} already exists")]
    DuplicateKey { key: String },

    #[error("no live record with business key {key}")]
    NotFound { key: String },

    #[error("unknown party: {0}")]
    UnknownParty(String),

    /// The local contract check failed.
    #[error("{0}")]
    Contract(#[from] ContractViolation),

    /// A counterparty's own contract check failed.
    #[error("{party} found the transaction invalid: {reason}")]
    RemoteValidation { party: String, reason: String },

    /// The signed form no longer describes the transaction that was proposed.
    #[error("integrity check failed: {0}")]
    Integrity(String),

    #[error("{party} declined to sign: {reason}")]
    SignatureRejected { party: String, reason: String },

    #[error("missing signatures from {}", .0.join(", "))]
    MissingSignatures(Vec<String>),

    #[error("{party} did not respond within {timeout_ms}ms")]
    Timeout { party: String, timeout_ms: u64 },

    #[error("{party} is unreachable")]
    Unreachable { party: String },

    /// No stakeholder could supply a transaction this party is missing.
    #[error("transaction {tx_id} is not available from any stakeholder")]
    UnresolvedInput { tx_id: TxId },

    #[error("input {state_ref} was already consumed by transaction {consumed_by}")]
    Conflict { state_ref: StateRef, consumed_by: TxId },

    #[error("time window ended at {until} before notarization")]
    Expired { until: String },

    #[error("notary refused the transaction: {0}")]
    NotaryRefused(String),

    #[error("invalid transaction: {0}")]
    Core(#[from] CoreError),

    #[error("storage: {0}")]
    Storage(#[from] StorageError),
}

impl FlowError {
    pub fn kind(&self) -> FailureKind {
        match self {
            FlowError::DuplicateKey { .. } => FailureKind::DuplicateKey,
            FlowError::NotFound { .. } | FlowError::UnknownParty(_) => FailureKind::NotFound,
            FlowError::Contract(_)
            | FlowError::RemoteValidation { .. }
            | FlowError::Integrity(_)
            | FlowError::NotaryRefused(_)
            | FlowError::Core(_)
            | FlowError::Storage(_) => FailureKind::Validation,
            FlowError::SignatureRejected { .. } | FlowError::MissingSignatures(_) => {
                FailureKind::SignatureRejected
            }
            FlowError::Timeout { .. }
            | FlowError::Unreachable { .. }
            | FlowError::UnresolvedInput { .. } => FailureKind::Timeout,
            FlowError::Conflict { .. } => FailureKind::Conflict,
            FlowError::Expired { .. } => FailureKind::Expired,
        }
    }

    /// Errors a delivery can recover from by trying again later.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FlowError::Timeout { .. }
                | FlowError::Unreachable { .. }
                | FlowError::UnresolvedInput { .. }
        )
    }

    pub fn to_failure(&self) -> FlowFailure {
        FlowFailure {
            kind: self.kind(),
            reason: self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use idledger_core::SecureHash;

    #[test]
    fn failure_reason_is_prefixed_by_kind() {
        let err = FlowError::DuplicateKey {
            key: "X1".to_string(),
        };
        assert_eq!(
            err.to_failure().to_string(),
            "DuplicateKeyError: a record with business key X1 already exists"
        );
    }

    #[test]
    fn unreachable_counts_as_timeout() {
        let err = FlowError::Unreachable {
            party: "BankB".to_string(),
        };
        assert_eq!(err.kind(), FailureKind::Timeout);
        assert!(err.kind().is_retryable());
        assert!(err.is_transient());
    }

    #[test]
    fn missing_history_is_retried_later() {
        let err = FlowError::UnresolvedInput {
            tx_id: SecureHash::sha256(b"v2"),
        };
        assert_eq!(err.kind(), FailureKind::Timeout);
        assert!(err.is_transient());
    }

    #[test]
    fn conflict_is_retryable_but_not_transient() {
        let err = FlowError::Conflict {
            state_ref: StateRef {
                tx_id: SecureHash::sha256(b"a"),
                index: 0,
            },
            consumed_by: SecureHash::sha256(b"b"),
        };
        assert_eq!(err.kind(), FailureKind::Conflict);
        assert!(err.kind().is_retryable());
        assert!(!err.is_transient());
    }
}
