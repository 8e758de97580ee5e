//! The outcome of one orchestrated flow.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::hash::TxId;

/// Classification of every way a flow can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// Create targeted a business key that is already live.
    DuplicateKey,
    /// Update or delete targeted a business key with no live version.
    NotFound,
    /// A contract rule failed, locally or at a counterparty or recipient.
    Validation,
    /// A counterparty declined to sign.
    SignatureRejected,
    /// A counterparty or the notary did not answer in time.
    Timeout,
    /// The notary saw the input already consumed by another transaction.
    Conflict,
    /// The validity window closed before notarization.
    Expired,
}

impl FailureKind {
    /// Stable reason prefix.
    pub fn code(&self) -> &'static str {
        match self {
            FailureKind::DuplicateKey => "DuplicateKeyError",
            FailureKind::NotFound => "NotFoundError",
            FailureKind::Validation => "ValidationError",
            FailureKind::SignatureRejected => "SignatureRejected",
            FailureKind::Timeout => "Timeout",
            FailureKind::Conflict => "Conflict",
            FailureKind::Expired => "Expired",
        }
    }

    /// Whether re-running the flow from the build stage may succeed
    /// without a corrected payload.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FailureKind::Timeout | FailureKind::Conflict)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Why a flow failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowFailure {
    pub kind: FailureKind,
    pub reason: String,
}

impl fmt::Display for FlowFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.reason)
    }
}

/// Terminal outcome of a create, update, or delete flow. Exactly one is
/// produced per invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum FlowResult {
    Success { transaction_id: TxId, message: String },
    Failure(FlowFailure),
}

impl FlowResult {
    pub fn success(transaction_id: TxId) -> Self {
        FlowResult::Success {
            transaction_id,
            message: format!("Transaction id {} committed to ledger.", transaction_id),
        }
    }

    pub fn failure(kind: FailureKind, reason: impl Into<String>) -> Self {
        FlowResult::Failure(FlowFailure {
            kind,
            reason: reason.into(),
        })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FlowResult::Success { .. })
    }

    pub fn transaction_id(&self) -> Option<TxId> {
        match self {
            FlowResult::Success { transaction_id, .. } => Some(*transaction_id),
            FlowResult::Failure(_) => None,
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            FlowResult::Success { .. } => None,
            FlowResult::Failure(f) => Some(f.kind),
        }
    }

    /// Text a presentation layer returns to its caller.
    pub fn message(&self) -> String {
        match self {
            FlowResult::Success { message, .. } => message.clone(),
            FlowResult::Failure(f) => f.to_string(),
        }
    }
}

impl fmt::Display for FlowResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowResult::Success { message, .. } => write!(f, "Success({})", message),
            FlowResult::Failure(failure) => write!(f, "Failure({})", failure),
        }
    }
}
