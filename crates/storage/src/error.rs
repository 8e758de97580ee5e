use idledger_core::{AttachmentHash, LinearId, StateRef, TxId};

/// All errors that can be returned by a ledger or attachment store.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The input version was already consumed by a different transaction.
    #[error("input {state_ref} already consumed by transaction {consumed_by}")]
    InputAlreadyConsumed { state_ref: StateRef, consumed_by: TxId },

    /// Committing would leave two live versions of one record.
    #[error("record {linear_id} already has live version {live}")]
    LinearFork { linear_id: LinearId, live: StateRef },

    /// No blob is stored under the hash.
    #[error("attachment not found: {hash}")]
    AttachmentNotFound { hash: AttachmentHash },

    /// The stored content no longer matches its hash.
    #[error("attachment {hash} is corrupt")]
    AttachmentCorrupt { hash: AttachmentHash },

    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
}
