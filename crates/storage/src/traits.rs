use std::collections::BTreeSet;

use async_trait::async_trait;
use idledger_core::{
    AttachmentHash, LinearId, SignedTransaction, StateAndRef, StateRef, TxId,
};

use crate::error::StorageError;
use crate::record::{AttachmentStored, CommitOutcome, CommitRecord};

/// A party's local view of the ledger.
///
/// ## Commit semantics
///
/// `apply_commit` is the only mutating operation. It must be atomic: either
/// every consumed version is marked consumed and every produced version
/// becomes live, or the store is left unchanged and an error is returned.
///
/// It must also be idempotent: committing a transaction id that is already
/// recorded returns `CommitOutcome::AlreadyApplied` and changes nothing.
///
/// ## Invariants
///
/// - A `LinearId` maps to at most one live version.
/// - A `StateRef` is consumed by at most one transaction.
///
/// Implementations must be `Send + Sync + 'static` so one store can be
/// shared by every flow running on the party.
#[async_trait]
pub trait LedgerStore: Send + Sync + 'static {
    /// Current unconsumed version of a record, if this party tracks one.
    async fn current_live_version(
        &self,
        linear_id: &LinearId,
    ) -> Result<Option<StateAndRef>, StorageError>;

    /// Every live version, ordered by linear id.
    async fn list_live(&self) -> Result<Vec<StateAndRef>, StorageError>;

    /// The transaction that consumed `state_ref`, if this party has seen one.
    async fn consumed_by(&self, state_ref: &StateRef) -> Result<Option<TxId>, StorageError>;

    /// A committed transaction by id.
    async fn transaction(&self, tx_id: &TxId) -> Result<Option<SignedTransaction>, StorageError>;

    /// Hashes of every attachment referenced by a committed transaction.
    async fn referenced_attachments(&self) -> Result<BTreeSet<AttachmentHash>, StorageError>;

    /// Atomically apply a commit.
    async fn apply_commit(&self, commit: CommitRecord) -> Result<CommitOutcome, StorageError>;

    async fn is_consumed(&self, state_ref: &StateRef) -> Result<bool, StorageError> {
        Ok(self.consumed_by(state_ref).await?.is_some())
    }

    /// Live version for a business key.
    async fn find_by_business_key(&self, key: &str) -> Result<Option<StateAndRef>, StorageError> {
        self.current_live_version(&LinearId::from_business_key(key))
            .await
    }
}

/// Content-addressed, write-once blob storage.
#[async_trait]
pub trait AttachmentStore: Send + Sync + 'static {
    /// Store `bytes` under their SHA-256 hash. Storing identical bytes
    /// again is not an error and reports `AttachmentStored::Existing`.
    async fn store(&self, bytes: Vec<u8>) -> Result<AttachmentStored, StorageError>;

    /// Returns `Err(StorageError::AttachmentNotFound)` for an unknown hash.
    async fn fetch(&self, hash: &AttachmentHash) -> Result<Vec<u8>, StorageError>;

    async fn contains(&self, hash: &AttachmentHash) -> Result<bool, StorageError>;
}
