//! In-memory backends, used by tests and the simulation network.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use idledger_core::{
    AttachmentHash, LinearId, SecureHash, SignedTransaction, StateAndRef, StateRef, TxId,
};
use tokio::sync::RwLock;

use crate::error::StorageError;
use crate::record::{AttachmentStored, CommitOutcome, CommitRecord};
use crate::traits::{AttachmentStore, LedgerStore};

#[derive(Debug, Default)]
struct LedgerState {
    live: BTreeMap<LinearId, StateAndRef>,
    consumed: HashMap<StateRef, TxId>,
    transactions: HashMap<TxId, SignedTransaction>,
    attachment_refs: BTreeSet<AttachmentHash>,
}

impl LedgerState {
    /// Reject the commit without touching anything.
    fn check(&self, commit: &CommitRecord) -> Result<(), StorageError> {
        let tx_id = commit.transaction.id();
        for state_ref in &commit.consumed {
            if let Some(consumed_by) = self.consumed.get(state_ref) {
                if *consumed_by != tx_id {
                    return Err(StorageError::InputAlreadyConsumed {
                        state_ref: *state_ref,
                        consumed_by: *consumed_by,
                    });
                }
            }
        }
        for produced in &commit.produced {
            if let Some(live) = self.live.get(&produced.state.linear_id) {
                if !commit.consumed.contains(&live.state_ref) {
                    return Err(StorageError::LinearFork {
                        linear_id: produced.state.linear_id.clone(),
                        live: live.state_ref,
                    });
                }
            }
        }
        Ok(())
    }

    fn apply(&mut self, commit: CommitRecord) {
        let tx_id = commit.transaction.id();
        for state_ref in &commit.consumed {
            self.consumed.insert(*state_ref, tx_id);
        }
        self.live
            .retain(|_, live| !commit.consumed.contains(&live.state_ref));
        for produced in commit.produced {
            self.live.insert(produced.state.linear_id.clone(), produced);
        }
        self.attachment_refs.extend(commit.attachments);
        self.transactions.insert(tx_id, commit.transaction);
    }
}

/// A [`LedgerStore`] held entirely in memory behind one lock, so every
/// commit is trivially atomic.
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    state: RwLock<LedgerState>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn current_live_version(
        &self,
        linear_id: &LinearId,
    ) -> Result<Option<StateAndRef>, StorageError> {
        Ok(self.state.read().await.live.get(linear_id).cloned())
    }

    async fn list_live(&self) -> Result<Vec<StateAndRef>, StorageError> {
        Ok(self.state.read().await.live.values().cloned().collect())
    }

    async fn consumed_by(&self, state_ref: &StateRef) -> Result<Option<TxId>, StorageError> {
        Ok(self.state.read().await.consumed.get(state_ref).copied())
    }

    async fn transaction(&self, tx_id: &TxId) -> Result<Option<SignedTransaction>, StorageError> {
        Ok(self.state.read().await.transactions.get(tx_id).cloned())
    }

    async fn referenced_attachments(&self) -> Result<BTreeSet<AttachmentHash>, StorageError> {
        Ok(self.state.read().await.attachment_refs.clone())
    }

    async fn apply_commit(&self, commit: CommitRecord) -> Result<CommitOutcome, StorageError> {
        let mut state = self.state.write().await;
        if state.transactions.contains_key(&commit.transaction.id()) {
            return Ok(CommitOutcome::AlreadyApplied);
        }
        state.check(&commit)?;
        tracing::debug!(
            tx_id = %commit.transaction.id().short(),
            consumed = commit.consumed.len(),
            produced = commit.produced.len(),
            "applying commit"
        );
        state.apply(commit);
        Ok(CommitOutcome::Applied)
    }
}

/// An [`AttachmentStore`] held in memory.
#[derive(Debug, Default)]
pub struct MemoryAttachmentStore {
    blobs: RwLock<HashMap<AttachmentHash, Vec<u8>>>,
}

impl MemoryAttachmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AttachmentStore for MemoryAttachmentStore {
    async fn store(&self, bytes: Vec<u8>) -> Result<AttachmentStored, StorageError> {
        let hash = SecureHash::sha256(&bytes);
        let mut blobs = self.blobs.write().await;
        if blobs.contains_key(&hash) {
            return Ok(AttachmentStored::Existing(hash));
        }
        blobs.insert(hash, bytes);
        Ok(AttachmentStored::New(hash))
    }

    async fn fetch(&self, hash: &AttachmentHash) -> Result<Vec<u8>, StorageError> {
        self.blobs
            .read()
            .await
            .get(hash)
            .cloned()
            .ok_or(StorageError::AttachmentNotFound { hash: *hash })
    }

    async fn contains(&self, hash: &AttachmentHash) -> Result<bool, StorageError> {
        Ok(self.blobs.read().await.contains_key(hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn duplicate_blob_reports_existing() {
        let store = MemoryAttachmentStore::new();
        let first = store.store(b"scan".to_vec()).await.unwrap();
        let second = store.store(b"scan".to_vec()).await.unwrap();
        assert!(matches!(first, AttachmentStored::New(_)));
        assert_eq!(second, AttachmentStored::Existing(first.hash()));
    }

    #[tokio::test]
    async fn unknown_blob_is_not_found() {
        let store = MemoryAttachmentStore::new();
        let err = store.fetch(&SecureHash::sha256(b"nope")).await.unwrap_err();
        assert!(matches!(err, StorageError::AttachmentNotFound { .. }));
    }
}
