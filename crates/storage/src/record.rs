use std::collections::BTreeSet;

use idledger_core::{
    AttachmentHash, PublicKey, SignedTransaction, StateAndRef, StateRef, Transaction,
};

/// Everything one party writes when it commits a notarized transaction.
///
/// Applied as a single atomic transition: the consumed versions stop being
/// live and the produced versions become live, or nothing changes.
#[derive(Debug, Clone)]
pub struct CommitRecord {
    pub transaction: SignedTransaction,
    pub consumed: Vec<StateRef>,
    /// Produced versions this party is a stakeholder of.
    pub produced: Vec<StateAndRef>,
    pub attachments: BTreeSet<AttachmentHash>,
}

impl CommitRecord {
    /// Build the commit for the party holding `party_key`.
    ///
    /// Every party marks the inputs consumed, but only stakeholders of an
    /// output keep it as a live version.
    pub fn for_party(stx: SignedTransaction, tx: &Transaction, party_key: &PublicKey) -> Self {
        let tx_id = stx.id();
        let produced = tx
            .outputs
            .iter()
            .enumerate()
            .filter(|(_, state)| state.is_relevant_to(party_key))
            .map(|(index, state)| StateAndRef {
                state: state.clone(),
                state_ref: StateRef {
                    tx_id,
                    index: index as u32,
                },
                notary: tx.notary.clone(),
            })
            .collect();
        Self {
            transaction: stx,
            consumed: tx.consumed_refs(),
            produced,
            attachments: tx.attachments.clone(),
        }
    }
}

/// Result of applying a [`CommitRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Applied,
    /// The transaction was committed before; nothing changed.
    AlreadyApplied,
}

/// Result of storing an attachment blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentStored {
    New(AttachmentHash),
    /// Identical bytes were already stored under this hash.
    Existing(AttachmentHash),
}

impl AttachmentStored {
    pub fn hash(&self) -> AttachmentHash {
        match self {
            AttachmentStored::New(h) | AttachmentStored::Existing(h) => *h,
        }
    }
}
