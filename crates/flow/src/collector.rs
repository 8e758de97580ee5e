//! Gathering one signature per required signer.
//!
//! A [`SignatureCollection`] tracks a transaction through
//! `Unsigned -> ProposerSigned -> AwaitingCounterparties` and then into
//! exactly one of `QuorumReached`, `Rejected` or `TimedOut`. Only a
//! collection that reached quorum yields a transaction that can be
//! notarized.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use idledger_core::{KeyPair, PartyIdentity, PublicKey, SignedTransaction, TransactionSignature};
use tokio::task::JoinSet;

use crate::directory::Directory;
use crate::error::FlowError;
use crate::network::{Network, SignatureResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionState {
    Unsigned,
    ProposerSigned,
    AwaitingCounterparties,
    QuorumReached,
    Rejected,
    TimedOut,
}

impl CollectionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CollectionState::QuorumReached | CollectionState::Rejected | CollectionState::TimedOut
        )
    }
}

#[derive(Debug, Clone)]
pub struct SignatureCollection {
    state: CollectionState,
    stx: SignedTransaction,
    required: BTreeSet<PublicKey>,
}

impl SignatureCollection {
    pub fn new(stx: SignedTransaction, required: BTreeSet<PublicKey>) -> Self {
        Self {
            state: CollectionState::Unsigned,
            stx,
            required,
        }
    }

    pub fn state(&self) -> CollectionState {
        self.state
    }

    pub fn transaction(&self) -> &SignedTransaction {
        &self.stx
    }

    /// Required signers that have not signed yet.
    pub fn pending(&self) -> BTreeSet<PublicKey> {
        self.stx.missing_signers(&self.required)
    }

    pub fn sign_as_proposer(&mut self, keys: &KeyPair) -> Result<(), FlowError> {
        if self.state != CollectionState::Unsigned {
            return Err(FlowError::Integrity(format!(
                "proposer cannot sign in state {:?}",
                self.state
            )));
        }
        self.stx = self.stx.clone().sign(keys)?;
        self.state = CollectionState::ProposerSigned;
        self.check_quorum();
        Ok(())
    }

    pub fn await_counterparties(&mut self) {
        if self.state == CollectionState::ProposerSigned {
            self.state = CollectionState::AwaitingCounterparties;
        }
    }

    /// Record a counterparty signature. A repeat signature from a signer
    /// that already signed changes nothing.
    pub fn accept(&mut self, signature: TransactionSignature) -> Result<(), FlowError> {
        if self.state.is_terminal() && self.state != CollectionState::QuorumReached {
            return Ok(());
        }
        if !self.required.contains(&signature.signer) {
            return Err(FlowError::Integrity(format!(
                "signature from {} who is not a required signer",
                signature.signer.fingerprint()
            )));
        }
        self.stx = self
            .stx
            .clone()
            .with_signature(signature)
            .map_err(|e| FlowError::Integrity(e.to_string()))?;
        self.check_quorum();
        Ok(())
    }

    pub fn reject(&mut self) {
        self.state = CollectionState::Rejected;
    }

    pub fn time_out(&mut self) {
        self.state = CollectionState::TimedOut;
    }

    fn check_quorum(&mut self) {
        if self.pending().is_empty() {
            self.state = CollectionState::QuorumReached;
        }
    }

    /// The fully signed transaction; fails unless quorum was reached.
    pub fn into_signed(self, directory: &Directory) -> Result<SignedTransaction, FlowError> {
        if self.state == CollectionState::QuorumReached {
            return Ok(self.stx);
        }
        Err(FlowError::MissingSignatures(
            self.pending().iter().map(|k| directory.name_of(k)).collect(),
        ))
    }
}

/// Sends signature requests to every pending counterparty concurrently.
#[derive(Clone)]
pub struct SignatureCollector {
    network: Arc<dyn Network>,
    timeout: Duration,
}

impl SignatureCollector {
    pub fn new(network: Arc<dyn Network>, timeout: Duration) -> Self {
        Self { network, timeout }
    }

    /// Drive `collection` from `ProposerSigned` to a terminal state. The
    /// first rejection or timeout ends collection and cancels the
    /// outstanding requests.
    pub async fn collect(
        &self,
        collection: &mut SignatureCollection,
        directory: &Directory,
    ) -> Result<(), FlowError> {
        collection.await_counterparties();
        if collection.state() == CollectionState::QuorumReached {
            return Ok(());
        }

        let mut requests = JoinSet::new();
        for key in collection.pending() {
            let party = directory
                .by_key(&key)
                .cloned()
                .ok_or_else(|| FlowError::UnknownParty(key.fingerprint()))?;
            let network = Arc::clone(&self.network);
            let stx = collection.transaction().clone();
            let timeout = self.timeout;
            requests.spawn(async move {
                let response = tokio::time::timeout(timeout, network.request_signature(&party, stx))
                    .await
                    .map_err(|_| FlowError::Timeout {
                        party: party.name.clone(),
                        timeout_ms: timeout.as_millis() as u64,
                    })
                    .and_then(|r| r);
                (party, response)
            });
        }

        while let Some(joined) = requests.join_next().await {
            let (party, response) =
                joined.map_err(|e| FlowError::Integrity(format!("signature request failed: {e}")))?;
            if let Err(err) = self.apply(collection, &party, response) {
                requests.abort_all();
                return Err(err);
            }
            if collection.state() == CollectionState::QuorumReached {
                break;
            }
        }
        Ok(())
    }

    fn apply(
        &self,
        collection: &mut SignatureCollection,
        party: &PartyIdentity,
        response: Result<SignatureResponse, FlowError>,
    ) -> Result<(), FlowError> {
        match response {
            Ok(SignatureResponse::Signed(signature)) => {
                if signature.signer != party.key {
                    collection.reject();
                    return Err(FlowError::Integrity(format!(
                        "{} answered with another party's signature",
                        party.name
                    )));
                }
                tracing::debug!(party = %party.name, "signature received");
                collection.accept(signature)
            }
            Ok(SignatureResponse::Invalid { reason }) => {
                collection.reject();
                Err(FlowError::RemoteValidation {
                    party: party.name.clone(),
                    reason,
                })
            }
            Ok(SignatureResponse::Declined { reason }) => {
                collection.reject();
                Err(FlowError::SignatureRejected {
                    party: party.name.clone(),
                    reason,
                })
            }
            Ok(SignatureResponse::Consumed {
                state_ref,
                consumed_by,
            }) => {
                collection.reject();
                Err(FlowError::Conflict {
                    state_ref,
                    consumed_by,
                })
            }
            Ok(SignatureResponse::Unresolved { tx_id }) => {
                collection.time_out();
                Err(FlowError::UnresolvedInput { tx_id })
            }
            Err(err) if err.is_transient() => {
                collection.time_out();
                Err(err)
            }
            Err(err) => {
                collection.reject();
                Err(err)
            }
        }
    }
}
