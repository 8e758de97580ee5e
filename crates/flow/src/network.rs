//! Message passing between parties.
//!
//! [`Network`] is the seam the protocol talks through. [`LocalNetwork`]
//! routes calls between parties living in one process, with per-party
//! reachability toggles for exercising timeouts and redelivery.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use idledger_core::{
    PartyIdentity, PublicKey, SignedTransaction, StateRef, TransactionSignature, TxId,
};
use idledger_storage::CommitOutcome;
use tokio::sync::RwLock;

use crate::error::FlowError;
use crate::notary::NotaryService;

/// A counterparty's answer to a signature request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureResponse {
    Signed(TransactionSignature),
    /// The counterparty's contract check failed.
    Invalid { reason: String },
    /// The counterparty already saw the input consumed by another transaction.
    Consumed { state_ref: StateRef, consumed_by: TxId },
    /// The counterparty could not fetch the history behind an input.
    Unresolved { tx_id: TxId },
    /// The counterparty declined for any other reason.
    Declined { reason: String },
}

/// Requests a party serves for its peers.
#[async_trait]
pub trait Counterparty: Send + Sync + 'static {
    async fn sign(&self, stx: SignedTransaction) -> SignatureResponse;

    /// Re-validate and commit a notarized transaction.
    async fn receive_finalized(&self, stx: SignedTransaction) -> Result<CommitOutcome, FlowError>;

    /// A transaction this party has committed.
    async fn transaction(&self, tx_id: &TxId) -> Result<Option<SignedTransaction>, FlowError>;
}

/// Outbound calls a flow makes.
#[async_trait]
pub trait Network: Send + Sync + 'static {
    async fn request_signature(
        &self,
        to: &PartyIdentity,
        stx: SignedTransaction,
    ) -> Result<SignatureResponse, FlowError>;

    async fn deliver(
        &self,
        to: &PartyIdentity,
        stx: SignedTransaction,
    ) -> Result<CommitOutcome, FlowError>;

    async fn notarize(
        &self,
        notary: &PartyIdentity,
        stx: SignedTransaction,
    ) -> Result<TransactionSignature, FlowError>;

    async fn fetch_transaction(
        &self,
        from: &PartyIdentity,
        tx_id: &TxId,
    ) -> Result<Option<SignedTransaction>, FlowError>;
}

struct Endpoint<T: ?Sized> {
    name: String,
    handler: Arc<T>,
    reachable: bool,
}

#[derive(Default)]
struct Registry {
    parties: HashMap<PublicKey, Endpoint<dyn Counterparty>>,
    notaries: HashMap<PublicKey, Endpoint<dyn NotaryService>>,
}

/// In-process [`Network`]: every registered party and notary is a handler
/// object called directly.
#[derive(Clone, Default)]
pub struct LocalNetwork {
    registry: Arc<RwLock<Registry>>,
}

impl LocalNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register_party(&self, identity: &PartyIdentity, handler: Arc<dyn Counterparty>) {
        self.registry.write().await.parties.insert(
            identity.key,
            Endpoint {
                name: identity.name.clone(),
                handler,
                reachable: true,
            },
        );
    }

    pub async fn register_notary(&self, notary: Arc<dyn NotaryService>) {
        let identity = notary.identity().clone();
        self.registry.write().await.notaries.insert(
            identity.key,
            Endpoint {
                name: identity.name,
                handler: notary,
                reachable: true,
            },
        );
    }

    /// Cut a party (or notary) off from, or reconnect it to, the network.
    pub async fn set_reachable(&self, key: &PublicKey, reachable: bool) {
        let mut registry = self.registry.write().await;
        if let Some(endpoint) = registry.parties.get_mut(key) {
            endpoint.reachable = reachable;
        }
        if let Some(endpoint) = registry.notaries.get_mut(key) {
            endpoint.reachable = reachable;
        }
    }

    async fn party(&self, to: &PartyIdentity) -> Result<Arc<dyn Counterparty>, FlowError> {
        let registry = self.registry.read().await;
        let endpoint = registry
            .parties
            .get(&to.key)
            .ok_or_else(|| FlowError::UnknownParty(to.name.clone()))?;
        if !endpoint.reachable {
            return Err(FlowError::Unreachable {
                party: endpoint.name.clone(),
            });
        }
        Ok(Arc::clone(&endpoint.handler))
    }
}

impl std::fmt::Debug for LocalNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalNetwork").finish_non_exhaustive()
    }
}

#[async_trait]
impl Network for LocalNetwork {
    async fn request_signature(
        &self,
        to: &PartyIdentity,
        stx: SignedTransaction,
    ) -> Result<SignatureResponse, FlowError> {
        let handler = self.party(to).await?;
        Ok(handler.sign(stx).await)
    }

    async fn deliver(
        &self,
        to: &PartyIdentity,
        stx: SignedTransaction,
    ) -> Result<CommitOutcome, FlowError> {
        let handler = self.party(to).await?;
        handler.receive_finalized(stx).await
    }

    async fn notarize(
        &self,
        notary: &PartyIdentity,
        stx: SignedTransaction,
    ) -> Result<TransactionSignature, FlowError> {
        let handler = {
            let registry = self.registry.read().await;
            let endpoint = registry
                .notaries
                .get(&notary.key)
                .ok_or_else(|| FlowError::UnknownParty(notary.name.clone()))?;
            if !endpoint.reachable {
                return Err(FlowError::Unreachable {
                    party: endpoint.name.clone(),
                });
            }
            Arc::clone(&endpoint.handler)
        };
        Ok(handler.notarize(stx).await?)
    }

    async fn fetch_transaction(
        &self,
        from: &PartyIdentity,
        tx_id: &TxId,
    ) -> Result<Option<SignedTransaction>, FlowError> {
        let handler = self.party(from).await?;
        handler.transaction(tx_id).await
    }
}
