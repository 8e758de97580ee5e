//! One party: its keys, stores, and the services it runs for peers.

use std::sync::Arc;

use async_trait::async_trait;
use idledger_core::{KeyPair, PartyIdentity, SignedTransaction, TxId};
use idledger_storage::{
    AttachmentStore, CommitOutcome, LedgerStore, MemoryAttachmentStore, MemoryLedgerStore,
};

use crate::backchain::Backchain;
use crate::broadcast::{Broadcaster, Recipient};
use crate::clock::{Clock, SystemClock};
use crate::collector::SignatureCollector;
use crate::config::FlowConfig;
use crate::directory::Directory;
use crate::error::FlowError;
use crate::network::{Counterparty, Network, SignatureResponse};
use crate::notary::NotaryClient;
use crate::proposal::ProposalBuilder;
use crate::responder::{Responder, SigningPolicy};
use crate::validator::Validator;

/// A party taking part in the ledger.
///
/// Flows are started with [`PartyNode::create`], [`PartyNode::update`] and
/// [`PartyNode::delete`]. Requests from peers are served by the handler
/// returned from [`PartyNode::endpoint`], which is what gets registered on
/// the network.
pub struct PartyNode {
    pub(crate) keys: KeyPair,
    pub(crate) directory: Directory,
    pub(crate) store: Arc<dyn LedgerStore>,
    pub(crate) attachments: Arc<dyn AttachmentStore>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) config: FlowConfig,
    pub(crate) validator: Validator,
    pub(crate) collector: SignatureCollector,
    pub(crate) notary: NotaryClient,
    pub(crate) broadcaster: Broadcaster,
    recipient: Arc<Recipient>,
    responder: Arc<Responder>,
}

impl PartyNode {
    pub fn builder(keys: KeyPair, directory: Directory, network: Arc<dyn Network>) -> PartyNodeBuilder {
        PartyNodeBuilder {
            keys,
            directory,
            network,
            store: None,
            attachments: None,
            clock: None,
            config: FlowConfig::default(),
            policy: SigningPolicy::default(),
        }
    }

    pub fn identity(&self) -> &PartyIdentity {
        self.directory.me()
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    pub fn attachments(&self) -> &Arc<dyn AttachmentStore> {
        &self.attachments
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    pub fn responder(&self) -> &Responder {
        &self.responder
    }

    /// The handler peers reach this party through.
    pub fn endpoint(&self) -> Arc<dyn Counterparty> {
        Arc::new(PartyEndpoint {
            responder: Arc::clone(&self.responder),
            recipient: Arc::clone(&self.recipient),
            store: Arc::clone(&self.store),
        })
    }

    pub(crate) fn recipient(&self) -> &Recipient {
        &self.recipient
    }

    pub fn proposal_builder(&self) -> ProposalBuilder<'_> {
        ProposalBuilder {
            directory: &self.directory,
            store: self.store.as_ref(),
            clock: self.clock.as_ref(),
            config: &self.config,
        }
    }

    /// Retry deliveries queued for parties that were unreachable.
    pub async fn flush_pending(&self) -> usize {
        self.broadcaster.flush_pending().await
    }

    pub async fn pending_deliveries(&self) -> usize {
        self.broadcaster.pending_count().await
    }
}

impl std::fmt::Debug for PartyNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartyNode")
            .field("identity", self.directory.me())
            .finish_non_exhaustive()
    }
}

pub struct PartyNodeBuilder {
    keys: KeyPair,
    directory: Directory,
    network: Arc<dyn Network>,
    store: Option<Arc<dyn LedgerStore>>,
    attachments: Option<Arc<dyn AttachmentStore>>,
    clock: Option<Arc<dyn Clock>>,
    config: FlowConfig,
    policy: SigningPolicy,
}

impl PartyNodeBuilder {
    pub fn store(mut self, store: Arc<dyn LedgerStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn attachments(mut self, attachments: Arc<dyn AttachmentStore>) -> Self {
        self.attachments = Some(attachments);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn config(mut self, config: FlowConfig) -> Self {
        self.config = config;
        self
    }

    pub fn policy(mut self, policy: SigningPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn build(self) -> PartyNode {
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryLedgerStore::new()));
        let attachments = self
            .attachments
            .unwrap_or_else(|| Arc::new(MemoryAttachmentStore::new()));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let validator = Validator::new(self.config.contract_rules());
        let me = self.keys.public_key();
        let backchain = Backchain::new(
            me,
            Arc::clone(&self.network),
            Arc::clone(&store),
            Arc::clone(&clock),
            validator,
            self.config.counterparty_timeout(),
        );

        PartyNode {
            collector: SignatureCollector::new(
                Arc::clone(&self.network),
                self.config.counterparty_timeout(),
            ),
            notary: NotaryClient::new(Arc::clone(&self.network), self.config.notary_timeout()),
            broadcaster: Broadcaster::new(me, self.network, self.config.delivery_timeout()),
            recipient: Arc::new(Recipient::new(
                me,
                Arc::clone(&store),
                Arc::clone(&clock),
                validator,
                backchain.clone(),
            )),
            responder: Arc::new(Responder::new(
                self.keys.clone(),
                Arc::clone(&store),
                Arc::clone(&clock),
                validator,
                backchain,
                self.policy,
            )),
            keys: self.keys,
            directory: self.directory,
            store,
            attachments,
            clock,
            config: self.config,
            validator,
        }
    }
}

struct PartyEndpoint {
    responder: Arc<Responder>,
    recipient: Arc<Recipient>,
    store: Arc<dyn LedgerStore>,
}

#[async_trait]
impl Counterparty for PartyEndpoint {
    async fn sign(&self, stx: SignedTransaction) -> SignatureResponse {
        self.responder.respond(stx).await
    }

    async fn receive_finalized(&self, stx: SignedTransaction) -> Result<CommitOutcome, FlowError> {
        self.recipient.receive(stx).await
    }

    async fn transaction(&self, tx_id: &TxId) -> Result<Option<SignedTransaction>, FlowError> {
        Ok(self.store.transaction(tx_id).await?)
    }
}
