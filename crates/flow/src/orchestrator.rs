//! Create, update and delete flows, and the read-side queries.
//!
//! Each flow is a fixed pipeline:
//!
//! ```text
//! Build -> Validate -> Sign(self) -> CollectSignatures -> Notarize -> Re-validate -> Commit + Broadcast
//! ```
//!
//! Signature collection is skipped for `Create`. The first failing stage
//! ends the flow. Errors never leave this module raw: every flow returns a
//! [`FlowResult`].

use idledger_core::{
    Command, FlowResult, Identity, PartyIdentity, SignedTransaction, StateAndRef, TxId,
};
use idledger_storage::{AttachmentStored, StorageError};
use tracing::Instrument;

use crate::broadcast::BroadcastReport;
use crate::collector::SignatureCollection;
use crate::error::FlowError;
use crate::node::PartyNode;
use crate::proposal::Proposal;

impl PartyNode {
    pub async fn create(&self, identity: Identity) -> FlowResult {
        let key = identity.business_key().to_string();
        self.run(Command::Create, &key, async {
            self.proposal_builder().create(identity).await
        })
        .await
    }

    pub async fn update(&self, identity: Identity) -> FlowResult {
        let key = identity.business_key().to_string();
        self.run(Command::Update, &key, async {
            self.proposal_builder().update(identity).await
        })
        .await
    }

    pub async fn delete(&self, business_key: &str) -> FlowResult {
        self.run(Command::Delete, business_key, async {
            self.proposal_builder().delete(business_key).await
        })
        .await
    }

    /// Run the pipeline for a proposal built earlier with
    /// [`PartyNode::proposal_builder`].
    pub async fn submit(&self, proposal: Proposal) -> FlowResult {
        let command = proposal.transaction.command;
        let key = proposal
            .transaction
            .business_key()
            .unwrap_or_default()
            .to_string();
        self.run(command, &key, async { Ok(proposal) }).await
    }

    pub async fn find(&self, business_key: &str) -> Result<Option<StateAndRef>, FlowError> {
        Ok(self.store.find_by_business_key(business_key).await?)
    }

    pub async fn list_live(&self) -> Result<Vec<StateAndRef>, FlowError> {
        Ok(self.store.list_live().await?)
    }

    pub fn me(&self) -> &PartyIdentity {
        self.directory.me()
    }

    pub fn peers(&self) -> Vec<PartyIdentity> {
        self.directory.peers()
    }

    /// Store a blob for later reference from a record's documents.
    pub async fn import_attachment(&self, bytes: Vec<u8>) -> Result<AttachmentStored, StorageError> {
        let stored = self.attachments.store(bytes).await?;
        if let AttachmentStored::Existing(hash) = stored {
            tracing::info!(hash = %hash, "attachment already imported");
        }
        Ok(stored)
    }

    async fn run(
        &self,
        command: Command,
        business_key: &str,
        build: impl std::future::Future<Output = Result<Proposal, FlowError>>,
    ) -> FlowResult {
        let span = tracing::info_span!("flow", %command, business_key);
        async {
            match self.execute(build).await {
                Ok((tx_id, report)) => {
                    tracing::info!(
                        tx_id = %tx_id.short(),
                        delivered = report.delivered.len(),
                        queued = report.queued.len(),
                        refused = report.refused.len(),
                        "flow succeeded"
                    );
                    FlowResult::success(tx_id)
                }
                Err(err) => {
                    let failure = err.to_failure();
                    tracing::warn!(kind = %failure.kind, reason = %failure.reason, "flow failed");
                    FlowResult::Failure(failure)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn execute(
        &self,
        build: impl std::future::Future<Output = Result<Proposal, FlowError>>,
    ) -> Result<(TxId, BroadcastReport), FlowError> {
        let today = self.clock.today();
        let proposal = build.await?;
        let tx = proposal.transaction;
        self.validator.validate(&tx, today)?;

        let mut collection =
            SignatureCollection::new(SignedTransaction::new(&tx)?, tx.required_signers.clone());
        collection.sign_as_proposer(&self.keys)?;
        if tx.command != Command::Create {
            self.collector.collect(&mut collection, &self.directory).await?;
        }
        let signed = collection.into_signed(&self.directory)?;
        tracing::debug!(tx_id = %signed.id().short(), signers = signed.signatures().len(), "quorum reached");

        let notarized = self.notary.notarize(signed).await?;
        let tx = self
            .validator
            .revalidate_against(&notarized, &tx, self.clock.today())?;

        self.recipient().commit(notarized.clone(), &tx).await?;
        let report = self.broadcaster.broadcast(&notarized, &tx).await;
        Ok((notarized.id(), report))
    }
}
