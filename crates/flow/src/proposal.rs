//! Assembling unsigned transactions from a caller's payload.

use std::collections::BTreeSet;

use idledger_core::{
    Command, Identity, PublicKey, RecordState, StateAndRef, Stakeholders, TimeWindow, Transaction,
    TransactionBuilder,
};
use idledger_storage::LedgerStore;

use crate::clock::Clock;
use crate::config::FlowConfig;
use crate::directory::Directory;
use crate::error::FlowError;

/// A built transaction together with what was learned while building it.
#[derive(Debug, Clone)]
pub struct Proposal {
    pub transaction: Transaction,
    /// Stakeholder names from the payload that matched no known party.
    pub unresolved_stakeholders: Vec<String>,
}

/// Builds create, update and delete transactions against the proposer's
/// view of the ledger.
pub struct ProposalBuilder<'a> {
    pub directory: &'a Directory,
    pub store: &'a dyn LedgerStore,
    pub clock: &'a dyn Clock,
    pub config: &'a FlowConfig,
}

impl ProposalBuilder<'_> {
    pub async fn create(&self, identity: Identity) -> Result<Proposal, FlowError> {
        let key = identity.business_key().to_string();
        if self.store.find_by_business_key(&key).await?.is_some() {
            return Err(FlowError::DuplicateKey { key });
        }
        let (stakeholders, unresolved) = self.resolve_stakeholders(&identity.stakeholders);
        let output = RecordState::new(identity, stakeholders);

        let tx = self
            .start(Command::Create, self.directory.notary().clone())
            .attachments(output.identity.active_attachments())
            .output(output)
            .signer(self.directory.me().key)
            .build()?;
        Ok(Proposal {
            transaction: tx,
            unresolved_stakeholders: unresolved,
        })
    }

    /// Documents left out of `identity` keep the current version's documents.
    pub async fn update(&self, mut identity: Identity) -> Result<Proposal, FlowError> {
        let input = self.live_version(identity.business_key()).await?;
        if identity.documents().is_empty() && !input.state.identity.documents().is_empty() {
            identity.documents = input.state.identity.documents.clone();
        }
        let (stakeholders, unresolved) = self.resolve_stakeholders(&identity.stakeholders);
        let output = RecordState::new(identity, stakeholders);

        let mut signers = input.state.stakeholders.keys();
        signers.insert(self.directory.me().key);
        let tx = self
            .start(Command::Update, input.notary.clone())
            .attachments(output.identity.active_attachments())
            .input(input)
            .output(output)
            .signers(signers)
            .build()?;
        Ok(Proposal {
            transaction: tx,
            unresolved_stakeholders: unresolved,
        })
    }

    pub async fn delete(&self, business_key: &str) -> Result<Proposal, FlowError> {
        let input = self.live_version(business_key).await?;
        let signers: BTreeSet<PublicKey> = input.state.stakeholders.keys();
        let tx = self
            .start(Command::Delete, input.notary.clone())
            .input(input)
            .signers(signers)
            .build()?;
        Ok(Proposal {
            transaction: tx,
            unresolved_stakeholders: Vec::new(),
        })
    }

    fn start(&self, command: Command, notary: idledger_core::PartyIdentity) -> TransactionBuilder {
        TransactionBuilder::new(command, notary).time_window(TimeWindow::starting_at(
            self.clock.now(),
            self.config.time_window(),
        ))
    }

    async fn live_version(&self, business_key: &str) -> Result<StateAndRef, FlowError> {
        self.store
            .find_by_business_key(business_key)
            .await?
            .ok_or_else(|| FlowError::NotFound {
                key: business_key.to_string(),
            })
    }

    /// Named parties plus the proposer. Names matching no known party are
    /// dropped and returned separately.
    fn resolve_stakeholders(&self, names: &[String]) -> (Stakeholders, Vec<String>) {
        let mut builder = Stakeholders::builder();
        let mut unresolved = Vec::new();
        for name in names {
            match self.directory.resolve(name) {
                Some(party) => {
                    builder.add(party.clone());
                }
                None => {
                    tracing::warn!(stakeholder = %name, "no party with this name; dropping stakeholder");
                    unresolved.push(name.clone());
                }
            }
        }
        builder.add(self.directory.me().clone());
        (builder.build(), unresolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use idledger_core::{Document, KeyPair, PartyIdentity, SecureHash, SignedTransaction};
    use idledger_storage::{CommitRecord, MemoryLedgerStore};
    use time::macros::{date, datetime};

    struct Fixture {
        me: KeyPair,
        directory: Directory,
        store: MemoryLedgerStore,
        clock: ManualClock,
        config: FlowConfig,
    }

    impl Fixture {
        fn new() -> Self {
            let me = KeyPair::from_seed([1; 32]);
            let directory = Directory::new(
                PartyIdentity::new("PartyA", me.public_key()),
                PartyIdentity::new("Notary", KeyPair::from_seed([9; 32]).public_key()),
                vec![PartyIdentity::new(
                    "BankA",
                    KeyPair::from_seed([2; 32]).public_key(),
                )],
            );
            Self {
                me,
                directory,
                store: MemoryLedgerStore::new(),
                clock: ManualClock::new(datetime!(2025-06-01 9:00 UTC)),
                config: FlowConfig::default(),
            }
        }

        fn builder(&self) -> ProposalBuilder<'_> {
            ProposalBuilder {
                directory: &self.directory,
                store: &self.store,
                clock: &self.clock,
                config: &self.config,
            }
        }

        async fn commit(&self, tx: &Transaction) {
            let stx = SignedTransaction::new(tx).unwrap().sign(&self.me).unwrap();
            self.store
                .apply_commit(CommitRecord::for_party(stx, tx, &self.me.public_key()))
                .await
                .unwrap();
        }
    }

    fn alice(stakeholders: &[&str]) -> Identity {
        Identity {
            id_no: "X1".to_string(),
            name: "Alice".to_string(),
            dob: date!(2000 - 01 - 01),
            address: String::new(),
            phone_no: String::new(),
            email: "a@x.com".to_string(),
            passport_no: "P1".to_string(),
            stakeholders: stakeholders.iter().map(|s| s.to_string()).collect(),
            documents: None,
        }
    }

    #[tokio::test]
    async fn create_adds_proposer_and_drops_unknown_names() {
        let fx = Fixture::new();
        let proposal = fx.builder().create(alice(&["banka", "Nobody"])).await.unwrap();

        let output = proposal.transaction.output().unwrap();
        let mut names = output.stakeholders.names();
        names.sort();
        assert_eq!(names, vec!["BankA", "PartyA"]);
        assert_eq!(proposal.unresolved_stakeholders, vec!["Nobody"]);
        assert_eq!(
            proposal.transaction.required_signers,
            BTreeSet::from([fx.me.public_key()])
        );
        assert_eq!(&proposal.transaction.notary, fx.directory.notary());
    }

    #[tokio::test]
    async fn create_window_spans_configured_length() {
        let fx = Fixture::new();
        let tx = fx.builder().create(alice(&[])).await.unwrap().transaction;
        assert_eq!(tx.time_window.from, datetime!(2025-06-01 9:00 UTC));
        assert_eq!(tx.time_window.until, datetime!(2025-06-01 9:00:30 UTC));
    }

    #[tokio::test]
    async fn create_on_live_key_is_duplicate() {
        let fx = Fixture::new();
        let tx = fx.builder().create(alice(&[])).await.unwrap().transaction;
        fx.commit(&tx).await;

        let err = fx.builder().create(alice(&[])).await.unwrap_err();
        assert!(matches!(err, FlowError::DuplicateKey { ref key } if key == "X1"));
    }

    #[tokio::test]
    async fn update_and_delete_of_missing_key_are_not_found() {
        let fx = Fixture::new();
        let err = fx.builder().update(alice(&[])).await.unwrap_err();
        assert!(matches!(err, FlowError::NotFound { .. }));
        let err = fx.builder().delete("X1").await.unwrap_err();
        assert!(matches!(err, FlowError::NotFound { .. }));
    }

    #[tokio::test]
    async fn update_keeps_previous_documents_when_none_supplied() {
        let fx = Fixture::new();
        let scan = SecureHash::sha256(b"scan");
        let mut original = alice(&[]);
        original.documents = Some(vec![Document::new("passport", scan)]);
        let tx = fx.builder().create(original).await.unwrap().transaction;
        assert!(tx.attachments.contains(&scan));
        fx.commit(&tx).await;

        let mut amended = alice(&["BankA"]);
        amended.address = "2 High St".to_string();
        let update = fx.builder().update(amended).await.unwrap().transaction;

        let output = update.output().unwrap();
        assert_eq!(output.identity.documents(), &[Document::new("passport", scan)]);
        assert!(update.attachments.contains(&scan));
        assert_eq!(update.input().unwrap().state_ref.tx_id, tx.id().unwrap());
        assert_eq!(output.linear_id, update.input().unwrap().state.linear_id);
    }

    #[tokio::test]
    async fn inactive_documents_are_not_referenced() {
        let fx = Fixture::new();
        let mut identity = alice(&[]);
        let mut retired = Document::new("old passport", SecureHash::sha256(b"old"));
        retired.active = false;
        identity.documents = Some(vec![retired]);
        let tx = fx.builder().create(identity).await.unwrap().transaction;
        assert!(tx.attachments.is_empty());
    }

    #[tokio::test]
    async fn delete_requires_every_input_stakeholder() {
        let fx = Fixture::new();
        let tx = fx.builder().create(alice(&["BankA"])).await.unwrap().transaction;
        fx.commit(&tx).await;

        let delete = fx.builder().delete("X1").await.unwrap().transaction;
        assert!(delete.outputs.is_empty());
        assert_eq!(
            delete.required_signers,
            tx.output().unwrap().stakeholders.keys()
        );
        assert_eq!(delete.notary, tx.notary);
    }
}
