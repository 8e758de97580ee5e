//! Distributing notarized transactions and committing them locally.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use idledger_core::{PartyIdentity, PublicKey, SignedTransaction, Stakeholders, Transaction};
use idledger_storage::{CommitOutcome, CommitRecord, LedgerStore};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::backchain::Backchain;
use crate::clock::Clock;
use crate::error::FlowError;
use crate::network::Network;
use crate::validator::Validator;

/// Parties that receive a finalized transaction: the output's stakeholders
/// plus the stakeholders of the consumed version.
pub fn broadcast_set(tx: &Transaction) -> Stakeholders {
    let mut builder = Stakeholders::builder();
    for output in &tx.outputs {
        builder.extend(&output.stakeholders);
    }
    for input in &tx.inputs {
        builder.extend(&input.state.stakeholders);
    }
    builder.build()
}

/// The receiving side: re-validates a finalized transaction and applies it
/// to this party's store.
pub struct Recipient {
    key: PublicKey,
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    validator: Validator,
    backchain: Backchain,
}

impl Recipient {
    pub fn new(
        key: PublicKey,
        store: Arc<dyn LedgerStore>,
        clock: Arc<dyn Clock>,
        validator: Validator,
        backchain: Backchain,
    ) -> Self {
        Self {
            key,
            store,
            clock,
            validator,
            backchain,
        }
    }

    /// Re-validate, fetch any missing input history, then commit.
    pub async fn receive(&self, stx: SignedTransaction) -> Result<CommitOutcome, FlowError> {
        let tx = self.validator.revalidate(&stx, self.clock.today())?;
        self.backchain.resolve(&tx).await?;
        self.commit(stx, &tx).await
    }

    /// Apply an already re-validated transaction.
    pub async fn commit(
        &self,
        stx: SignedTransaction,
        tx: &Transaction,
    ) -> Result<CommitOutcome, FlowError> {
        let tx_id = stx.id();
        let record = CommitRecord::for_party(stx, tx, &self.key);
        let outcome = self.store.apply_commit(record).await?;
        match outcome {
            CommitOutcome::Applied => {
                tracing::info!(tx_id = %tx_id.short(), command = %tx.command, "committed")
            }
            CommitOutcome::AlreadyApplied => {
                tracing::debug!(tx_id = %tx_id.short(), "already committed")
            }
        }
        Ok(outcome)
    }
}

/// Per-recipient outcome of one broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastReport {
    pub delivered: Vec<String>,
    /// Unreachable recipients; the transaction waits in the outbox.
    pub queued: Vec<String>,
    /// Recipients that refused to commit, with their reason.
    pub refused: Vec<(String, String)>,
}

impl BroadcastReport {
    pub fn is_complete(&self) -> bool {
        self.queued.is_empty() && self.refused.is_empty()
    }
}

/// Queued deliveries per recipient, in the order they were finalized.
#[derive(Debug, Default)]
struct Outbox {
    pending: BTreeMap<PublicKey, (PartyIdentity, Vec<SignedTransaction>)>,
}

impl Outbox {
    fn push(&mut self, to: &PartyIdentity, stx: SignedTransaction) {
        let queue = &mut self
            .pending
            .entry(to.key)
            .or_insert_with(|| (to.clone(), Vec::new()))
            .1;
        let id = stx.id();
        if !queue.iter().any(|queued| queued.id() == id) {
            queue.push(stx);
        }
    }

    fn len(&self) -> usize {
        self.pending.values().map(|(_, txs)| txs.len()).sum()
    }
}

/// Sends finalized transactions to every other party in the broadcast set,
/// queueing them for parties that cannot be reached.
pub struct Broadcaster {
    me: PublicKey,
    network: Arc<dyn Network>,
    timeout: Duration,
    outbox: Mutex<Outbox>,
}

impl Broadcaster {
    pub fn new(me: PublicKey, network: Arc<dyn Network>, timeout: Duration) -> Self {
        Self {
            me,
            network,
            timeout,
            outbox: Mutex::new(Outbox::default()),
        }
    }

    pub async fn pending_count(&self) -> usize {
        self.outbox.lock().await.len()
    }

    pub async fn broadcast(&self, stx: &SignedTransaction, tx: &Transaction) -> BroadcastReport {
        self.flush_pending().await;

        let mut report = BroadcastReport::default();
        for party in broadcast_set(tx).iter().filter(|p| p.key != self.me) {
            match self.deliver(party, stx.clone()).await {
                Ok(_) => report.delivered.push(party.name.clone()),
                Err(err) if err.is_transient() => {
                    tracing::warn!(party = %party.name, error = %err, "delivery deferred");
                    self.outbox.lock().await.push(party, stx.clone());
                    report.queued.push(party.name.clone());
                }
                Err(err) => {
                    tracing::warn!(party = %party.name, error = %err, "recipient refused commit");
                    report.refused.push((party.name.clone(), err.to_string()));
                }
            }
        }
        report
    }

    /// Retry every queued delivery. Returns how many were delivered.
    ///
    /// Transactions go out to each recipient in the order they were queued;
    /// a recipient that is still unreachable keeps the rest of its queue.
    pub async fn flush_pending(&self) -> usize {
        let pending = std::mem::take(&mut self.outbox.lock().await.pending);
        let mut delivered = 0;
        for (_, (party, txs)) in pending {
            let mut txs = txs.into_iter();
            while let Some(stx) = txs.next() {
                match self.deliver(&party, stx.clone()).await {
                    Ok(_) => delivered += 1,
                    Err(err) if err.is_transient() => {
                        let mut outbox = self.outbox.lock().await;
                        outbox.push(&party, stx);
                        for rest in txs.by_ref() {
                            outbox.push(&party, rest);
                        }
                    }
                    Err(err) => {
                        tracing::warn!(party = %party.name, tx_id = %stx.id().short(), error = %err, "redelivery refused");
                    }
                }
            }
        }
        if delivered > 0 {
            tracing::info!(delivered, "redelivered queued transactions");
        }
        delivered
    }

    async fn deliver(
        &self,
        party: &PartyIdentity,
        stx: SignedTransaction,
    ) -> Result<CommitOutcome, FlowError> {
        tokio::time::timeout(self.timeout, self.network.deliver(party, stx))
            .await
            .map_err(|_| FlowError::Timeout {
                party: party.name.clone(),
                timeout_ms: self.timeout.as_millis() as u64,
            })?
    }
}
