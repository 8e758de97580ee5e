//! Fetching the history behind a transaction's inputs.
//!
//! A party that missed a delivery can be asked to sign, or be sent, a
//! transaction that consumes a version it never stored. Before it does
//! either it fetches the transactions that produced those inputs from the
//! input's stakeholders, checks them, and commits them oldest first.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use idledger_core::{PartyIdentity, PublicKey, SignedTransaction, Transaction, TxId};
use idledger_storage::{CommitRecord, LedgerStore};

use crate::clock::Clock;
use crate::error::FlowError;
use crate::network::Network;
use crate::validator::Validator;

#[derive(Clone)]
pub struct Backchain {
    me: PublicKey,
    network: Arc<dyn Network>,
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    validator: Validator,
    timeout: Duration,
}

impl Backchain {
    pub fn new(
        me: PublicKey,
        network: Arc<dyn Network>,
        store: Arc<dyn LedgerStore>,
        clock: Arc<dyn Clock>,
        validator: Validator,
        timeout: Duration,
    ) -> Self {
        Self {
            me,
            network,
            store,
            clock,
            validator,
            timeout,
        }
    }

    /// Commit every ancestor of `tx` this party has not stored. Returns how
    /// many transactions were committed.
    pub async fn resolve(&self, tx: &Transaction) -> Result<usize, FlowError> {
        let mut wanted = self.missing_inputs(tx).await?;
        let mut seen = BTreeSet::new();
        // Newest first; every entry is an ancestor of the ones before it.
        let mut fetched = Vec::new();
        while let Some((tx_id, sources)) = wanted.pop() {
            if !seen.insert(tx_id) {
                continue;
            }
            let stx = self.fetch(&tx_id, &sources).await?;
            let ancestor = self.validator.revalidate(&stx, self.clock.today())?;
            wanted.extend(self.missing_inputs(&ancestor).await?);
            fetched.push((stx, ancestor));
        }

        let count = fetched.len();
        for (stx, ancestor) in fetched.into_iter().rev() {
            let tx_id = stx.id();
            let record = CommitRecord::for_party(stx, &ancestor, &self.me);
            self.store.apply_commit(record).await?;
            tracing::debug!(tx_id = %tx_id.short(), command = %ancestor.command, "committed fetched transaction");
        }
        if count > 0 {
            tracing::info!(count, "resolved missing history");
        }
        Ok(count)
    }

    async fn missing_inputs(
        &self,
        tx: &Transaction,
    ) -> Result<Vec<(TxId, Vec<PartyIdentity>)>, FlowError> {
        let mut missing = Vec::new();
        for input in &tx.inputs {
            let tx_id = input.state_ref.tx_id;
            if self.store.transaction(&tx_id).await?.is_some() {
                continue;
            }
            let sources = input
                .state
                .stakeholders
                .iter()
                .filter(|p| p.key != self.me)
                .cloned()
                .collect();
            missing.push((tx_id, sources));
        }
        Ok(missing)
    }

    /// Ask each source in turn; the first one holding `tx_id` wins.
    async fn fetch(
        &self,
        tx_id: &TxId,
        sources: &[PartyIdentity],
    ) -> Result<SignedTransaction, FlowError> {
        for source in sources {
            let response =
                tokio::time::timeout(self.timeout, self.network.fetch_transaction(source, tx_id))
                    .await;
            match response {
                Ok(Ok(Some(stx))) if stx.id() == *tx_id => return Ok(stx),
                Ok(Ok(Some(other))) => {
                    tracing::warn!(party = %source.name, asked = %tx_id.short(), got = %other.id().short(), "peer answered with another transaction")
                }
                Ok(Ok(None)) => {
                    tracing::debug!(party = %source.name, tx_id = %tx_id.short(), "peer does not hold transaction")
                }
                Ok(Err(err)) => {
                    tracing::debug!(party = %source.name, error = %err, "fetch failed")
                }
                Err(_) => tracing::debug!(party = %source.name, "fetch timed out"),
            }
        }
        Err(FlowError::UnresolvedInput { tx_id: *tx_id })
    }
}

impl std::fmt::Debug for Backchain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backchain")
            .field("me", &self.me)
            .finish_non_exhaustive()
    }
}
