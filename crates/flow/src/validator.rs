//! Contract checks before signing and after notarization.

use std::collections::BTreeSet;

use idledger_core::{contract, ContractRules, SignedTransaction, Transaction};
use time::Date;

use crate::error::FlowError;

/// Runs the contract rules, and re-derives signed transactions to check
/// they still say what was proposed.
#[derive(Debug, Clone, Copy)]
pub struct Validator {
    rules: ContractRules,
}

impl Validator {
    pub fn new(rules: ContractRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &ContractRules {
        &self.rules
    }

    pub fn validate(&self, tx: &Transaction, today: Date) -> Result<(), FlowError> {
        contract::verify(tx, today, &self.rules)?;
        Ok(())
    }

    /// Re-derive the transaction from its wire bytes, check every required
    /// signer and the notary signed it, and re-run the contract.
    ///
    /// Any failure here means the transaction must not be committed.
    pub fn revalidate(&self, stx: &SignedTransaction, today: Date) -> Result<Transaction, FlowError> {
        let tx = stx
            .transaction()
            .map_err(|e| FlowError::Integrity(e.to_string()))?;
        let mut required: BTreeSet<_> = tx.required_signers.clone();
        required.insert(tx.notary.key);
        stx.verify_required(&required)
            .map_err(|e| FlowError::Integrity(e.to_string()))?;
        self.validate(&tx, today)?;
        Ok(tx)
    }

    /// [`Validator::revalidate`], additionally requiring the result to be
    /// exactly the transaction the proposer built.
    pub fn revalidate_against(
        &self,
        stx: &SignedTransaction,
        proposed: &Transaction,
        today: Date,
    ) -> Result<Transaction, FlowError> {
        let tx = self.revalidate(stx, today)?;
        if &tx != proposed {
            return Err(FlowError::Integrity(format!(
                "transaction {} differs from the proposal",
                stx.id()
            )));
        }
        Ok(tx)
    }
}
