//! The counterparty side of signature collection.

use std::sync::{Arc, RwLock};

use idledger_core::{KeyPair, SignedTransaction, Transaction};
use idledger_storage::LedgerStore;
use serde::{Deserialize, Serialize};

use crate::backchain::Backchain;
use crate::clock::Clock;
use crate::error::FlowError;
use crate::network::SignatureResponse;
use crate::validator::Validator;

/// How a party answers signature requests that pass its checks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SigningPolicy {
    #[default]
    Approve,
    Reject,
    /// Never answer.
    Unresponsive,
}

/// Checks a proposed transaction on behalf of one party and signs it.
pub struct Responder {
    keys: KeyPair,
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    validator: Validator,
    backchain: Backchain,
    policy: RwLock<SigningPolicy>,
}

impl Responder {
    pub fn new(
        keys: KeyPair,
        store: Arc<dyn LedgerStore>,
        clock: Arc<dyn Clock>,
        validator: Validator,
        backchain: Backchain,
        policy: SigningPolicy,
    ) -> Self {
        Self {
            keys,
            store,
            clock,
            validator,
            backchain,
            policy: RwLock::new(policy),
        }
    }

    pub fn policy(&self) -> SigningPolicy {
        self.policy
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn set_policy(&self, policy: SigningPolicy) {
        *self.policy.write().unwrap_or_else(|e| e.into_inner()) = policy;
    }

    pub async fn respond(&self, stx: SignedTransaction) -> SignatureResponse {
        let tx = match self.check(&stx).await {
            Ok(tx) => tx,
            Err(response) => return response,
        };
        match self.policy() {
            SigningPolicy::Approve => {
                tracing::info!(tx_id = %stx.id().short(), command = %tx.command, "signing");
                SignatureResponse::Signed(self.keys.sign_transaction(&stx.id()))
            }
            SigningPolicy::Reject => {
                tracing::info!(tx_id = %stx.id().short(), "declining by policy");
                SignatureResponse::Declined {
                    reason: "signature withheld".to_string(),
                }
            }
            SigningPolicy::Unresponsive => std::future::pending().await,
        }
    }

    async fn check(&self, stx: &SignedTransaction) -> Result<Transaction, SignatureResponse> {
        let declined = |reason: String| SignatureResponse::Declined { reason };
        let tx = stx.transaction().map_err(|e| declined(e.to_string()))?;
        stx.verify_signatures().map_err(|e| declined(e.to_string()))?;
        if !tx.required_signers.contains(&self.keys.public_key()) {
            return Err(declined("not a required signer".to_string()));
        }
        if let Err(e) = self.validator.validate(&tx, self.clock.today()) {
            tracing::warn!(tx_id = %stx.id().short(), error = %e, "proposal fails contract");
            return Err(SignatureResponse::Invalid {
                reason: e.to_string(),
            });
        }
        match self.backchain.resolve(&tx).await {
            Ok(_) => {}
            Err(FlowError::UnresolvedInput { tx_id }) => {
                return Err(SignatureResponse::Unresolved { tx_id })
            }
            Err(e) => return Err(declined(format!("input history rejected: {}", e))),
        }
        for input in &tx.inputs {
            match self.store.consumed_by(&input.state_ref).await {
                Ok(None) => {}
                Ok(Some(consumed_by)) if consumed_by == stx.id() => {}
                Ok(Some(consumed_by)) => {
                    tracing::info!(state_ref = %input.state_ref, consumed_by = %consumed_by.short(), "input already spent");
                    return Err(SignatureResponse::Consumed {
                        state_ref: input.state_ref,
                        consumed_by,
                    });
                }
                Err(e) => return Err(declined(e.to_string())),
            }
        }
        Ok(tx)
    }
}
