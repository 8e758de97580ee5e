//! Single-writer ordering of input consumption.
//!
//! The notary is the only place two transactions spending the same record
//! version are ordered against each other. It signs a transaction only if
//! none of its inputs were consumed by a different transaction and its
//! validity window is still open.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use idledger_core::{
    KeyPair, PartyIdentity, SignedTransaction, StateRef, TransactionSignature, TxId,
};
use tokio::sync::Mutex;

use crate::clock::Clock;
use crate::error::FlowError;
use crate::network::Network;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotaryError {
    #[error("input {state_ref} was already consumed by transaction {consumed_by}")]
    Conflict { state_ref: StateRef, consumed_by: TxId },

    #[error("time window ended at {until}")]
    Expired { until: String },

    #[error("{0}")]
    Refused(String),
}

impl From<NotaryError> for FlowError {
    fn from(err: NotaryError) -> Self {
        match err {
            NotaryError::Conflict {
                state_ref,
                consumed_by,
            } => FlowError::Conflict {
                state_ref,
                consumed_by,
            },
            NotaryError::Expired { until } => FlowError::Expired { until },
            NotaryError::Refused(reason) => FlowError::NotaryRefused(reason),
        }
    }
}

/// The notary boundary: a notary signature, or `Conflict` / `Expired`.
#[async_trait]
pub trait NotaryService: Send + Sync + 'static {
    fn identity(&self) -> &PartyIdentity;

    async fn notarize(&self, stx: SignedTransaction) -> Result<TransactionSignature, NotaryError>;
}

/// A notary holding its consumption record in memory.
pub struct SimpleNotary {
    keys: KeyPair,
    identity: PartyIdentity,
    clock: Arc<dyn Clock>,
    consumed: Mutex<HashMap<StateRef, TxId>>,
}

impl SimpleNotary {
    pub fn new(name: impl Into<String>, keys: KeyPair, clock: Arc<dyn Clock>) -> Self {
        let identity = PartyIdentity::new(name, keys.public_key());
        Self {
            keys,
            identity,
            clock,
            consumed: Mutex::new(HashMap::new()),
        }
    }

    /// Number of input versions recorded as consumed.
    pub async fn consumed_count(&self) -> usize {
        self.consumed.lock().await.len()
    }
}

impl std::fmt::Debug for SimpleNotary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimpleNotary")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl NotaryService for SimpleNotary {
    fn identity(&self) -> &PartyIdentity {
        &self.identity
    }

    async fn notarize(&self, stx: SignedTransaction) -> Result<TransactionSignature, NotaryError> {
        let tx = stx
            .transaction()
            .map_err(|e| NotaryError::Refused(e.to_string()))?;
        let tx_id = stx.id();
        if tx.notary.key != self.identity.key {
            return Err(NotaryError::Refused(format!(
                "transaction names notary {}, not {}",
                tx.notary.name, self.identity.name
            )));
        }
        stx.verify_required(&tx.required_signers)
            .map_err(|e| NotaryError::Refused(e.to_string()))?;

        let inputs = tx.consumed_refs();
        let mut consumed = self.consumed.lock().await;

        // Already notarized: sign again so a retried submission succeeds.
        if !inputs.is_empty() && inputs.iter().all(|r| consumed.get(r) == Some(&tx_id)) {
            tracing::debug!(tx_id = %tx_id.short(), "re-signing notarized transaction");
            return Ok(self.keys.sign_transaction(&tx_id));
        }
        for state_ref in &inputs {
            if let Some(other) = consumed.get(state_ref) {
                if *other != tx_id {
                    tracing::info!(
                        tx_id = %tx_id.short(),
                        input = %state_ref,
                        consumed_by = %other.short(),
                        "double spend refused"
                    );
                    return Err(NotaryError::Conflict {
                        state_ref: *state_ref,
                        consumed_by: *other,
                    });
                }
            }
        }

        let now = self.clock.now();
        if tx.time_window.has_elapsed(now) {
            return Err(NotaryError::Expired {
                until: tx.time_window.until.to_string(),
            });
        }
        if !tx.time_window.contains(now) {
            return Err(NotaryError::Refused(format!(
                "time window opens at {}",
                tx.time_window.from
            )));
        }

        for state_ref in inputs {
            consumed.insert(state_ref, tx_id);
        }
        tracing::info!(tx_id = %tx_id.short(), command = %tx.command, "notarized");
        Ok(self.keys.sign_transaction(&tx_id))
    }
}

/// Submits quorum-signed transactions to the notary named in them.
#[derive(Clone)]
pub struct NotaryClient {
    network: Arc<dyn Network>,
    timeout: Duration,
}

impl NotaryClient {
    pub fn new(network: Arc<dyn Network>, timeout: Duration) -> Self {
        Self { network, timeout }
    }

    /// Returns the transaction with the notary's signature added.
    pub async fn notarize(&self, stx: SignedTransaction) -> Result<SignedTransaction, FlowError> {
        let notary = stx.transaction()?.notary;
        let signature = tokio::time::timeout(
            self.timeout,
            self.network.notarize(&notary, stx.clone()),
        )
        .await
        .map_err(|_| FlowError::Timeout {
            party: notary.name.clone(),
            timeout_ms: self.timeout.as_millis() as u64,
        })??;
        if signature.signer != notary.key {
            return Err(FlowError::Integrity(format!(
                "notary signature is from {}, expected {}",
                signature.signer.fingerprint(),
                notary.name
            )));
        }
        stx.with_signature(signature)
            .map_err(|e| FlowError::Integrity(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use idledger_core::{
        Command, Identity, RecordState, StateAndRef, Stakeholders, TimeWindow, TransactionBuilder,
    };
    use time::macros::{date, datetime};

    struct Setup {
        owner: KeyPair,
        clock: Arc<ManualClock>,
        notary: SimpleNotary,
        live: StateAndRef,
    }

    fn setup() -> Setup {
        let owner = KeyPair::from_seed([1; 32]);
        let clock = Arc::new(ManualClock::new(datetime!(2025-06-01 9:00 UTC)));
        let notary = SimpleNotary::new("Notary", KeyPair::from_seed([2; 32]), clock.clone());
        let identity = Identity {
            id_no: "X1".to_string(),
            name: "Alice".to_string(),
            dob: date!(2000 - 01 - 01),
            address: String::new(),
            phone_no: String::new(),
            email: "a@x.com".to_string(),
            passport_no: "P1".to_string(),
            stakeholders: Vec::new(),
            documents: None,
        };
        let stakeholders = Stakeholders::builder()
            .with(PartyIdentity::new("PartyA", owner.public_key()))
            .build();
        let live = StateAndRef {
            state: RecordState::new(identity, stakeholders),
            state_ref: StateRef {
                tx_id: idledger_core::SecureHash::sha256(b"genesis"),
                index: 0,
            },
            notary: notary.identity().clone(),
        };
        Setup {
            owner,
            clock,
            notary,
            live,
        }
    }

    fn spend(s: &Setup, name: &str) -> SignedTransaction {
        let mut output = s.live.state.clone();
        output.identity.name = name.to_string();
        let tx = TransactionBuilder::new(Command::Update, s.notary.identity().clone())
            .input(s.live.clone())
            .output(output)
            .signer(s.owner.public_key())
            .time_window(TimeWindow::starting_at(
                s.clock.now(),
                time::Duration::seconds(30),
            ))
            .build()
            .unwrap();
        SignedTransaction::new(&tx).unwrap().sign(&s.owner).unwrap()
    }

    #[tokio::test]
    async fn second_spend_of_input_conflicts() {
        let s = setup();
        let first = spend(&s, "Alicia");
        let second = spend(&s, "Alice B");

        s.notary.notarize(first.clone()).await.unwrap();
        let err = s.notary.notarize(second).await.unwrap_err();
        assert_eq!(
            err,
            NotaryError::Conflict {
                state_ref: s.live.state_ref,
                consumed_by: first.id(),
            }
        );
    }

    #[tokio::test]
    async fn resubmission_of_same_transaction_is_signed_again() {
        let s = setup();
        let stx = spend(&s, "Alicia");
        let a = s.notary.notarize(stx.clone()).await.unwrap();
        let b = s.notary.notarize(stx).await.unwrap();
        assert_eq!(a.signer, b.signer);
        assert_eq!(s.notary.consumed_count().await, 1);
    }

    #[tokio::test]
    async fn elapsed_window_is_expired() {
        let s = setup();
        let stx = spend(&s, "Alicia");
        s.clock.advance(time::Duration::seconds(31));
        let err = s.notary.notarize(stx).await.unwrap_err();
        assert!(matches!(err, NotaryError::Expired { .. }));
        assert_eq!(s.notary.consumed_count().await, 0);
    }

    #[tokio::test]
    async fn missing_required_signature_is_refused() {
        let s = setup();
        let mut output = s.live.state.clone();
        output.identity.name = "Alicia".to_string();
        let tx = TransactionBuilder::new(Command::Update, s.notary.identity().clone())
            .input(s.live.clone())
            .output(output)
            .signer(s.owner.public_key())
            .signer(KeyPair::from_seed([3; 32]).public_key())
            .time_window(TimeWindow::starting_at(
                s.clock.now(),
                time::Duration::seconds(30),
            ))
            .build()
            .unwrap();
        let stx = SignedTransaction::new(&tx).unwrap().sign(&s.owner).unwrap();

        let err = s.notary.notarize(stx).await.unwrap_err();
        assert!(matches!(err, NotaryError::Refused(_)));
        assert_eq!(s.notary.consumed_count().await, 0);
    }

    #[tokio::test]
    async fn concurrent_spends_notarize_once() {
        let s = Arc::new(setup());
        let mut handles = Vec::new();
        for name in ["A", "B", "C", "D", "E"] {
            let s = Arc::clone(&s);
            let stx = spend(&s, name);
            handles.push(tokio::spawn(async move { s.notary.notarize(stx).await }));
        }
        let mut granted = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                granted += 1;
            }
        }
        assert_eq!(granted, 1);
    }
}
