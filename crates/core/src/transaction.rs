//! Proposed transitions and their signed wire form.
//!
//! A [`Transaction`] is assembled by [`TransactionBuilder`], encoded once to
//! wire bytes, and identified by the SHA-256 of those bytes. Every later
//! stage works on the [`SignedTransaction`], which keeps the original wire
//! bytes so any party can re-derive the unsigned transaction and check it
//! still hashes to the id everyone signed.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::crypto::{base64_bytes, KeyPair, PublicKey, TransactionSignature};
use crate::error::CoreError;
use crate::hash::{AttachmentHash, SecureHash, TxId};
use crate::party::PartyIdentity;
use crate::record::{RecordState, StateAndRef, StateRef};

/// The kind of transition a transaction performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    Create,
    Update,
    Delete,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Command::Create => "Create",
            Command::Update => "Update",
            Command::Delete => "Delete",
        };
        f.write_str(s)
    }
}

/// Interval during which the notary accepts the transaction as current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    #[serde(with = "time::serde::rfc3339")]
    pub from: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub until: OffsetDateTime,
}

impl TimeWindow {
    /// `[start, start + length]`.
    pub fn starting_at(start: OffsetDateTime, length: Duration) -> Self {
        Self {
            from: start,
            until: start + length,
        }
    }

    pub fn contains(&self, instant: OffsetDateTime) -> bool {
        self.from <= instant && instant <= self.until
    }

    pub fn has_elapsed(&self, now: OffsetDateTime) -> bool {
        now > self.until
    }
}

/// An unsigned proposed transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub command: Command,
    pub inputs: Vec<StateAndRef>,
    pub outputs: Vec<RecordState>,
    pub required_signers: BTreeSet<PublicKey>,
    pub notary: PartyIdentity,
    pub time_window: TimeWindow,
    pub attachments: BTreeSet<AttachmentHash>,
}

impl Transaction {
    pub fn to_wire(&self) -> Result<Vec<u8>, CoreError> {
        serde_json::to_vec(self).map_err(|e| CoreError::Encoding(e.to_string()))
    }

    pub fn from_wire(bytes: &[u8]) -> Result<Self, CoreError> {
        serde_json::from_slice(bytes).map_err(|e| CoreError::Encoding(e.to_string()))
    }

    pub fn id(&self) -> Result<TxId, CoreError> {
        Ok(SecureHash::sha256(&self.to_wire()?))
    }

    /// The consumed version, if any.
    pub fn input(&self) -> Option<&StateAndRef> {
        self.inputs.first()
    }

    /// The produced version, if any.
    pub fn output(&self) -> Option<&RecordState> {
        self.outputs.first()
    }

    pub fn consumed_refs(&self) -> Vec<StateRef> {
        self.inputs.iter().map(|i| i.state_ref).collect()
    }

    /// Business key of the record this transaction touches.
    pub fn business_key(&self) -> Option<&str> {
        self.output()
            .map(|o| o.business_key())
            .or_else(|| self.input().map(|i| i.state.business_key()))
    }
}

/// Assembles a [`Transaction`].
///
/// The notary is fixed when the builder is created and cannot be replaced
/// afterwards.
#[derive(Debug)]
pub struct TransactionBuilder {
    command: Command,
    notary: PartyIdentity,
    inputs: Vec<StateAndRef>,
    outputs: Vec<RecordState>,
    required_signers: BTreeSet<PublicKey>,
    attachments: BTreeSet<AttachmentHash>,
    time_window: Option<TimeWindow>,
}

impl TransactionBuilder {
    pub fn new(command: Command, notary: PartyIdentity) -> Self {
        Self {
            command,
            notary,
            inputs: Vec::new(),
            outputs: Vec::new(),
            required_signers: BTreeSet::new(),
            attachments: BTreeSet::new(),
            time_window: None,
        }
    }

    pub fn notary(&self) -> &PartyIdentity {
        &self.notary
    }

    pub fn input(mut self, input: StateAndRef) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn output(mut self, output: RecordState) -> Self {
        self.outputs.push(output);
        self
    }

    pub fn signer(mut self, key: PublicKey) -> Self {
        self.required_signers.insert(key);
        self
    }

    pub fn signers(mut self, keys: impl IntoIterator<Item = PublicKey>) -> Self {
        self.required_signers.extend(keys);
        self
    }

    pub fn attachment(mut self, hash: AttachmentHash) -> Self {
        self.attachments.insert(hash);
        self
    }

    pub fn attachments(mut self, hashes: impl IntoIterator<Item = AttachmentHash>) -> Self {
        self.attachments.extend(hashes);
        self
    }

    pub fn time_window(mut self, window: TimeWindow) -> Self {
        self.time_window = Some(window);
        self
    }

    pub fn build(self) -> Result<Transaction, CoreError> {
        let time_window = self
            .time_window
            .ok_or_else(|| CoreError::IncompleteTransaction("no time window".to_string()))?;
        if self.required_signers.is_empty() {
            return Err(CoreError::IncompleteTransaction(
                "no required signers".to_string(),
            ));
        }
        Ok(Transaction {
            command: self.command,
            inputs: self.inputs,
            outputs: self.outputs,
            required_signers: self.required_signers,
            notary: self.notary,
            time_window,
            attachments: self.attachments,
        })
    }
}

/// A transaction's wire bytes plus the signatures gathered over its id.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    id: TxId,
    #[serde(with = "base64_bytes")]
    wire: Vec<u8>,
    signatures: Vec<TransactionSignature>,
}

impl SignedTransaction {
    /// Encode `tx` with no signatures yet.
    pub fn new(tx: &Transaction) -> Result<Self, CoreError> {
        let wire = tx.to_wire()?;
        Ok(Self {
            id: SecureHash::sha256(&wire),
            wire,
            signatures: Vec::new(),
        })
    }

    pub fn id(&self) -> TxId {
        self.id
    }

    /// Re-derive the unsigned transaction, checking the wire bytes still
    /// hash to the id.
    pub fn transaction(&self) -> Result<Transaction, CoreError> {
        let actual = SecureHash::sha256(&self.wire);
        if actual != self.id {
            return Err(CoreError::TxIdMismatch {
                expected: self.id,
                actual,
            });
        }
        Transaction::from_wire(&self.wire)
    }

    pub fn signatures(&self) -> &[TransactionSignature] {
        &self.signatures
    }

    pub fn signers(&self) -> BTreeSet<PublicKey> {
        self.signatures.iter().map(|s| s.signer).collect()
    }

    pub fn is_signed_by(&self, key: &PublicKey) -> bool {
        self.signatures.iter().any(|s| &s.signer == key)
    }

    /// Add a verified signature. A second signature from the same signer is
    /// dropped.
    pub fn with_signature(mut self, signature: TransactionSignature) -> Result<Self, CoreError> {
        signature.verify(&self.id)?;
        if !self.is_signed_by(&signature.signer) {
            self.signatures.push(signature);
        }
        Ok(self)
    }

    pub fn sign(self, keys: &KeyPair) -> Result<Self, CoreError> {
        let signature = keys.sign_transaction(&self.id);
        self.with_signature(signature)
    }

    /// Check every attached signature against the id.
    pub fn verify_signatures(&self) -> Result<(), CoreError> {
        for sig in &self.signatures {
            sig.verify(&self.id)?;
        }
        Ok(())
    }

    pub fn missing_signers(&self, required: &BTreeSet<PublicKey>) -> BTreeSet<PublicKey> {
        let present = self.signers();
        required.difference(&present).copied().collect()
    }

    /// Every attached signature is valid and every key in `required` signed.
    pub fn verify_required(&self, required: &BTreeSet<PublicKey>) -> Result<(), CoreError> {
        self.verify_signatures()?;
        let missing = self.missing_signers(required);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(CoreError::MissingSignatures(
                missing.iter().map(|k| k.fingerprint()).collect(),
            ))
        }
    }
}

impl fmt::Debug for SignedTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignedTransaction")
            .field("id", &self.id)
            .field("signers", &self.signers())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{parse_date, Identity};
    use crate::party::Stakeholders;

    fn sample_tx(notary: &KeyPair, proposer: &KeyPair) -> Transaction {
        let identity = Identity {
            id_no: "X1".into(),
            name: "Alice".into(),
            dob: parse_date("2000-01-01").unwrap(),
            address: String::new(),
            phone_no: String::new(),
            email: "a@x.com".into(),
            passport_no: "P1".into(),
            stakeholders: vec![],
            documents: None,
        };
        let me = PartyIdentity::new("PartyA", proposer.public_key());
        TransactionBuilder::new(
            Command::Create,
            PartyIdentity::new("Notary", notary.public_key()),
        )
        .output(RecordState::new(
            identity,
            Stakeholders::builder().with(me).build(),
        ))
        .signer(proposer.public_key())
        .time_window(TimeWindow::starting_at(
            OffsetDateTime::UNIX_EPOCH,
            Duration::seconds(30),
        ))
        .build()
        .unwrap()
    }

    #[test]
    fn wire_roundtrip_preserves_id() {
        let tx = sample_tx(&KeyPair::generate(), &KeyPair::generate());
        let stx = SignedTransaction::new(&tx).unwrap();
        let decoded = stx.transaction().unwrap();
        assert_eq!(decoded, tx);
        assert_eq!(decoded.id().unwrap(), stx.id());
    }

    #[test]
    fn tampered_wire_is_detected() {
        let tx = sample_tx(&KeyPair::generate(), &KeyPair::generate());
        let mut stx = SignedTransaction::new(&tx).unwrap();
        let pos = stx.wire.len() / 2;
        stx.wire[pos] ^= 0x01;
        assert!(matches!(
            stx.transaction(),
            Err(CoreError::TxIdMismatch { .. }) | Err(CoreError::Encoding(_))
        ));
    }

    #[test]
    fn duplicate_signer_is_kept_once() {
        let proposer = KeyPair::generate();
        let tx = sample_tx(&KeyPair::generate(), &proposer);
        let stx = SignedTransaction::new(&tx)
            .unwrap()
            .sign(&proposer)
            .unwrap()
            .sign(&proposer)
            .unwrap();
        assert_eq!(stx.signatures().len(), 1);
    }

    #[test]
    fn missing_required_signer_is_reported() {
        let proposer = KeyPair::generate();
        let other = KeyPair::generate();
        let tx = sample_tx(&KeyPair::generate(), &proposer);
        let stx = SignedTransaction::new(&tx).unwrap().sign(&proposer).unwrap();
        let required: BTreeSet<_> = [proposer.public_key(), other.public_key()].into();
        let err = stx.verify_required(&required).unwrap_err();
        assert!(matches!(err, CoreError::MissingSignatures(ref keys) if keys.len() == 1));
    }

    #[test]
    fn builder_requires_time_window() {
        let keys = KeyPair::generate();
        let err = TransactionBuilder::new(
            Command::Delete,
            PartyIdentity::new("Notary", keys.public_key()),
        )
        .signer(keys.public_key())
        .build()
        .unwrap_err();
        assert!(matches!(err, CoreError::IncompleteTransaction(_)));
    }

    #[test]
    fn time_window_bounds_are_inclusive() {
        let start = OffsetDateTime::UNIX_EPOCH;
        let window = TimeWindow::starting_at(start, Duration::seconds(30));
        assert!(window.contains(start));
        assert!(window.contains(start + Duration::seconds(30)));
        assert!(window.has_elapsed(start + Duration::seconds(31)));
    }
}
