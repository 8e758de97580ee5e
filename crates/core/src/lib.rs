//! idledger-core: data model and pure validation for the identity ledger.
//!
//! Everything in this crate is synchronous and side-effect free. The
//! multi-party protocol that moves these values between parties lives in
//! `idledger-flow`; local persistence lives in `idledger-storage`.
//!
//! # Public API
//!
//! - [`Identity`], [`Document`] -- the business payload of a record
//! - [`RecordState`], [`StateAndRef`], [`StateRef`], [`LinearId`] -- record versions
//! - [`Transaction`], [`TransactionBuilder`], [`SignedTransaction`] -- proposed transitions
//! - [`contract::verify`] -- the contract rules every party re-runs
//! - [`FlowResult`] -- the two-variant outcome of an orchestrated flow

pub mod contract;
pub mod crypto;
pub mod error;
pub mod hash;
pub mod identity;
pub mod party;
pub mod record;
pub mod result;
pub mod transaction;

pub use contract::{ContractRules, ContractViolation};
pub use crypto::{KeyPair, PublicKey, SignatureBytes, TransactionSignature};
pub use error::CoreError;
pub use hash::{AttachmentHash, SecureHash, TxId};
pub use identity::{Document, Identity};
pub use party::{PartyIdentity, Stakeholders, StakeholdersBuilder};
pub use record::{LinearId, RecordState, StateAndRef, StateRef};
pub use result::{FailureKind, FlowFailure, FlowResult};
pub use transaction::{Command, SignedTransaction, TimeWindow, Transaction, TransactionBuilder};
