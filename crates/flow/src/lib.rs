//! idledger-flow: the multi-party update protocol.
//!
//! A [`PartyNode`] proposes a transition, has it checked and signed by every
//! required counterparty, gets it ordered by the notary, and commits it to
//! every stakeholder's store. Each flow ends in exactly one
//! [`FlowResult`](idledger_core::FlowResult).
//!
//! # Public API
//!
//! - [`PartyNode`] -- `create`, `update`, `delete`, `find`, `list_live`
//! - [`ProposalBuilder`] -- transaction assembly
//! - [`Validator`] -- contract checks and post-notarization re-validation
//! - [`SignatureCollection`], [`SignatureCollector`] -- quorum tracking
//! - [`NotaryService`], [`SimpleNotary`], [`NotaryClient`] -- input ordering
//! - [`Broadcaster`], [`Recipient`] -- commit distribution and redelivery
//! - [`Backchain`] -- fetching input history a party missed
//! - [`Network`], [`LocalNetwork`] -- the transport seam
//! - [`Simulation`] -- a whole network in one process

pub mod backchain;
pub mod broadcast;
pub mod clock;
pub mod collector;
pub mod config;
pub mod directory;
pub mod error;
pub mod network;
pub mod node;
pub mod notary;
mod orchestrator;
pub mod proposal;
pub mod responder;
pub mod sim;
pub mod validator;

pub use backchain::Backchain;
pub use broadcast::{broadcast_set, BroadcastReport, Broadcaster, Recipient};
pub use clock::{Clock, ManualClock, SystemClock};
pub use collector::{CollectionState, SignatureCollection, SignatureCollector};
pub use config::FlowConfig;
pub use directory::Directory;
pub use error::FlowError;
pub use network::{Counterparty, LocalNetwork, Network, SignatureResponse};
pub use node::{PartyNode, PartyNodeBuilder};
pub use notary::{NotaryClient, NotaryError, NotaryService, SimpleNotary};
pub use proposal::{Proposal, ProposalBuilder};
pub use responder::{Responder, SigningPolicy};
pub use sim::{Simulation, SimulationBuilder};
pub use validator::Validator;
