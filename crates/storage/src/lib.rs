//! Per-party persistence for the identity ledger.
//!
//! [`LedgerStore`] holds the party's view of the ledger: the live version
//! of every record it is a stakeholder of, the set of consumed versions,
//! and every transaction it has committed. [`AttachmentStore`] holds
//! content-addressed blobs. Both have in-memory backends; attachments also
//! have a filesystem backend.

pub mod conformance;
mod error;
mod fs;
mod memory;
mod record;
mod traits;

pub use error::StorageError;
pub use fs::FsAttachmentStore;
pub use memory::{MemoryAttachmentStore, MemoryLedgerStore};
pub use record::{AttachmentStored, CommitOutcome, CommitRecord};
pub use traits::{AttachmentStore, LedgerStore};
