//! Record versions and references to them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::crypto::PublicKey;
use crate::hash::{SecureHash, TxId};
use crate::identity::Identity;
use crate::party::{PartyIdentity, Stakeholders};

/// Stable identifier shared by every version of one logical record.
///
/// Derived from the business key, so any party can compute it without
/// consulting the ledger.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinearId(String);

impl LinearId {
    pub fn from_business_key(key: &str) -> Self {
        Self(SecureHash::sha256(format!("identity:{}", key).as_bytes()).to_hex())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LinearId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Points at one output of one transaction: a specific record version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StateRef {
    pub tx_id: TxId,
    pub index: u32,
}

impl fmt::Display for StateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.tx_id, self.index)
    }
}

/// One version of an identity record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordState {
    pub linear_id: LinearId,
    pub identity: Identity,
    pub stakeholders: Stakeholders,
}

impl RecordState {
    pub fn new(identity: Identity, stakeholders: Stakeholders) -> Self {
        Self {
            linear_id: identity.linear_id(),
            identity,
            stakeholders,
        }
    }

    pub fn business_key(&self) -> &str {
        self.identity.business_key()
    }

    /// A party tracks this version if its key is among the stakeholders.
    pub fn is_relevant_to(&self, key: &PublicKey) -> bool {
        self.stakeholders.contains_key(key)
    }
}

/// A committed record version together with where it was produced and
/// which notary orders its consumption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateAndRef {
    pub state: RecordState,
    pub state_ref: StateRef,
    pub notary: PartyIdentity,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_id_is_deterministic_per_key() {
        assert_eq!(
            LinearId::from_business_key("X1"),
            LinearId::from_business_key("X1")
        );
        assert_ne!(
            LinearId::from_business_key("X1"),
            LinearId::from_business_key("X2")
        );
    }
}
