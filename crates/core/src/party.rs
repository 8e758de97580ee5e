//! Party identities and the immutable stakeholder set of a record version.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::crypto::PublicKey;

/// A named participant on the network, identified by its signing key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PartyIdentity {
    pub name: String,
    pub key: PublicKey,
}

impl PartyIdentity {
    pub fn new(name: impl Into<String>, key: PublicKey) -> Self {
        Self {
            name: name.into(),
            key,
        }
    }

    /// Case-insensitive exact name match.
    pub fn matches_name(&self, name: &str) -> bool {
        self.name.to_uppercase() == name.to_uppercase()
    }
}

impl fmt::Display for PartyIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// The parties entitled to see and consume a record version.
///
/// Deduplicated by key and kept in key order, so two stakeholder sets with
/// the same members serialize identically. Built once through
/// [`StakeholdersBuilder`] and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<PartyIdentity>", into = "Vec<PartyIdentity>")]
pub struct Stakeholders(Vec<PartyIdentity>);

impl Stakeholders {
    pub fn builder() -> StakeholdersBuilder {
        StakeholdersBuilder::default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PartyIdentity> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains_key(&self, key: &PublicKey) -> bool {
        self.0.iter().any(|p| &p.key == key)
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.0.iter().any(|p| p.matches_name(name))
    }

    pub fn keys(&self) -> BTreeSet<PublicKey> {
        self.0.iter().map(|p| p.key).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(|p| p.name.as_str()).collect()
    }
}

impl From<Vec<PartyIdentity>> for Stakeholders {
    fn from(parties: Vec<PartyIdentity>) -> Self {
        let mut builder = StakeholdersBuilder::default();
        for party in parties {
            builder.add(party);
        }
        builder.build()
    }
}

impl From<Stakeholders> for Vec<PartyIdentity> {
    fn from(stakeholders: Stakeholders) -> Self {
        stakeholders.0
    }
}

impl<'a> IntoIterator for &'a Stakeholders {
    type Item = &'a PartyIdentity;
    type IntoIter = std::slice::Iter<'a, PartyIdentity>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Accumulates stakeholders during transaction assembly.
#[derive(Debug, Default)]
pub struct StakeholdersBuilder {
    parties: BTreeMap<PublicKey, PartyIdentity>,
}

impl StakeholdersBuilder {
    /// Add a party. A second party with the same key is ignored.
    pub fn add(&mut self, party: PartyIdentity) -> &mut Self {
        self.parties.entry(party.key).or_insert(party);
        self
    }

    pub fn with(mut self, party: PartyIdentity) -> Self {
        self.add(party);
        self
    }

    pub fn extend<'a>(&mut self, parties: impl IntoIterator<Item = &'a PartyIdentity>) -> &mut Self {
        for party in parties {
            self.add(party.clone());
        }
        self
    }

    pub fn build(self) -> Stakeholders {
        Stakeholders(self.parties.into_values().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    fn party(name: &str) -> PartyIdentity {
        PartyIdentity::new(name, KeyPair::generate().public_key())
    }

    #[test]
    fn name_match_ignores_case_only() {
        let bank = party("BankA");
        assert!(bank.matches_name("banka"));
        assert!(bank.matches_name("BANKA"));
        assert!(!bank.matches_name("Bank A"));
        assert!(!bank.matches_name("BankA "));
    }

    #[test]
    fn builder_deduplicates_by_key() {
        let a = party("A");
        let stakeholders = Stakeholders::builder()
            .with(a.clone())
            .with(a.clone())
            .with(party("B"))
            .build();
        assert_eq!(stakeholders.len(), 2);
        assert!(stakeholders.contains_key(&a.key));
    }

    #[test]
    fn insertion_order_does_not_change_serialization() {
        let a = party("A");
        let b = party("B");
        let ab = Stakeholders::builder().with(a.clone()).with(b.clone()).build();
        let ba = Stakeholders::builder().with(b).with(a).build();
        assert_eq!(
            serde_json::to_string(&ab).unwrap(),
            serde_json::to_string(&ba).unwrap()
        );
    }
}
