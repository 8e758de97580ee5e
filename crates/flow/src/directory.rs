//! The set of parties a node knows about.

use idledger_core::{PartyIdentity, PublicKey};

/// Known parties, the local party, and the network's notary.
#[derive(Debug, Clone)]
pub struct Directory {
    me: PartyIdentity,
    notary: PartyIdentity,
    parties: Vec<PartyIdentity>,
}

impl Directory {
    /// `parties` may or may not include `me` and `notary`; both are added.
    pub fn new(me: PartyIdentity, notary: PartyIdentity, parties: Vec<PartyIdentity>) -> Self {
        let mut all = vec![me.clone(), notary.clone()];
        for party in parties {
            if !all.iter().any(|p| p.key == party.key) {
                all.push(party);
            }
        }
        Self {
            me,
            notary,
            parties: all,
        }
    }

    pub fn me(&self) -> &PartyIdentity {
        &self.me
    }

    pub fn notary(&self) -> &PartyIdentity {
        &self.notary
    }

    /// Case-insensitive exact name match.
    pub fn resolve(&self, name: &str) -> Option<&PartyIdentity> {
        self.parties.iter().find(|p| p.matches_name(name.trim()))
    }

    pub fn by_key(&self, key: &PublicKey) -> Option<&PartyIdentity> {
        self.parties.iter().find(|p| &p.key == key)
    }

    /// Display name for a key, falling back to its fingerprint.
    pub fn name_of(&self, key: &PublicKey) -> String {
        self.by_key(key)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| key.fingerprint())
    }

    /// Every known party other than this one and the notary.
    pub fn peers(&self) -> Vec<PartyIdentity> {
        self.parties
            .iter()
            .filter(|p| p.key != self.me.key && p.key != self.notary.key)
            .cloned()
            .collect()
    }
}
