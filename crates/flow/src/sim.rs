//! Building a whole network of parties in one process.

use std::collections::BTreeMap;
use std::sync::Arc;

use idledger_core::{KeyPair, PartyIdentity};

use crate::clock::{Clock, SystemClock};
use crate::config::FlowConfig;
use crate::directory::Directory;
use crate::network::LocalNetwork;
use crate::node::PartyNode;
use crate::notary::{NotaryService, SimpleNotary};
use crate::responder::SigningPolicy;

/// A notary and a set of parties wired to one [`LocalNetwork`].
#[derive(Debug)]
pub struct Simulation {
    network: LocalNetwork,
    notary: Arc<SimpleNotary>,
    nodes: BTreeMap<String, Arc<PartyNode>>,
}

impl Simulation {
    pub fn builder() -> SimulationBuilder {
        SimulationBuilder::default()
    }

    /// Case-insensitive lookup of a party by name.
    pub fn node(&self, name: &str) -> Option<&Arc<PartyNode>> {
        self.nodes
            .values()
            .find(|n| n.identity().matches_name(name))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Arc<PartyNode>> {
        self.nodes.values()
    }

    pub fn notary(&self) -> &SimpleNotary {
        &self.notary
    }

    pub fn network(&self) -> &LocalNetwork {
        &self.network
    }

    /// Returns false if no party or notary has that name.
    pub async fn set_reachable(&self, name: &str, reachable: bool) -> bool {
        let key = match self.node(name) {
            Some(node) => node.identity().key,
            None if self.notary.identity().matches_name(name) => self.notary.identity().key,
            None => return false,
        };
        self.network.set_reachable(&key, reachable).await;
        true
    }
}

pub struct SimulationBuilder {
    notary_name: String,
    parties: Vec<(String, SigningPolicy, Option<KeyPair>)>,
    clock: Arc<dyn Clock>,
    config: FlowConfig,
}

impl Default for SimulationBuilder {
    fn default() -> Self {
        Self {
            notary_name: "Notary".to_string(),
            parties: Vec::new(),
            clock: Arc::new(SystemClock),
            config: FlowConfig::default(),
        }
    }
}

impl SimulationBuilder {
    pub fn notary(mut self, name: impl Into<String>) -> Self {
        self.notary_name = name.into();
        self
    }

    pub fn party(mut self, name: impl Into<String>, policy: SigningPolicy) -> Self {
        self.parties.push((name.into(), policy, None));
        self
    }

    /// A party signing with existing keys instead of fresh ones.
    pub fn party_with_keys(
        mut self,
        name: impl Into<String>,
        policy: SigningPolicy,
        keys: KeyPair,
    ) -> Self {
        self.parties.push((name.into(), policy, Some(keys)));
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(mut self, config: FlowConfig) -> Self {
        self.config = config;
        self
    }

    pub async fn build(self) -> Simulation {
        let network = LocalNetwork::new();
        let notary = Arc::new(SimpleNotary::new(
            self.notary_name,
            KeyPair::generate(),
            Arc::clone(&self.clock),
        ));
        network.register_notary(notary.clone()).await;

        let keys: Vec<(KeyPair, SigningPolicy, PartyIdentity)> = self
            .parties
            .into_iter()
            .map(|(name, policy, keys)| {
                let keys = keys.unwrap_or_else(KeyPair::generate);
                let identity = PartyIdentity::new(name, keys.public_key());
                (keys, policy, identity)
            })
            .collect();
        let everyone: Vec<PartyIdentity> = keys.iter().map(|(_, _, id)| id.clone()).collect();

        let mut nodes = BTreeMap::new();
        for (keys, policy, identity) in keys {
            let directory = Directory::new(
                identity.clone(),
                notary.identity().clone(),
                everyone.clone(),
            );
            let node = PartyNode::builder(keys, directory, Arc::new(network.clone()))
                .clock(Arc::clone(&self.clock))
                .config(self.config.clone())
                .policy(policy)
                .build();
            network.register_party(&identity, node.endpoint()).await;
            nodes.insert(identity.name.clone(), Arc::new(node));
        }

        Simulation {
            network,
            notary,
            nodes,
        }
    }
}
