//! The TOML description of a simulated network.

use std::path::{Path, PathBuf};

use idledger_flow::{FlowConfig, Simulation, SigningPolicy};
use serde::Deserialize;

use crate::keygen::read_secret_key;

/// ```toml
/// notary = "Notary"
///
/// [[parties]]
/// name = "PartyA"
///
/// [[parties]]
/// name = "BankA"
/// policy = "reject"
/// reachable = false
/// key = "keys/bank-a.secret"
///
/// [flow]
/// counterparty_timeout_ms = 500
/// ```
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct NetworkConfig {
    #[serde(default = "default_notary")]
    pub notary: String,
    pub parties: Vec<PartyConfig>,
    #[serde(default)]
    pub flow: FlowConfig,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct PartyConfig {
    pub name: String,
    #[serde(default)]
    pub policy: SigningPolicy,
    #[serde(default = "default_reachable")]
    pub reachable: bool,
    /// Secret key file from `idledger keygen`; fresh keys when absent.
    pub key: Option<PathBuf>,
}

fn default_notary() -> String {
    "Notary".to_string()
}

fn default_reachable() -> bool {
    true
}

impl NetworkConfig {
    pub fn load(path: &Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read '{}': {}", path.display(), e))?;
        let config: Self = toml::from_str(&text)
            .map_err(|e| format!("invalid network file '{}': {}", path.display(), e))?;
        if config.parties.is_empty() {
            return Err(format!("network file '{}' declares no parties", path.display()));
        }
        Ok(config)
    }

    /// Start every party, resolving key paths relative to `base`.
    pub async fn start(&self, base: &Path) -> Result<Simulation, String> {
        let mut builder = Simulation::builder()
            .notary(self.notary.clone())
            .config(self.flow.clone());
        for party in &self.parties {
            builder = match &party.key {
                Some(path) => builder.party_with_keys(
                    party.name.clone(),
                    party.policy.clone(),
                    read_secret_key(&base.join(path))?,
                ),
                None => builder.party(party.name.clone(), party.policy.clone()),
            };
        }
        let sim = builder.build().await;
        for party in self.parties.iter().filter(|p| !p.reachable) {
            sim.set_reachable(&party.name, false).await;
        }
        Ok(sim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_policies_and_flow_table() {
        let config: NetworkConfig = toml::from_str(
            r#"
[[parties]]
name = "PartyA"

[[parties]]
name = "BankA"
policy = "unresponsive"
reachable = false

[flow]
counterparty_timeout_ms = 100
"#,
        )
        .unwrap();
        assert_eq!(config.notary, "Notary");
        assert_eq!(config.parties[0].policy, SigningPolicy::Approve);
        assert_eq!(config.parties[1].policy, SigningPolicy::Unresponsive);
        assert!(!config.parties[1].reachable);
        assert_eq!(config.flow.counterparty_timeout_ms, 100);
        assert_eq!(config.flow.time_window_secs, 30);
    }

    #[test]
    fn unknown_policy_is_rejected() {
        let result: Result<NetworkConfig, _> = toml::from_str(
            r#"
[[parties]]
name = "PartyA"
policy = "sometimes"
"#,
        );
        assert!(result.is_err());
    }
}
