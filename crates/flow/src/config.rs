//! Flow tuning parameters.

use std::path::Path;

use idledger_core::contract::DEFAULT_MINIMUM_AGE_YEARS;
use idledger_core::ContractRules;
use serde::{Deserialize, Serialize};

/// Timeouts, validity window length, and contract parameters for one party.
///
/// Loaded from TOML; any key left out takes its default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Length of the `[now, now + n]` window attached to each proposal.
    pub time_window_secs: u64,
    /// How long to wait for each counterparty's signature.
    pub counterparty_timeout_ms: u64,
    pub notary_timeout_ms: u64,
    /// How long to wait for a broadcast recipient before queueing for redelivery.
    pub delivery_timeout_ms: u64,
    pub minimum_age_years: u8,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            time_window_secs: 30,
            counterparty_timeout_ms: 5000,
            notary_timeout_ms: 5000,
            delivery_timeout_ms: 5000,
            minimum_age_years: DEFAULT_MINIMUM_AGE_YEARS,
        }
    }
}

impl FlowConfig {
    pub fn from_toml(text: &str) -> Result<Self, String> {
        toml::from_str(text).map_err(|e| format!("invalid flow config: {}", e))
    }

    pub fn load(path: &Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
        Self::from_toml(&text)
    }

    pub fn time_window(&self) -> time::Duration {
        time::Duration::seconds(self.time_window_secs as i64)
    }

    pub fn counterparty_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.counterparty_timeout_ms)
    }

    pub fn notary_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.notary_timeout_ms)
    }

    pub fn delivery_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.delivery_timeout_ms)
    }

    pub fn contract_rules(&self) -> ContractRules {
        ContractRules {
            minimum_age_years: self.minimum_age_years,
        }
    }
}
