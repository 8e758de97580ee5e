#![allow(dead_code)]

use std::sync::Arc;

use idledger_core::Identity;
use idledger_flow::{FlowConfig, ManualClock, Simulation, SigningPolicy};
use time::macros::{date, datetime};

pub fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(datetime!(2025-06-01 9:00 UTC)))
}

pub async fn network(parties: &[(&str, SigningPolicy)]) -> (Simulation, Arc<ManualClock>) {
    network_with(parties, FlowConfig::default()).await
}

pub async fn network_with(
    parties: &[(&str, SigningPolicy)],
    config: FlowConfig,
) -> (Simulation, Arc<ManualClock>) {
    let clock = clock();
    let mut builder = Simulation::builder().clock(clock.clone()).config(config);
    for (name, policy) in parties {
        builder = builder.party(*name, policy.clone());
    }
    (builder.build().await, clock)
}

pub fn alice(stakeholders: &[&str]) -> Identity {
    Identity {
        id_no: "X1".to_string(),
        name: "Alice".to_string(),
        dob: date!(2000 - 01 - 01),
        address: "1 Main St".to_string(),
        phone_no: "555-0100".to_string(),
        email: "a@x.com".to_string(),
        passport_no: "P1".to_string(),
        stakeholders: stakeholders.iter().map(|s| s.to_string()).collect(),
        documents: None,
    }
}
