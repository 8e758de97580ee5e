mod common;

use idledger_core::FailureKind;
use idledger_flow::SigningPolicy;
use time::macros::date;

use common::{alice, network};

#[tokio::test]
async fn create_then_find_returns_record_with_stakeholders() {
    let (sim, _clock) = network(&[
        ("PartyA", SigningPolicy::Approve),
        ("BankA", SigningPolicy::Approve),
    ])
    .await;
    let a = sim.node("PartyA").unwrap();

    let result = a.create(alice(&["BankA"])).await;
    assert!(result.is_success(), "{result}");

    let found = a.find("X1").await.unwrap().expect("X1 is live");
    assert_eq!(found.state.identity, alice(&["BankA"]));
    let mut names = found.state.stakeholders.names();
    names.sort();
    assert_eq!(names, vec!["BankA", "PartyA"]);
    assert_eq!(found.state_ref.tx_id, result.transaction_id().unwrap());

    let bank_copy = sim.node("BankA").unwrap().find("X1").await.unwrap();
    assert_eq!(bank_copy, Some(found));
}

#[tokio::test]
async fn second_create_of_same_key_is_duplicate() {
    let (sim, _clock) = network(&[("PartyA", SigningPolicy::Approve)]).await;
    let a = sim.node("PartyA").unwrap();
    assert!(a.create(alice(&[])).await.is_success());

    let result = a.create(alice(&[])).await;
    assert_eq!(result.failure_kind(), Some(FailureKind::DuplicateKey));
    assert!(result.message().starts_with("DuplicateKeyError"), "{result}");
}

#[tokio::test]
async fn underage_update_is_rejected_and_ledger_unchanged() {
    let (sim, _clock) = network(&[
        ("PartyA", SigningPolicy::Approve),
        ("BankA", SigningPolicy::Approve),
    ])
    .await;
    let a = sim.node("PartyA").unwrap();
    assert!(a.create(alice(&["BankA"])).await.is_success());
    let before = a.find("X1").await.unwrap();

    let mut minor = alice(&["BankA"]);
    minor.dob = date!(2015 - 01 - 01);
    let result = a.update(minor).await;

    assert_eq!(result.failure_kind(), Some(FailureKind::Validation));
    assert!(
        result.message().starts_with("ValidationError: age requirement"),
        "{result}"
    );
    assert_eq!(a.find("X1").await.unwrap(), before);
}

#[tokio::test]
async fn withheld_signature_blocks_delete() {
    let (sim, _clock) = network(&[
        ("PartyA", SigningPolicy::Approve),
        ("BankA", SigningPolicy::Reject),
    ])
    .await;
    let a = sim.node("PartyA").unwrap();
    assert!(a.create(alice(&["BankA"])).await.is_success());

    let result = a.delete("X1").await;
    assert_eq!(result.failure_kind(), Some(FailureKind::SignatureRejected));
    assert!(result.message().starts_with("SignatureRejected"), "{result}");
    assert!(a.find("X1").await.unwrap().is_some());
    assert!(sim.node("BankA").unwrap().find("X1").await.unwrap().is_some());
    assert_eq!(sim.notary().consumed_count().await, 0);
}

#[tokio::test]
async fn racing_updates_on_one_version_notarize_once() {
    let (sim, _clock) = network(&[("PartyA", SigningPolicy::Approve)]).await;
    let a = sim.node("PartyA").unwrap();
    assert!(a.create(alice(&[])).await.is_success());

    let mut first = alice(&[]);
    first.address = "2 High St".to_string();
    let mut second = alice(&[]);
    second.address = "3 Low Rd".to_string();
    let first = a.proposal_builder().update(first).await.unwrap();
    let second = a.proposal_builder().update(second).await.unwrap();
    assert_eq!(
        first.transaction.input().unwrap().state_ref,
        second.transaction.input().unwrap().state_ref
    );

    let (r1, r2) = tokio::join!(a.submit(first), a.submit(second));
    let results = [r1, r2];
    assert_eq!(results.iter().filter(|r| r.is_success()).count(), 1);
    let loser = results.iter().find(|r| !r.is_success()).unwrap();
    assert_eq!(loser.failure_kind(), Some(FailureKind::Conflict), "{loser}");
    assert!(loser.message().starts_with("Conflict"));

    let live = a.find("X1").await.unwrap().unwrap();
    assert_eq!(
        Some(live.state_ref.tx_id),
        results.iter().find_map(|r| r.transaction_id())
    );
}

#[tokio::test]
async fn stale_update_countersigned_by_bank_is_a_conflict() {
    let (sim, _clock) = network(&[
        ("PartyA", SigningPolicy::Approve),
        ("BankA", SigningPolicy::Approve),
    ])
    .await;
    let a = sim.node("PartyA").unwrap();
    let bank = sim.node("BankA").unwrap();
    assert!(a.create(alice(&["BankA"])).await.is_success());

    let mut first = alice(&["BankA"]);
    first.address = "2 High St".to_string();
    let mut second = alice(&["BankA"]);
    second.address = "3 Low Rd".to_string();
    let first = a.proposal_builder().update(first).await.unwrap();
    let second = a.proposal_builder().update(second).await.unwrap();

    let r1 = a.submit(first).await;
    assert!(r1.is_success(), "{r1}");
    let r2 = a.submit(second).await;
    assert_eq!(r2.failure_kind(), Some(FailureKind::Conflict), "{r2}");
    assert!(r2.message().starts_with("Conflict"), "{r2}");
    assert!(FailureKind::Conflict.is_retryable());

    let live = bank.find("X1").await.unwrap().unwrap();
    assert_eq!(Some(live.state_ref.tx_id), r1.transaction_id());
    assert_eq!(live.state.identity.address, "2 High St");
    assert_eq!(sim.notary().consumed_count().await, 1);
}

#[tokio::test]
async fn racing_updates_with_counterparty_notarize_once() {
    let (sim, _clock) = network(&[
        ("PartyA", SigningPolicy::Approve),
        ("BankA", SigningPolicy::Approve),
    ])
    .await;
    let a = sim.node("PartyA").unwrap();
    assert!(a.create(alice(&["BankA"])).await.is_success());

    let mut first = alice(&["BankA"]);
    first.address = "2 High St".to_string();
    let mut second = alice(&["BankA"]);
    second.address = "3 Low Rd".to_string();
    let first = a.proposal_builder().update(first).await.unwrap();
    let second = a.proposal_builder().update(second).await.unwrap();

    let (r1, r2) = tokio::join!(a.submit(first), a.submit(second));
    let results = [r1, r2];
    assert_eq!(results.iter().filter(|r| r.is_success()).count(), 1);
    let loser = results.iter().find(|r| !r.is_success()).unwrap();
    assert_eq!(loser.failure_kind(), Some(FailureKind::Conflict), "{loser}");
}
