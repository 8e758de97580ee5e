use std::future::Future;

use idledger_core::{KeyPair, SecureHash};

use super::{apply, produced, Fixture, TestResult};
use crate::record::{CommitOutcome, CommitRecord};
use crate::LedgerStore;

pub(super) async fn run_commit_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "commit",
            "create_makes_version_live",
            create_makes_version_live(factory).await,
        ),
        TestResult::from_result(
            "commit",
            "update_replaces_live_version",
            update_replaces_live_version(factory).await,
        ),
        TestResult::from_result(
            "commit",
            "delete_leaves_no_live_version",
            delete_leaves_no_live_version(factory).await,
        ),
        TestResult::from_result(
            "commit",
            "transaction_is_recorded",
            transaction_is_recorded(factory).await,
        ),
        TestResult::from_result(
            "commit",
            "attachments_are_referenced",
            attachments_are_referenced(factory).await,
        ),
        TestResult::from_result(
            "commit",
            "irrelevant_output_not_tracked",
            irrelevant_output_not_tracked(factory).await,
        ),
    ]
}

async fn create_makes_version_live<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let fx = Fixture::new();
    let commit = fx.create("X1", "Ann")?;
    let expected = produced(&commit)?;

    let outcome = store.apply_commit(commit).await.map_err(|e| e.to_string())?;
    if outcome != CommitOutcome::Applied {
        return Err(format!("expected Applied, got {outcome:?}"));
    }
    let live = store
        .current_live_version(&expected.state.linear_id)
        .await
        .map_err(|e| e.to_string())?;
    if live.as_ref() != Some(&expected) {
        return Err(format!("expected live version {expected:?}, got {live:?}"));
    }
    Ok(())
}

async fn update_replaces_live_version<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let fx = Fixture::new();
    let create = fx.create("X1", "Ann")?;
    let v1 = produced(&create)?;
    apply(&store, create).await?;

    let update = fx.update(&v1, "Anne")?;
    let v2 = produced(&update)?;
    let update_id = update.transaction.id();
    apply(&store, update).await?;

    let live = store
        .current_live_version(&v1.state.linear_id)
        .await
        .map_err(|e| e.to_string())?
        .ok_or("record has no live version after update")?;
    if live.state_ref != v2.state_ref {
        return Err(format!(
            "live version is {} but update produced {}",
            live.state_ref, v2.state_ref
        ));
    }
    if live.state.identity.name != "Anne" {
        return Err(format!("expected name Anne, got {}", live.state.identity.name));
    }
    let consumed_by = store
        .consumed_by(&v1.state_ref)
        .await
        .map_err(|e| e.to_string())?;
    if consumed_by != Some(update_id) {
        return Err(format!(
            "update input should be consumed by {update_id}, store has {consumed_by:?}"
        ));
    }
    Ok(())
}

async fn delete_leaves_no_live_version<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let fx = Fixture::new();
    let create = fx.create("X1", "Ann")?;
    let v1 = produced(&create)?;
    apply(&store, create).await?;
    apply(&store, fx.delete(&v1)?).await?;

    let live = store
        .current_live_version(&v1.state.linear_id)
        .await
        .map_err(|e| e.to_string())?;
    if live.is_some() {
        return Err(format!("expected no live version after delete, got {live:?}"));
    }
    let all = store.list_live().await.map_err(|e| e.to_string())?;
    if !all.is_empty() {
        return Err(format!("expected empty live set, got {} versions", all.len()));
    }
    Ok(())
}

async fn transaction_is_recorded<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let fx = Fixture::new();
    let commit = fx.create("X1", "Ann")?;
    let stx = commit.transaction.clone();
    apply(&store, commit).await?;

    let recorded = store
        .transaction(&stx.id())
        .await
        .map_err(|e| e.to_string())?
        .ok_or("committed transaction not found")?;
    if recorded != stx {
        return Err("recorded transaction differs from committed one".to_string());
    }
    Ok(())
}

async fn attachments_are_referenced<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let fx = Fixture::new();
    let hash = SecureHash::sha256(b"passport scan");
    let mut commit = fx.create("X1", "Ann")?;
    commit.attachments.insert(hash);
    apply(&store, commit).await?;

    let refs = store
        .referenced_attachments()
        .await
        .map_err(|e| e.to_string())?;
    if !refs.contains(&hash) {
        return Err(format!("attachment {hash} not referenced after commit"));
    }
    Ok(())
}

async fn irrelevant_output_not_tracked<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let fx = Fixture::new();
    let create = fx.create("X1", "Ann")?;
    let tx = create
        .transaction
        .transaction()
        .map_err(|e| e.to_string())?;
    let outsider = KeyPair::from_seed([42; 32]).public_key();
    let commit = CommitRecord::for_party(create.transaction.clone(), &tx, &outsider);
    apply(&store, commit).await?;

    let all = store.list_live().await.map_err(|e| e.to_string())?;
    if !all.is_empty() {
        return Err(format!(
            "non-stakeholder store tracks {} live versions",
            all.len()
        ));
    }
    if store
        .transaction(&create.transaction.id())
        .await
        .map_err(|e| e.to_string())?
        .is_none()
    {
        return Err("transaction not recorded for non-stakeholder".to_string());
    }
    Ok(())
}
