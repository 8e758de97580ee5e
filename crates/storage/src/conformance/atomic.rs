use std::future::Future;

use super::{apply, produced, Fixture, TestResult};
use crate::{LedgerStore, StorageError};

pub(super) async fn run_atomic_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "atomic",
            "second_spend_of_input_rejected",
            second_spend_of_input_rejected(factory).await,
        ),
        TestResult::from_result(
            "atomic",
            "rejected_commit_changes_nothing",
            rejected_commit_changes_nothing(factory).await,
        ),
        TestResult::from_result(
            "atomic",
            "second_live_version_rejected",
            second_live_version_rejected(factory).await,
        ),
    ]
}

async fn second_spend_of_input_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
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
    let first = fx.update(&v1, "Anne")?;
    let first_id = first.transaction.id();
    apply(&store, first).await?;

    match store.apply_commit(fx.update(&v1, "Annie")?).await {
        Err(StorageError::InputAlreadyConsumed {
            state_ref,
            consumed_by,
        }) => {
            if state_ref != v1.state_ref || consumed_by != first_id {
                return Err(format!(
                    "wrong conflict details: {state_ref} consumed by {consumed_by}"
                ));
            }
            Ok(())
        }
        other => Err(format!("expected InputAlreadyConsumed, got {other:?}")),
    }
}

async fn rejected_commit_changes_nothing<S, F, Fut>(factory: &F) -> Result<(), String>
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
    let first = fx.update(&v1, "Anne")?;
    let v2 = produced(&first)?;
    apply(&store, first).await?;

    let rejected = fx.update(&v1, "Annie")?;
    let rejected_id = rejected.transaction.id();
    if store.apply_commit(rejected).await.is_ok() {
        return Err("conflicting commit was accepted".to_string());
    }

    let live = store
        .current_live_version(&v1.state.linear_id)
        .await
        .map_err(|e| e.to_string())?
        .ok_or("live version lost after rejected commit")?;
    if live.state_ref != v2.state_ref {
        return Err(format!(
            "live version moved to {} after rejected commit",
            live.state_ref
        ));
    }
    if store
        .transaction(&rejected_id)
        .await
        .map_err(|e| e.to_string())?
        .is_some()
    {
        return Err("rejected transaction was recorded".to_string());
    }
    Ok(())
}

async fn second_live_version_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let fx = Fixture::new();
    apply(&store, fx.create("X1", "Ann")?).await?;

    match store.apply_commit(fx.create("X1", "Bob")?).await {
        Err(StorageError::LinearFork { .. }) => {}
        other => return Err(format!("expected LinearFork, got {other:?}")),
    }
    let all = store.list_live().await.map_err(|e| e.to_string())?;
    if all.len() != 1 || all[0].state.identity.name != "Ann" {
        return Err(format!("expected only Ann to be live, got {all:?}"));
    }
    Ok(())
}
