use std::future::Future;

use super::{apply, produced, Fixture, TestResult};
use crate::record::CommitOutcome;
use crate::LedgerStore;

pub(super) async fn run_idempotent_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "idempotent",
            "recommit_reports_already_applied",
            recommit_reports_already_applied(factory).await,
        ),
        TestResult::from_result(
            "idempotent",
            "recommit_after_update_changes_nothing",
            recommit_after_update_changes_nothing(factory).await,
        ),
    ]
}

async fn recommit_reports_already_applied<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let fx = Fixture::new();
    let commit = fx.create("X1", "Ann")?;
    apply(&store, commit.clone()).await?;

    let outcome = store.apply_commit(commit).await.map_err(|e| e.to_string())?;
    if outcome != CommitOutcome::AlreadyApplied {
        return Err(format!("expected AlreadyApplied, got {outcome:?}"));
    }
    let all = store.list_live().await.map_err(|e| e.to_string())?;
    if all.len() != 1 {
        return Err(format!("expected 1 live version, got {}", all.len()));
    }
    Ok(())
}

/// A stale redelivery of the create must not resurrect the old version.
async fn recommit_after_update_changes_nothing<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let fx = Fixture::new();
    let create = fx.create("X1", "Ann")?;
    let v1 = produced(&create)?;
    apply(&store, create.clone()).await?;
    let update = fx.update(&v1, "Anne")?;
    let v2 = produced(&update)?;
    apply(&store, update).await?;

    let outcome = store.apply_commit(create).await.map_err(|e| e.to_string())?;
    if outcome != CommitOutcome::AlreadyApplied {
        return Err(format!("expected AlreadyApplied, got {outcome:?}"));
    }
    let live = store
        .current_live_version(&v1.state.linear_id)
        .await
        .map_err(|e| e.to_string())?;
    if live.map(|l| l.state_ref) != Some(v2.state_ref) {
        return Err("stale recommit changed the live version".to_string());
    }
    Ok(())
}
