use std::future::Future;
use std::sync::Arc;

use super::{apply, produced, Fixture, TestResult};
use crate::record::CommitOutcome;
use crate::LedgerStore;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "concurrent",
            "racing_spends_exactly_one_wins",
            racing_spends_exactly_one_wins(factory).await,
        ),
        TestResult::from_result(
            "concurrent",
            "racing_redeliveries_apply_once",
            racing_redeliveries_apply_once(factory).await,
        ),
    ]
}

async fn racing_spends_exactly_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = Arc::new(factory().await);
    let fx = Fixture::new();
    let create = fx.create("X1", "Ann")?;
    let v1 = produced(&create)?;
    apply(store.as_ref(), create).await?;

    let mut handles = Vec::new();
    for name in ["Anne", "Annie", "Anna", "Ana"] {
        let commit = fx.update(&v1, name)?;
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move { store.apply_commit(commit).await }));
    }
    let mut applied = 0;
    for handle in handles {
        if let Ok(CommitOutcome::Applied) = handle.await.map_err(|e| e.to_string())? {
            applied += 1;
        }
    }
    if applied != 1 {
        return Err(format!("expected exactly 1 spend to win, {applied} did"));
    }
    let all = store.list_live().await.map_err(|e| e.to_string())?;
    if all.len() != 1 {
        return Err(format!("expected 1 live version, got {}", all.len()));
    }
    Ok(())
}

async fn racing_redeliveries_apply_once<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = Arc::new(factory().await);
    let fx = Fixture::new();
    let commit = fx.create("X1", "Ann")?;

    let mut handles = Vec::new();
    for _ in 0..4 {
        let commit = commit.clone();
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move { store.apply_commit(commit).await }));
    }
    let mut applied = 0;
    for handle in handles {
        match handle.await.map_err(|e| e.to_string())? {
            Ok(CommitOutcome::Applied) => applied += 1,
            Ok(CommitOutcome::AlreadyApplied) => {}
            Err(e) => return Err(format!("redelivery failed: {e}")),
        }
    }
    if applied != 1 {
        return Err(format!("expected 1 Applied outcome, got {applied}"));
    }
    Ok(())
}
