use std::future::Future;

use super::{apply, produced, Fixture, TestResult};
use crate::LedgerStore;

pub(super) async fn run_query_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "query",
            "find_by_business_key",
            find_by_business_key(factory).await,
        ),
        TestResult::from_result(
            "query",
            "unknown_key_is_none",
            unknown_key_is_none(factory).await,
        ),
        TestResult::from_result(
            "query",
            "list_live_ordered_by_linear_id",
            list_live_ordered_by_linear_id(factory).await,
        ),
        TestResult::from_result(
            "query",
            "live_version_not_consumed",
            live_version_not_consumed(factory).await,
        ),
    ]
}

async fn find_by_business_key<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let fx = Fixture::new();
    apply(&store, fx.create("X1", "Ann")?).await?;
    apply(&store, fx.create("X2", "Bob")?).await?;

    let found = store
        .find_by_business_key("X2")
        .await
        .map_err(|e| e.to_string())?
        .ok_or("X2 not found")?;
    if found.state.identity.name != "Bob" {
        return Err(format!("expected Bob, got {}", found.state.identity.name));
    }
    Ok(())
}

async fn unknown_key_is_none<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let found = store
        .find_by_business_key("missing")
        .await
        .map_err(|e| e.to_string())?;
    if found.is_some() {
        return Err(format!("expected None, got {found:?}"));
    }
    Ok(())
}

async fn list_live_ordered_by_linear_id<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let fx = Fixture::new();
    for id_no in ["X3", "X1", "X2"] {
        apply(&store, fx.create(id_no, "Ann")?).await?;
    }
    let all = store.list_live().await.map_err(|e| e.to_string())?;
    let ids: Vec<_> = all.iter().map(|v| v.state.linear_id.clone()).collect();
    let mut sorted = ids.clone();
    sorted.sort();
    if ids.len() != 3 || ids != sorted {
        return Err(format!("live listing not ordered by linear id: {ids:?}"));
    }
    Ok(())
}

async fn live_version_not_consumed<S, F, Fut>(factory: &F) -> Result<(), String>
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
    let consumed = store
        .is_consumed(&v1.state_ref)
        .await
        .map_err(|e| e.to_string())?;
    if consumed {
        return Err("freshly created version reported consumed".to_string());
    }
    Ok(())
}
