//! Conformance test suite for `LedgerStore` implementations.
//!
//! Any backend can run this suite to check it honours the commit contract.
//! The suite covers:
//!
//! - **Commit**: produced versions become live, consumed versions stop being live
//! - **Idempotence**: re-applying a recorded transaction is a no-op
//! - **Atomicity**: a rejected commit leaves the store unchanged
//! - **Concurrency**: racing commits never double-consume an input
//! - **Queries**: lookups by business key and live listing
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory that creates
//! a fresh, empty store for each test:
//!
//! ```ignore
//! use idledger_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn sqlite_conformance() {
//!     let report = run_conformance_suite(|| async { open_test_store().await }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod atomic;
mod commit;
mod concurrent;
mod idempotent;
mod query;

use std::fmt;
use std::future::Future;

use idledger_core::{
    Command, Identity, KeyPair, PartyIdentity, RecordState, SignedTransaction, StateAndRef,
    Stakeholders, TimeWindow, TransactionBuilder,
};
use time::macros::{date, datetime};
use time::Duration;

use crate::record::CommitRecord;
use crate::LedgerStore;

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "commit", "atomic").
    pub category: String,
    /// Test name (e.g. "update_replaces_live_version").
    pub name: String,
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        let (passed, message) = match result {
            Ok(()) => (true, None),
            Err(msg) => (false, Some(msg)),
        };
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed,
            message,
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in self.results.iter().filter(|r| !r.passed) {
            writeln!(
                f,
                "  FAIL [{}/{}]: {}",
                r.category,
                r.name,
                r.message.as_deref().unwrap_or("(no message)")
            )?;
        }
        Ok(())
    }
}

/// Run the full conformance suite against a ledger store.
///
/// `factory` is called once per test so every test starts from an empty store.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(commit::run_commit_tests(&factory).await);
    results.extend(idempotent::run_idempotent_tests(&factory).await);
    results.extend(atomic::run_atomic_tests(&factory).await);
    results.extend(concurrent::run_concurrent_tests(&factory).await);
    results.extend(query::run_query_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Fixtures ────────────────────────────────────────────────────────────────

struct Fixture {
    owner: KeyPair,
    owner_party: PartyIdentity,
    notary: PartyIdentity,
}

impl Fixture {
    fn new() -> Self {
        let owner = KeyPair::from_seed([7; 32]);
        let owner_party = PartyIdentity::new("PartyA", owner.public_key());
        let notary = PartyIdentity::new("Notary", KeyPair::from_seed([9; 32]).public_key());
        Self {
            owner,
            owner_party,
            notary,
        }
    }

    fn identity(&self, id_no: &str, name: &str) -> Identity {
        Identity {
            id_no: id_no.to_string(),
            name: name.to_string(),
            dob: date!(1990 - 04 - 12),
            address: "1 Main St".to_string(),
            phone_no: "555-0100".to_string(),
            email: format!("{}@example.com", id_no.to_lowercase()),
            passport_no: format!("P-{}", id_no),
            stakeholders: Vec::new(),
            documents: None,
        }
    }

    fn stakeholders(&self) -> Stakeholders {
        Stakeholders::builder().with(self.owner_party.clone()).build()
    }

    fn sign(&self, builder: TransactionBuilder) -> Result<CommitRecord, String> {
        let tx = builder
            .signer(self.owner.public_key())
            .time_window(TimeWindow::starting_at(
                datetime!(2025-01-01 0:00 UTC),
                Duration::seconds(30),
            ))
            .build()
            .map_err(|e| e.to_string())?;
        let stx = SignedTransaction::new(&tx)
            .and_then(|stx| stx.sign(&self.owner))
            .map_err(|e| e.to_string())?;
        Ok(CommitRecord::for_party(stx, &tx, &self.owner.public_key()))
    }

    /// Commit creating `id_no`; `name` varies the content.
    fn create(&self, id_no: &str, name: &str) -> Result<CommitRecord, String> {
        let output = RecordState::new(self.identity(id_no, name), self.stakeholders());
        self.sign(TransactionBuilder::new(Command::Create, self.notary.clone()).output(output))
    }

    fn update(&self, input: &StateAndRef, name: &str) -> Result<CommitRecord, String> {
        let mut identity = input.state.identity.clone();
        identity.name = name.to_string();
        let output = RecordState::new(identity, input.state.stakeholders.clone());
        self.sign(
            TransactionBuilder::new(Command::Update, input.notary.clone())
                .input(input.clone())
                .output(output),
        )
    }

    fn delete(&self, input: &StateAndRef) -> Result<CommitRecord, String> {
        self.sign(TransactionBuilder::new(Command::Delete, input.notary.clone()).input(input.clone()))
    }
}

/// The single version a commit produced.
fn produced(commit: &CommitRecord) -> Result<StateAndRef, String> {
    commit
        .produced
        .first()
        .cloned()
        .ok_or_else(|| "fixture commit produced nothing".to_string())
}

/// Apply a commit that is expected to succeed.
async fn apply<S: LedgerStore>(store: &S, commit: CommitRecord) -> Result<(), String> {
    store
        .apply_commit(commit)
        .await
        .map(|_| ())
        .map_err(|e| format!("apply_commit failed: {e}"))
}
