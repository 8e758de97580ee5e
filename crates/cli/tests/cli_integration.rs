//! CLI integration tests for every subcommand.
//!
//! Uses `assert_cmd` to spawn the `idledger` binary and verify exit codes,
//! stdout content, and stderr content. Every test works in its own
//! temporary directory.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use ed25519_dalek::SigningKey;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn idledger(dir: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("idledger");
    cmd.current_dir(dir);
    cmd.env("IDLEDGER_LOG", "error");
    cmd
}

const TWO_PARTIES: &str = r#"
notary = "Notary"

[[parties]]
name = "PartyA"

[[parties]]
name = "BankA"
"#;

const ALICE: &str = r#"{"idNo":"X1","name":"Alice","dob":"2000-01-01","email":"a@x.com","passportNo":"P1","stakeholders":["BankA"]}"#;

fn write_case(dir: &Path, network: &str, script: &str) {
    fs::write(dir.join("network.toml"), network).unwrap();
    fs::write(dir.join("ops.json"), script).unwrap();
}

// ──────────────────────────────────────────────
// 1. Help and version
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    let dir = TempDir::new().unwrap();
    idledger(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Identity ledger tooling"));
}

#[test]
fn version_exits_0() {
    let dir = TempDir::new().unwrap();
    idledger(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("idledger"));
}

// ──────────────────────────────────────────────
// 2. keygen
// ──────────────────────────────────────────────

#[test]
fn keygen_writes_matching_key_files() {
    let dir = TempDir::new().unwrap();
    idledger(dir.path())
        .args(["keygen", "--prefix", "bank"])
        .assert()
        .success()
        .stdout(predicate::str::contains("bank.secret"));

    let secret = BASE64
        .decode(fs::read_to_string(dir.path().join("bank.secret")).unwrap().trim())
        .unwrap();
    let public = BASE64
        .decode(fs::read_to_string(dir.path().join("bank.pub")).unwrap().trim())
        .unwrap();
    let seed: [u8; 32] = secret.try_into().unwrap();
    let signing = SigningKey::from_bytes(&seed);
    assert_eq!(signing.verifying_key().to_bytes().to_vec(), public);
}

#[test]
fn keygen_json_reports_fingerprint() {
    let dir = TempDir::new().unwrap();
    let out = idledger(dir.path())
        .args(["--output", "json", "keygen", "--prefix", "party"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let v: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(v["secret"], "party.secret");
    assert_eq!(v["fingerprint"].as_str().unwrap().len(), 16);
}

// ──────────────────────────────────────────────
// 3. attach
// ──────────────────────────────────────────────

#[test]
fn attach_prints_content_hash() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("scan.pdf"), b"passport scan").unwrap();

    let out = idledger(dir.path())
        .args(["attach", "scan.pdf", "--dir", "blobs"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let hash = String::from_utf8(out).unwrap().trim().to_string();
    assert_eq!(hash.len(), 64);
    assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(
        fs::read(dir.path().join("blobs").join(&hash)).unwrap(),
        b"passport scan"
    );
}

#[test]
fn attach_twice_reports_existing() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("scan.pdf"), b"passport scan").unwrap();
    idledger(dir.path())
        .args(["attach", "scan.pdf", "--dir", "blobs"])
        .assert()
        .success();

    let out = idledger(dir.path())
        .args(["--output", "json", "attach", "scan.pdf", "--dir", "blobs"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let v: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(v["existing"], true);

    idledger(dir.path())
        .args(["attach", "scan.pdf", "--dir", "blobs"])
        .assert()
        .success()
        .stderr(predicate::str::contains("already present"));
}

#[test]
fn attach_missing_file_exits_1() {
    let dir = TempDir::new().unwrap();
    idledger(dir.path())
        .args(["attach", "nope.pdf"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error: cannot read 'nope.pdf'"));
}

// ──────────────────────────────────────────────
// 4. simulate
// ──────────────────────────────────────────────

#[test]
fn simulate_create_find_and_duplicate() {
    let dir = TempDir::new().unwrap();
    let script = format!(
        r#"[
  {{"op":"create","as":"PartyA","identity":{ALICE}}},
  {{"op":"find","as":"BankA","idNo":"X1"}},
  {{"op":"create","as":"PartyA","identity":{ALICE}}}
]"#
    );
    write_case(dir.path(), TWO_PARTIES, &script);

    idledger(dir.path())
        .args(["simulate", "--network", "network.toml", "--script", "ops.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[1] PartyA create X1: Success(Transaction id"))
        .stdout(predicate::str::contains(
            "[2] BankA find X1: X1 Alice (stakeholders: BankA, PartyA)",
        ))
        .stdout(predicate::str::contains(
            "[3] PartyA create X1: Failure(DuplicateKeyError",
        ));
}

#[test]
fn simulate_rejecting_bank_blocks_delete() {
    let dir = TempDir::new().unwrap();
    let network = r#"
[[parties]]
name = "PartyA"

[[parties]]
name = "BankA"
policy = "reject"
"#;
    let script = format!(
        r#"[
  {{"op":"create","as":"PartyA","identity":{ALICE}}},
  {{"op":"delete","as":"PartyA","idNo":"X1"}},
  {{"op":"list","as":"PartyA"}}
]"#
    );
    write_case(dir.path(), network, &script);

    idledger(dir.path())
        .args(["simulate", "--network", "network.toml", "--script", "ops.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Failure(SignatureRejected"))
        .stdout(predicate::str::contains("PartyA list: 1 live record(s)"));
}

#[test]
fn simulate_redelivers_after_reconnect() {
    let dir = TempDir::new().unwrap();
    let network = r#"
[[parties]]
name = "PartyA"

[[parties]]
name = "BankA"
reachable = false
"#;
    let script = format!(
        r#"[
  {{"op":"create","as":"PartyA","identity":{ALICE}}},
  {{"op":"find","as":"BankA","idNo":"X1"}},
  {{"op":"reachable","party":"BankA","reachable":true}},
  {{"op":"flush","as":"PartyA"}},
  {{"op":"find","as":"BankA","idNo":"X1"}}
]"#
    );
    write_case(dir.path(), network, &script);

    idledger(dir.path())
        .args(["simulate", "--network", "network.toml", "--script", "ops.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[2] BankA find X1: not found"))
        .stdout(predicate::str::contains("[4] PartyA flush: 1 delivered"))
        .stdout(predicate::str::contains("[5] BankA find X1: X1 Alice"));
}

#[test]
fn simulate_json_output_is_array_of_steps() {
    let dir = TempDir::new().unwrap();
    let script = format!(
        r#"[
  {{"op":"create","as":"PartyA","identity":{ALICE}}},
  {{"op":"find","as":"PartyA","idNo":"X1"}}
]"#
    );
    write_case(dir.path(), TWO_PARTIES, &script);

    let out = idledger(dir.path())
        .args([
            "--output", "json", "simulate", "--network", "network.toml", "--script", "ops.json",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let v: serde_json::Value = serde_json::from_slice(&out).unwrap();
    let steps = v.as_array().unwrap();
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0]["outcome"]["result"], "success");
    assert_eq!(steps[1]["record"]["identity"]["name"], "Alice");
}

#[test]
fn simulate_with_key_file_uses_that_identity() {
    let dir = TempDir::new().unwrap();
    idledger(dir.path())
        .args(["keygen", "--prefix", "party-a"])
        .assert()
        .success();
    let network = r#"
[[parties]]
name = "PartyA"
key = "party-a.secret"
"#;
    write_case(
        dir.path(),
        network,
        r#"[{"op":"create","as":"PartyA","identity":{"idNo":"X1","name":"Alice","dob":"2000-01-01","email":"a@x.com","passportNo":"P1"}}]"#,
    );

    idledger(dir.path())
        .args(["simulate", "--network", "network.toml", "--script", "ops.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Success("));
}

#[test]
fn simulate_unknown_party_exits_1() {
    let dir = TempDir::new().unwrap();
    write_case(
        dir.path(),
        TWO_PARTIES,
        r#"[{"op":"list","as":"Mallory"}]"#,
    );
    idledger(dir.path())
        .args(["simulate", "--network", "network.toml", "--script", "ops.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown party 'Mallory'"));
}

#[test]
fn simulate_missing_network_exits_1() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("ops.json"), "[]").unwrap();
    idledger(dir.path())
        .args(["simulate", "--network", "absent.toml", "--script", "ops.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot read 'absent.toml'"));
}
