//! `idledger simulate`: run a JSON script of operations against an
//! in-process network.

use std::path::Path;
use std::process;
use std::sync::Arc;

use idledger_core::{FlowResult, Identity, StateAndRef};
use idledger_flow::{PartyNode, Simulation};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::network::NetworkConfig;
use crate::{report_error, OutputFormat};

/// One scripted operation. `as` names the party running it.
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
enum Step {
    Create {
        #[serde(rename = "as")]
        party: String,
        identity: Identity,
    },
    Update {
        #[serde(rename = "as")]
        party: String,
        identity: Identity,
    },
    Delete {
        #[serde(rename = "as")]
        party: String,
        #[serde(rename = "idNo")]
        id_no: String,
    },
    Find {
        #[serde(rename = "as")]
        party: String,
        #[serde(rename = "idNo")]
        id_no: String,
    },
    List {
        #[serde(rename = "as")]
        party: String,
    },
    /// Cut a party off from the network, or reconnect it.
    Reachable { party: String, reachable: bool },
    /// Retry deliveries queued by `as`.
    Flush {
        #[serde(rename = "as")]
        party: String,
    },
}

pub(crate) async fn cmd_simulate(
    network_path: &Path,
    script_path: &Path,
    output: OutputFormat,
    quiet: bool,
) {
    let config = NetworkConfig::load(network_path).unwrap_or_else(|e| exit_with(&e, output, quiet));
    let steps = load_script(script_path).unwrap_or_else(|e| exit_with(&e, output, quiet));
    let base = network_path.parent().unwrap_or_else(|| Path::new("."));
    let sim = config.start(base).await.unwrap_or_else(|e| exit_with(&e, output, quiet));

    let mut reports = Vec::new();
    for (index, step) in steps.into_iter().enumerate() {
        let report = run_step(&sim, step).await.unwrap_or_else(|e| exit_with(&e, output, quiet));
        if output == OutputFormat::Text {
            println!("[{}] {}", index + 1, report.text);
        }
        reports.push(report.json);
    }
    if output == OutputFormat::Json {
        println!(
            "{}",
            serde_json::to_string_pretty(&Value::Array(reports))
                .unwrap_or_else(|e| format!("serialization error: {}", e))
        );
    }
}

fn exit_with(msg: &str, output: OutputFormat, quiet: bool) -> ! {
    report_error(msg, output, quiet);
    process::exit(1);
}

fn load_script(path: &Path) -> Result<Vec<Step>, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read '{}': {}", path.display(), e))?;
    serde_json::from_str(&text).map_err(|e| format!("invalid script '{}': {}", path.display(), e))
}

struct StepReport {
    text: String,
    json: Value,
}

fn node<'a>(sim: &'a Simulation, name: &str) -> Result<&'a Arc<PartyNode>, String> {
    sim.node(name)
        .ok_or_else(|| format!("script names unknown party '{}'", name))
}

async fn run_step(sim: &Simulation, step: Step) -> Result<StepReport, String> {
    let report = match step {
        Step::Create { party, identity } => {
            let key = identity.id_no.clone();
            let result = node(sim, &party)?.create(identity).await;
            flow_report("create", &party, &key, result)
        }
        Step::Update { party, identity } => {
            let key = identity.id_no.clone();
            let result = node(sim, &party)?.update(identity).await;
            flow_report("update", &party, &key, result)
        }
        Step::Delete { party, id_no } => {
            let result = node(sim, &party)?.delete(&id_no).await;
            flow_report("delete", &party, &id_no, result)
        }
        Step::Find { party, id_no } => {
            let found = node(sim, &party)?
                .find(&id_no)
                .await
                .map_err(|e| e.to_string())?;
            let text = match &found {
                Some(record) => format!("{} find {}: {}", party, id_no, describe(record)),
                None => format!("{} find {}: not found", party, id_no),
            };
            StepReport {
                text,
                json: json!({
                    "op": "find",
                    "as": party,
                    "idNo": id_no,
                    "record": found.map(|r| record_json(&r)),
                }),
            }
        }
        Step::List { party } => {
            let live = node(sim, &party)?
                .list_live()
                .await
                .map_err(|e| e.to_string())?;
            let mut text = format!("{} list: {} live record(s)", party, live.len());
            for record in &live {
                text.push_str(&format!("\n      {}", describe(record)));
            }
            StepReport {
                text,
                json: json!({
                    "op": "list",
                    "as": party,
                    "records": live.iter().map(record_json).collect::<Vec<_>>(),
                }),
            }
        }
        Step::Reachable { party, reachable } => {
            if !sim.set_reachable(&party, reachable).await {
                return Err(format!("script names unknown party '{}'", party));
            }
            let state = if reachable { "reachable" } else { "unreachable" };
            StepReport {
                text: format!("{} is now {}", party, state),
                json: json!({ "op": "reachable", "party": party, "reachable": reachable }),
            }
        }
        Step::Flush { party } => {
            let delivered = node(sim, &party)?.flush_pending().await;
            StepReport {
                text: format!("{} flush: {} delivered", party, delivered),
                json: json!({ "op": "flush", "as": party, "delivered": delivered }),
            }
        }
    };
    Ok(report)
}

fn flow_report(op: &str, party: &str, key: &str, result: FlowResult) -> StepReport {
    StepReport {
        text: format!("{} {} {}: {}", party, op, key, result),
        json: json!({
            "op": op,
            "as": party,
            "idNo": key,
            "outcome": result,
        }),
    }
}

fn describe(record: &StateAndRef) -> String {
    let mut names = record.state.stakeholders.names();
    names.sort_unstable();
    format!(
        "{} {} (stakeholders: {})",
        record.state.identity.id_no,
        record.state.identity.name,
        names.join(", ")
    )
}

fn record_json(record: &StateAndRef) -> Value {
    json!({
        "linearId": record.state.linear_id,
        "stateRef": record.state_ref.to_string(),
        "identity": record.state.identity,
        "stakeholders": record.state.stakeholders.names(),
    })
}
