mod attach;
mod keygen;
mod network;
mod simulate;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Identity ledger tooling.
#[derive(Parser)]
#[command(name = "idledger", version, about = "Identity ledger tooling")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an Ed25519 party key pair
    Keygen {
        /// Output path prefix; writes <prefix>.secret and <prefix>.pub
        #[arg(long, default_value = "party")]
        prefix: String,
    },

    /// Import a file into a content-addressed attachment directory
    Attach {
        /// File to import
        file: PathBuf,
        /// Attachment directory
        #[arg(long, default_value = "attachments")]
        dir: PathBuf,
    },

    /// Run a script of operations against an in-process network
    Simulate {
        /// Network description (TOML)
        #[arg(long)]
        network: PathBuf,
        /// Operations to run (JSON array)
        #[arg(long)]
        script: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.quiet);

    match cli.command {
        Commands::Keygen { prefix } => {
            keygen::cmd_keygen(&prefix, cli.output);
        }
        Commands::Attach { file, dir } => {
            let rt = runtime(cli.output, cli.quiet);
            rt.block_on(attach::cmd_attach(&file, &dir, cli.output, cli.quiet));
        }
        Commands::Simulate { network, script } => {
            let rt = runtime(cli.output, cli.quiet);
            rt.block_on(simulate::cmd_simulate(&network, &script, cli.output, cli.quiet));
        }
    }
}

/// Logs go to stderr, filtered by `IDLEDGER_LOG` (default `info`).
fn init_tracing(quiet: bool) {
    let default = if quiet { "error" } else { "info" };
    let filter = EnvFilter::try_from_env("IDLEDGER_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn runtime(output: OutputFormat, quiet: bool) -> tokio::runtime::Runtime {
    match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            report_error(&format!("failed to start runtime: {}", e), output, quiet);
            process::exit(1);
        }
    }
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("error: {}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
