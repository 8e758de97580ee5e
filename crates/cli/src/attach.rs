use std::path::Path;
use std::process;

use idledger_storage::{AttachmentStore, AttachmentStored, FsAttachmentStore};

use crate::{report_error, OutputFormat};

pub(crate) async fn cmd_attach(file: &Path, dir: &Path, output: OutputFormat, quiet: bool) {
    let bytes = match tokio::fs::read(file).await {
        Ok(b) => b,
        Err(e) => {
            report_error(
                &format!("cannot read '{}': {}", file.display(), e),
                output,
                quiet,
            );
            process::exit(1);
        }
    };
    let store = match FsAttachmentStore::open(dir).await {
        Ok(s) => s,
        Err(e) => {
            report_error(&e.to_string(), output, quiet);
            process::exit(1);
        }
    };
    let stored = match store.store(bytes).await {
        Ok(s) => s,
        Err(e) => {
            report_error(&e.to_string(), output, quiet);
            process::exit(1);
        }
    };

    let existed = matches!(stored, AttachmentStored::Existing(_));
    match output {
        OutputFormat::Text => {
            println!("{}", stored.hash());
            if existed && !quiet {
                eprintln!("note: attachment already present in {}", dir.display());
            }
        }
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({
                "hash": stored.hash().to_hex(),
                "existing": existed,
            })
        ),
    }
}
