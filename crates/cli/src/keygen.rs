use std::path::Path;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use idledger_core::KeyPair;

use crate::{report_error, OutputFormat};

/// Generate a party key pair and write it to files.
///
/// Writes `<prefix>.secret` (base64-encoded 32-byte seed) and
/// `<prefix>.pub` (base64-encoded 32-byte verifying key).
/// Sets .secret file permissions to 0o600 on Unix.
pub(crate) fn cmd_keygen(output_prefix: &str, output: OutputFormat) {
    let keys = KeyPair::generate();
    let public = keys.public_key();

    let secret_path = format!("{}.secret", output_prefix);
    if let Err(e) = std::fs::write(&secret_path, BASE64.encode(keys.seed())) {
        report_error(
            &format!("cannot write secret key to '{}': {}", secret_path, e),
            output,
            false,
        );
        std::process::exit(1);
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        if let Err(e) = std::fs::set_permissions(&secret_path, perms) {
            tracing::warn!(path = %secret_path, error = %e, "cannot restrict secret key permissions");
        }
    }

    let pub_path = format!("{}.pub", output_prefix);
    if let Err(e) = std::fs::write(&pub_path, public.to_base64()) {
        report_error(
            &format!("cannot write public key to '{}': {}", pub_path, e),
            output,
            false,
        );
        std::process::exit(1);
    }

    match output {
        OutputFormat::Text => println!(
            "Generated Ed25519 key pair: {}, {} (fingerprint {})",
            secret_path,
            pub_path,
            public.fingerprint()
        ),
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({
                "secret": secret_path,
                "public": pub_path,
                "fingerprint": public.fingerprint(),
            })
        ),
    }
}

/// Read a secret key file written by `keygen`.
pub(crate) fn read_secret_key(path: &Path) -> Result<KeyPair, String> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read secret key '{}': {}", path.display(), e))?;
    let bytes = BASE64
        .decode(contents.trim())
        .map_err(|e| format!("cannot decode secret key '{}': {}", path.display(), e))?;
    let seed: [u8; 32] = bytes.try_into().map_err(|_| {
        format!(
            "invalid secret key length in '{}': expected 32 bytes",
            path.display()
        )
    })?;
    Ok(KeyPair::from_seed(seed))
}
