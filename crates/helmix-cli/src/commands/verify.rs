//! Verify command - decrypt and check the signature of a values file

use console::style;
use helmix_core::{
    CoreError, Envelope, GpgKeyring, SignaturePolicy, SignatureStatus, Values, is_valid_trusted_key,
};
use std::path::{Path, PathBuf};

use crate::error::{CliError, Result};

pub fn run(
    file: &Path,
    gpg_homedir: Option<PathBuf>,
    trusted_keys: &[String],
    require_signature: bool,
) -> Result<()> {
    if let Some(key) = trusted_keys.iter().find(|k| !is_valid_trusted_key(k)) {
        return Err(CliError::validation_with_help(
            format!("Invalid --trusted-key '{}'", key),
            "Pass a full fingerprint (40 hex digits) or a long key id (16 hex digits)",
        ));
    }

    if !file.is_file() {
        return Err(CliError::load(format!("Values file not found: {}", file.display())));
    }

    println!("{} {}", style("Verifying").cyan().bold(), file.display());
    println!();

    let keyring = GpgKeyring::new().with_homedir(gpg_homedir);
    let envelope = Envelope::new(
        &keyring,
        SignaturePolicy {
            require_signatures: require_signature,
            trusted_keys: trusted_keys.to_vec(),
        },
    );

    let opened = match envelope.open(file) {
        Ok(opened) => opened,
        Err(source) => {
            println!("  {} {}", style("[FAIL]").red().bold(), source);
            return Err(CliError::from(CoreError::Envelope {
                path: file.display().to_string(),
                source,
            }));
        }
    };

    if opened.decrypted {
        println!("  {} Decrypted", style("[OK]").green().bold());
    }

    match &opened.signature {
        SignatureStatus::Good {
            fingerprint,
            signer,
        } => {
            println!("  {} Good signature", style("[OK]").green().bold());
            println!("  {}: {}", style("Signed by").dim(), signer);
            println!("  {}: {}", style("Fingerprint").dim(), fingerprint);
        }
        SignatureStatus::Unsigned => {
            println!("  {} No signature", style("[SKIP]").yellow().bold());
        }
    }

    // The plaintext itself is never printed
    let values = Values::from_yaml(&opened.content).map_err(|e| {
        CliError::load(format!("{} is not a valid values file: {}", file.display(), e))
    })?;
    println!(
        "  {} Valid values file ({} top-level keys)",
        style("[OK]").green().bold(),
        values.keys().len()
    );

    println!();
    println!("{}", style("Values file verified.").green().bold());
    Ok(())
}
