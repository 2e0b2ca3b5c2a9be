//! Keygen command implementation.

use crate::bail;
use crate::cli::RuntimeConfig;
use crate::error::Result;
use crate::sign::ApkSigner;
use std::path::Path;

/// Execute keygen command
pub(super) fn execute_keygen(out: &Path, force: bool, config: &RuntimeConfig) -> Result<()> {
    if out.exists() && !force {
        bail!(
            "{} already exists, pass --force to replace it",
            out.display()
        );
    }

    let signer = ApkSigner::create_key_file(out)?;
    config.success_println(&format!("Wrote signing key {}", out.display()));
    config.indent(&format!("fingerprint: {}", signer.fingerprint()));
    config.warning_println("Keep this file private; packages signed with another key cannot update it");
    Ok(())
}
