//! Verify command implementation.

use crate::cli::RuntimeConfig;
use crate::error::Result;
use crate::sign::verify_apk;
use std::path::Path;

/// Execute verify command
pub(super) fn execute_verify(apk: &Path, config: &RuntimeConfig) -> Result<()> {
    config.verbose_println(&format!("Checking {}", apk.display()));
    let verified = verify_apk(apk)?;
    config.success_println(&format!(
        "{} is signed ({} entries)",
        apk.display(),
        verified.entries
    ));
    config.indent(&format!("fingerprint: {}", verified.certificate_fingerprint));
    Ok(())
}
