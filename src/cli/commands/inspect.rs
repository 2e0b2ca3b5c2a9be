//! Inspect command implementation.
//!
//! Decrypts a script pulled out of a built package, using the key material
//! its project descriptor yields.

use crate::cli::RuntimeConfig;
use crate::crypto::ScriptKey;
use crate::error::{ErrorExt, Result};
use crate::project::ProjectDescriptor;
use crate::script::decrypt_script;
use std::path::Path;

/// Execute inspect command
pub(super) fn execute_inspect(
    file: &Path,
    project: &Path,
    build_id: Option<&str>,
    config: &RuntimeConfig,
) -> Result<()> {
    let mut descriptor = ProjectDescriptor::load(project)?;
    if let Some(id) = build_id {
        descriptor.build_info.build_id = id.to_string();
    }
    config.verbose_println(&format!(
        "Using build {} of {}",
        descriptor.build_info.build_id, descriptor.package_name
    ));

    let key = ScriptKey::for_descriptor(&descriptor);
    let sealed = std::fs::read(file).fs_context("reading encrypted script", file)?;
    let (mode, plain) = decrypt_script(&sealed, &key)?;

    let _ = config.output().field("mode", &mode.to_string());
    let _ = config.output().field("bytes", &plain.len().to_string());
    config.println("");
    // Plaintext goes to stdout even in quiet mode so it can be piped.
    print!("{}", String::from_utf8_lossy(&plain));
    Ok(())
}
