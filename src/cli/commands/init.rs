//! Init command implementation.

use crate::cli::RuntimeConfig;
use crate::config::validate_package_name;
use crate::error::Result;
use crate::project::ProjectDescriptor;
use std::path::Path;

/// Execute init command
pub(super) fn execute_init(
    dir: &Path,
    name: &str,
    package_name: &str,
    config: &RuntimeConfig,
) -> Result<()> {
    validate_package_name(package_name)?;
    let descriptor = ProjectDescriptor::scaffold(dir, name, package_name)?;

    config.success_println(&format!("Project ready in {}", dir.display()));
    config.indent(&format!("name:    {}", descriptor.name));
    config.indent(&format!("package: {}", descriptor.package_name));
    config.indent(&format!(
        "entry:   {}",
        dir.join(&descriptor.main_script_file).display()
    ));
    Ok(())
}
