//! Command execution.
//!
//! Each subcommand lives in its own module and returns `Result<()>`; this
//! module turns that into an exit code and prints failures with recovery hints.

mod build;
mod init;
mod inspect;
mod keygen;
mod verify;

use crate::cli::{Args, Command, RuntimeConfig};
use crate::error::Result;

use build::execute_build;
use init::execute_init;
use inspect::execute_inspect;
use keygen::execute_keygen;
use verify::execute_verify;

/// Execute the main command based on parsed arguments
pub async fn execute_command(args: Args) -> Result<i32> {
    if let Err(validation_error) = args.validate() {
        // Create output for validation errors (never quiet)
        let output = super::OutputManager::new(false, false);
        output.error(&format!("Invalid arguments: {}", validation_error));
        return Ok(1);
    }

    let config = RuntimeConfig::from(&args);

    let result = match &args.command {
        Command::Build(build) => execute_build(build, &config).await,
        Command::Init {
            dir,
            name,
            package_name,
        } => execute_init(dir, name, package_name, &config),
        Command::Keygen { out, force } => execute_keygen(out, *force, &config),
        Command::Verify { apk } => execute_verify(apk, &config),
        Command::Inspect {
            file,
            project,
            build_id,
        } => execute_inspect(file, project, build_id.as_deref(), &config),
    };

    match result {
        Ok(()) => Ok(0),
        Err(e) => {
            config.error_println(&format!(
                "Command '{}' failed: {}",
                args.command.name(),
                e
            ));

            let suggestions = e.recovery_suggestions();
            if !suggestions.is_empty() && !config.is_quiet() {
                config.println("\n💡 Recovery suggestions:");
                for suggestion in suggestions {
                    config.println(&format!("  • {}", suggestion));
                }
            }

            Ok(1)
        }
    }
}
