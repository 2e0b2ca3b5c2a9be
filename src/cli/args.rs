//! Command line argument parsing and validation.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Build signed application packages from script projects
#[derive(Parser, Debug)]
#[command(
    name = "scriptapk",
    version,
    about = "Build signed application packages from script projects",
    long_about = "Package a script project into a signed application by cloning a template package,
injecting encrypted scripts and rewriting the package identity.

Usage:
  scriptapk init my-tool --name Tool --package-name com.acme.tool
  scriptapk build my-tool --template runtime.apk
  scriptapk build hello.js --template runtime.apk --app-name Hello --package-name com.acme.hello
  scriptapk verify my-tool/build/Tool_v1.0.0.apk"
)]
pub struct Args {
    /// Show per-file detail
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Command to run
    #[command(subcommand)]
    pub command: Command,
}

/// Arguments of `scriptapk build`.
#[derive(clap::Args, Debug, Clone)]
pub struct BuildArgs {
    /// Project directory (with project.json) or a single script file
    #[arg(value_name = "SOURCE")]
    pub source: PathBuf,

    /// Template package to clone
    #[arg(short, long, env = "SCRIPTAPK_TEMPLATE", value_name = "APK")]
    pub template: PathBuf,

    /// Output package [default: <project>/<buildDir>/<name>_v<version>.apk]
    #[arg(short, long, value_name = "APK")]
    pub output: Option<PathBuf>,

    /// Scratch directory [default: <cache dir>/scriptapk/build-<uuid>]
    #[arg(long, value_name = "DIR")]
    pub workspace: Option<PathBuf>,

    /// Application label
    #[arg(long)]
    pub app_name: Option<String>,

    /// Package identifier, e.g. com.acme.tool
    #[arg(long)]
    pub package_name: Option<String>,

    /// Human readable version
    #[arg(long)]
    pub version_name: Option<String>,

    /// Integer version
    #[arg(long)]
    pub version_code: Option<u32>,

    /// Launcher icon image
    #[arg(long, value_name = "IMAGE")]
    pub icon: Option<PathBuf>,

    /// Directory to leave out of the package (repeatable)
    #[arg(long = "ignore", value_name = "DIR")]
    pub ignore: Vec<PathBuf>,

    /// Signing key file from `keygen` or a PKCS#8 key [default: ephemeral key]
    #[arg(short, long, env = "SCRIPTAPK_SIGNING_KEY", value_name = "KEY")]
    pub key: Option<PathBuf>,

    /// Leave the workspace on disk for inspection
    #[arg(long)]
    pub keep_workspace: bool,
}

/// Subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Build a signed package
    Build(BuildArgs),

    /// Scaffold a new project
    Init {
        /// Project directory
        #[arg(value_name = "DIR")]
        dir: PathBuf,

        /// Project name
        #[arg(long)]
        name: String,

        /// Package identifier
        #[arg(long)]
        package_name: String,
    },

    /// Generate a signing key
    Keygen {
        /// Where to write the key and certificate (PEM)
        #[arg(value_name = "OUT")]
        out: PathBuf,

        /// Overwrite an existing key
        #[arg(long)]
        force: bool,
    },

    /// Verify a package signature
    Verify {
        /// Package to check
        #[arg(value_name = "APK")]
        apk: PathBuf,
    },

    /// Decrypt an encrypted script
    Inspect {
        /// Encrypted script
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Directory holding the project.json the script was built with
        #[arg(long, value_name = "DIR")]
        project: PathBuf,

        /// Build id [default: the descriptor's last build]
        #[arg(long)]
        build_id: Option<String>,
    },
}

impl Command {
    /// Subcommand name for messages.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Build(_) => "build",
            Command::Init { .. } => "init",
            Command::Keygen { .. } => "keygen",
            Command::Verify { .. } => "verify",
            Command::Inspect { .. } => "inspect",
        }
    }
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate arguments for consistency
    pub fn validate(&self) -> Result<(), String> {
        if let Command::Build(build) = &self.command {
            if build.source.as_os_str().is_empty() {
                return Err("Source path is required".to_string());
            }
            if let Some(output) = &build.output
                && output.extension().is_none_or(|e| e != "apk")
            {
                return Err(format!(
                    "Output {} must have an .apk extension",
                    output.display()
                ));
            }
            if let (Some(output), Some(workspace)) = (&build.output, &build.workspace)
                && output.starts_with(workspace)
            {
                return Err("Output must not be inside the workspace".to_string());
            }
        }
        Ok(())
    }
}

/// Configuration derived from command line arguments
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    output: super::OutputManager,
}

impl RuntimeConfig {
    /// Create runtime configuration
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self {
            output: super::OutputManager::new(verbose, quiet),
        }
    }

    /// Get a reference to the output manager
    pub fn output(&self) -> &super::OutputManager {
        &self.output
    }

    /// Print message
    pub fn println(&self, message: &str) {
        let _ = self.output.println(message);
    }

    /// Print verbose message
    pub fn verbose_println(&self, message: &str) {
        let _ = self.output.verbose(message);
    }

    /// Print error message (always shown)
    pub fn error_println(&self, message: &str) {
        self.output.error(message);
    }

    /// Print warning message
    pub fn warning_println(&self, message: &str) {
        let _ = self.output.warn(message);
    }

    /// Print success message
    pub fn success_println(&self, message: &str) {
        let _ = self.output.success(message);
    }

    /// Print indented text
    pub fn indent(&self, message: &str) {
        let _ = self.output.indent(message);
    }

    /// Check if quiet mode is enabled
    pub fn is_quiet(&self) -> bool {
        self.output.is_quiet()
    }

    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.output.is_verbose()
    }
}

impl From<&Args> for RuntimeConfig {
    fn from(args: &Args) -> Self {
        Self::new(args.verbose, args.quiet)
    }
}
