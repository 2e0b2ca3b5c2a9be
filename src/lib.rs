//! # scriptapk
//!
//! Package script projects into signed Android application packages.
//!
//! A prebuilt runtime package serves as a template. Building a project clones
//! the template into a scratch workspace, injects the project's scripts
//! (encrypted with a per-build key) under `assets/project`, rewrites the
//! package identity in the binary manifest and resource table, then archives
//! and signs the result.
//!
//! ## Features
//!
//! - **Typestate pipeline**: [`BuildPipeline`] stages cannot be skipped or reordered
//! - **Binary resource patching**: AXML manifest and `resources.arsc` codecs
//! - **Script encryption**: AES-256-CBC keyed from the project descriptor
//! - **Deterministic signing**: sorted entries, fixed timestamps, PKCS#7 signature block
//!
//! ## Usage
//!
//! ```bash
//! scriptapk init my-tool --name Tool --package-name com.acme.tool
//! scriptapk keygen release.pk8
//! scriptapk build my-tool --template runtime.apk --key release.pk8
//! scriptapk verify my-tool/build/Tool_v1.0.0.apk
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// Core modules
pub mod apk;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod error;
pub mod pipeline;
pub mod project;
pub mod script;
pub mod sign;
pub mod workspace;

// Re-export main types for public API
pub use cli::Args;
pub use config::{AppConfig, AppConfigBuilder, IconSource};
pub use crypto::ScriptKey;
pub use error::{Error, Result, ValidationError};
pub use pipeline::{
    BuildOutcome, BuildPipeline, ChannelProgress, PipelineState, ProgressCallback, ProgressEvent,
    Stage,
};
pub use project::{BuildInfo, ProjectDescriptor};
pub use script::{ExecutionMode, decrypt_script, encrypt_script};
pub use sign::{ApkSigner, PackageSigner, VerifiedApk, verify_apk};
