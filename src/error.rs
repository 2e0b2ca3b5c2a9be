//! Error types for APK build operations.
//!
//! Every failure in the build pipeline lands in [`Error`]. Errors raised while a
//! pipeline stage runs are wrapped in [`Error::Stage`] so callers can report
//! where the build stopped.
//!
//! # Features
//!
//! - **Context trait**: Add context to errors similar to anyhow
//! - **ErrorExt trait**: Filesystem operations with automatic path context
//! - **bail! macro**: Early return with formatted error messages
//!
//! # Example
//!
//! ```no_run
//! use scriptapk::error::{ErrorExt, Result};
//! use std::path::Path;
//!
//! fn read_template(path: &Path) -> Result<Vec<u8>> {
//!     std::fs::read(path).fs_context("reading template package", path)
//! }
//! ```

use std::{fmt::Display, io, path::PathBuf};
use thiserror::Error as DeriveError;

use crate::pipeline::Stage;

/// Convenient type alias for Result.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the build pipeline.
#[derive(Debug, DeriveError)]
#[non_exhaustive]
pub enum Error {
    /// Error raised while a pipeline stage was running.
    #[error("{stage} stage failed: {source}")]
    Stage {
        /// Stage that was running
        stage: Stage,
        /// Underlying failure
        #[source]
        source: Box<Self>,
    },

    /// Error with context. Created by the [`Context`] trait.
    #[error("{0}: {1}")]
    Context(String, Box<Self>),

    /// Rejected input, raised before any workspace I/O happens.
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),

    /// File system error with path context.
    #[error("{context} {path}: {error}")]
    Fs {
        /// Context describing the operation (e.g., "reading project descriptor")
        context: &'static str,
        /// Path that was being accessed
        path: PathBuf,
        /// The underlying I/O error
        error: io::Error,
    },

    /// Generic I/O error.
    #[error("{0}")]
    IoError(#[from] io::Error),

    /// Binary manifest or resource table does not match the expected layout.
    #[error("malformed {0}")]
    Format(#[from] FormatError),

    /// Script cipher failure.
    #[error("script encryption failed: {0}")]
    Crypto(#[from] CryptoError),

    /// ZIP archive creation/extraction error.
    #[error("{0}")]
    ZipError(#[from] zip::result::ZipError),

    /// JSON serialization/deserialization error.
    #[error("{0}")]
    JsonError(#[from] serde_json::Error),

    /// Launcher icon decoding/encoding error.
    #[error("{0}")]
    ImageError(#[from] image::ImageError),

    /// Error walking the project tree.
    #[error("{0}")]
    WalkdirError(#[from] walkdir::Error),

    /// Path prefix stripping error.
    #[error("{0}")]
    StripError(#[from] std::path::StripPrefixError),

    /// Package signing failed.
    #[error("failed to sign package: {0}")]
    Sign(String),

    /// Package signature verification failed.
    #[error("signature verification failed: {0}")]
    Verify(String),

    /// Generic error with custom message.
    #[error("{0}")]
    GenericError(String),
}

/// Input validation errors.
#[derive(Debug, DeriveError, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field was left empty.
    #[error("{field} must not be empty")]
    EmptyField {
        /// Field name
        field: &'static str,
    },

    /// Package identifier does not follow reverse-domain syntax.
    #[error("invalid package name '{0}': expected at least two dot-separated segments, each starting with a letter")]
    InvalidPackageName(String),

    /// Package identifier does not fit the resource table name field.
    #[error("package name '{name}' is {len} UTF-16 units long, the limit is {max}")]
    PackageNameTooLong {
        /// Offending package name
        name: String,
        /// Its length in UTF-16 code units
        len: usize,
        /// Maximum allowed length
        max: usize,
    },

    /// Source path does not exist.
    #[error("source path {0} does not exist")]
    MissingSource(PathBuf),

    /// Project directory has no descriptor.
    #[error("no project descriptor found at {0}")]
    MissingDescriptor(PathBuf),

    /// Workspace directory holds files that a previous build did not put there.
    #[error("workspace {0} is not empty and was not created by scriptapk")]
    ForeignWorkspace(PathBuf),

    /// Workspace and source would be inside one another.
    #[error("workspace {workspace} overlaps source {project}")]
    WorkspaceOverlapsSource {
        /// Workspace directory
        workspace: PathBuf,
        /// Project directory or script
        project: PathBuf,
    },
}

/// Structure errors from the binary chunk codecs.
#[derive(Debug, DeriveError, PartialEq, Eq)]
pub enum FormatError {
    /// Input ended before a complete structure could be read.
    #[error("{what}: truncated at offset {offset:#x} (need {needed} bytes, {available} available)")]
    Truncated {
        /// Structure being read
        what: &'static str,
        /// Offset where reading stopped
        offset: usize,
        /// Bytes required
        needed: usize,
        /// Bytes left
        available: usize,
    },

    /// A chunk type that is not allowed at this position.
    #[error("{what}: unexpected chunk type {chunk_type:#06x} at offset {offset:#x}")]
    UnexpectedChunk {
        /// Structure being read
        what: &'static str,
        /// Chunk type found
        chunk_type: u16,
        /// Offset of the chunk
        offset: usize,
    },

    /// A chunk header whose sizes are inconsistent.
    #[error("{what}: bad chunk header at offset {offset:#x}: {reason}")]
    BadHeader {
        /// Structure being read
        what: &'static str,
        /// Offset of the chunk
        offset: usize,
        /// Explanation
        reason: String,
    },

    /// A string pool index that points past the end of the pool.
    #[error("{what}: string index {index} out of range (pool has {len} strings)")]
    StringIndex {
        /// Structure being read
        what: &'static str,
        /// Index found
        index: u32,
        /// Number of strings in the pool
        len: usize,
    },

    /// A required element or attribute is absent.
    #[error("{what}: missing {item}")]
    Missing {
        /// Structure being read
        what: &'static str,
        /// Missing item
        item: String,
    },

    /// String data that does not decode.
    #[error("{what}: invalid string data: {reason}")]
    BadString {
        /// Structure being read
        what: &'static str,
        /// Explanation
        reason: String,
    },
}

/// Script cipher errors, carrying the underlying cause as text.
#[derive(Debug, DeriveError, PartialEq, Eq)]
pub enum CryptoError {
    /// Key or iv has the wrong length for the cipher.
    #[error("cipher initialization failed: {0}")]
    Init(String),

    /// Decrypted data has invalid padding.
    #[error("invalid padding: {0}")]
    Padding(String),

    /// Data does not start with the encrypted script header.
    #[error("not an encrypted script (bad header)")]
    BadHeader,
}

impl Error {
    /// Wraps this error with the stage that produced it.
    ///
    /// Errors that already carry a stage are returned unchanged.
    pub fn in_stage(self, stage: Stage) -> Self {
        match self {
            Error::Stage { .. } => self,
            other => Error::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// Returns the stage in which this error occurred, if known.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Returns the innermost error, looking through stage and context wrappers.
    pub fn root(&self) -> &Error {
        match self {
            Error::Stage { source, .. } | Error::Context(_, source) => source.root(),
            other => other,
        }
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self.root() {
            Error::Validation(ValidationError::InvalidPackageName(_)) => vec![
                "Use a reverse-domain identifier such as com.example.app".to_string(),
                "Each segment must start with a letter and contain only letters, digits or '_'"
                    .to_string(),
            ],
            Error::Validation(ValidationError::MissingDescriptor(path)) => vec![
                format!("Create a descriptor with: scriptapk init {}", path.display()),
                "Or pass a single script file as the source".to_string(),
            ],
            Error::Validation(
                ValidationError::ForeignWorkspace(_) | ValidationError::WorkspaceOverlapsSource { .. },
            ) => vec![
                "Pass an empty or missing directory to --workspace".to_string(),
                "Omit --workspace to build in the cache directory".to_string(),
            ],
            Error::Format(_) => vec![
                "Check that the template package is an unmodified build of the runtime"
                    .to_string(),
                "Rebuild the template if it was produced by an incompatible toolchain".to_string(),
            ],
            Error::Fs { path, .. } => vec![
                format!("Check that {} exists and is accessible", path.display()),
                "Rerun with --keep-workspace to inspect the staged files".to_string(),
            ],
            Error::Sign(_) => vec![
                "Regenerate the signing key with: scriptapk keygen <path>".to_string(),
            ],
            _ => vec!["Check the error message above for specific details".to_string()],
        }
    }
}

/// Trait for adding context to errors.
///
/// Similar to `anyhow::Context` but integrated with the crate's Error type.
pub trait Context<T> {
    /// Add context to an error.
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static;

    /// Add context to an error using a closure (lazy evaluation).
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T> Context<T> for Result<T> {
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
    {
        self.map_err(|e| Error::Context(context.to_string(), Box::new(e)))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.map_err(|e| Error::Context(f().to_string(), Box::new(e)))
    }
}

/// Extension trait for filesystem operations with automatic path context.
///
/// Wraps I/O errors with the path that caused them for better diagnostics.
pub trait ErrorExt<T> {
    /// Add filesystem context to an I/O error.
    ///
    /// The `context` should be a present-tense verb phrase describing the operation,
    /// e.g., "reading file", "creating directory", "copying script".
    fn fs_context(self, context: &'static str, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> ErrorExt<T> for std::result::Result<T, std::io::Error> {
    fn fs_context(self, context: &'static str, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|error| Error::Fs {
            context,
            path: path.into(),
            error,
        })
    }
}

/// Macro for early return with error.
///
/// Converts the message into a [`Error::GenericError`] and returns immediately.
#[macro_export]
macro_rules! bail {
    ($msg:literal $(,)?) => {
        return Err($crate::error::Error::GenericError($msg.into()))
    };
    ($err:expr $(,)?) => {
        return Err($crate::error::Error::GenericError($err.to_string()))
    };
    ($fmt:expr, $($arg:tt)*) => {
        return Err($crate::error::Error::GenericError(format!($fmt, $($arg)*)))
    };
}
