//! Application configuration consumed by the build pipeline.
//!
//! [`AppConfig`] is immutable and only obtainable through [`AppConfigBuilder`],
//! whose [`build`](AppConfigBuilder::build) rejects invalid input before any
//! workspace I/O happens.
//!
//! # Example
//!
//! ```no_run
//! use scriptapk::AppConfig;
//!
//! let config = AppConfig::builder()
//!     .app_name("Tool")
//!     .package_name("com.acme.tool")
//!     .version_name("1.0")
//!     .version_code(1)
//!     .source_path("scripts/main.js")
//!     .build()?;
//! # Ok::<(), scriptapk::Error>(())
//! ```

use crate::error::{Result, ValidationError};
use crate::project::ProjectDescriptor;
use image::DynamicImage;
use regex::Regex;
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

/// Reverse-domain package identifier: two or more segments, each starting with a letter.
static PACKAGE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z][A-Za-z\d_]*\.)+[A-Za-z][A-Za-z\d_]*$")
        .expect("package name pattern is valid")
});

/// Longest package name the resource table header can hold (128 UTF-16 units incl. NUL).
pub const MAX_PACKAGE_NAME_LEN: usize = 127;

/// Check a package identifier.
pub fn validate_package_name(name: &str) -> std::result::Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::EmptyField {
            field: "package name",
        });
    }
    if !PACKAGE_NAME.is_match(name) {
        return Err(ValidationError::InvalidPackageName(name.to_string()));
    }
    let len = name.encode_utf16().count();
    if len > MAX_PACKAGE_NAME_LEN {
        return Err(ValidationError::PackageNameTooLong {
            name: name.to_string(),
            len,
            max: MAX_PACKAGE_NAME_LEN,
        });
    }
    Ok(())
}

/// Lazily evaluated launcher icon.
#[derive(Clone)]
pub enum IconSource {
    /// Image file decoded when the icon is needed
    File(PathBuf),
    /// Producer called when the icon is needed; `None` keeps the template icon
    Producer(Arc<dyn Fn() -> Result<Option<DynamicImage>> + Send + Sync>),
}

impl IconSource {
    /// Wrap a closure as an icon producer.
    pub fn producer<F>(f: F) -> Self
    where
        F: Fn() -> Result<Option<DynamicImage>> + Send + Sync + 'static,
    {
        IconSource::Producer(Arc::new(f))
    }

    /// Evaluate the icon.
    pub fn load(&self) -> Result<Option<DynamicImage>> {
        match self {
            IconSource::File(path) => Ok(Some(image::open(path)?)),
            IconSource::Producer(f) => f(),
        }
    }
}

impl fmt::Debug for IconSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IconSource::File(path) => f.debug_tuple("File").field(path).finish(),
            IconSource::Producer(_) => f.write_str("Producer(<fn>)"),
        }
    }
}

/// Validated application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    app_name: String,
    version_name: String,
    version_code: u32,
    source_path: PathBuf,
    package_name: String,
    ignored_dirs: BTreeSet<PathBuf>,
    icon: Option<IconSource>,
}

impl AppConfig {
    /// Start building a configuration.
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Builder pre-filled from a project descriptor.
    ///
    /// Ignores the project's build directory and picks up the descriptor's icon.
    pub fn from_project(project_dir: &Path, descriptor: &ProjectDescriptor) -> AppConfigBuilder {
        let mut builder = AppConfigBuilder::default()
            .app_name(&descriptor.name)
            .package_name(&descriptor.package_name)
            .version_name(&descriptor.version_name)
            .version_code(descriptor.version_code)
            .source_path(project_dir)
            .ignore_dir(project_dir.join(&descriptor.build_dir));
        if let Some(icon) = &descriptor.icon {
            builder = builder.icon_path(project_dir.join(icon));
        }
        builder
    }

    /// Application label
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// Human readable version
    pub fn version_name(&self) -> &str {
        &self.version_name
    }

    /// Integer version
    pub fn version_code(&self) -> u32 {
        self.version_code
    }

    /// Project directory or single script file
    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// Package identifier
    pub fn package_name(&self) -> &str {
        &self.package_name
    }

    /// Directories excluded from staging
    pub fn ignored_dirs(&self) -> &BTreeSet<PathBuf> {
        &self.ignored_dirs
    }

    /// Launcher icon, if one was configured
    pub fn icon(&self) -> Option<&IconSource> {
        self.icon.as_ref()
    }
}

/// Fluent accumulator for [`AppConfig`].
#[derive(Debug, Clone, Default)]
pub struct AppConfigBuilder {
    app_name: Option<String>,
    version_name: Option<String>,
    version_code: u32,
    source_path: Option<PathBuf>,
    package_name: Option<String>,
    ignored_dirs: BTreeSet<PathBuf>,
    icon: Option<IconSource>,
}

impl AppConfigBuilder {
    /// Creates a new, empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the application label.
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }

    /// Sets the version name.
    pub fn version_name(mut self, version: impl Into<String>) -> Self {
        self.version_name = Some(version.into());
        self
    }

    /// Sets the version code.
    pub fn version_code(mut self, code: u32) -> Self {
        self.version_code = code;
        self
    }

    /// Sets the project directory or single script file.
    pub fn source_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.source_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the package identifier.
    pub fn package_name(mut self, name: impl Into<String>) -> Self {
        self.package_name = Some(name.into());
        self
    }

    /// Excludes a directory (and everything beneath it) from staging.
    pub fn ignore_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.ignored_dirs.insert(dir.as_ref().to_path_buf());
        self
    }

    /// Sets a lazily evaluated icon.
    pub fn icon(mut self, icon: IconSource) -> Self {
        self.icon = Some(icon);
        self
    }

    /// Sets the icon to an image file, decoded during the build stage.
    pub fn icon_path<P: AsRef<Path>>(self, path: P) -> Self {
        self.icon(IconSource::File(path.as_ref().to_path_buf()))
    }

    /// Clears any configured icon, keeping the template's.
    pub fn no_icon(mut self) -> Self {
        self.icon = None;
        self
    }

    /// Validates and freezes the configuration.
    ///
    /// # Errors
    ///
    /// - empty app name, version name or source path
    /// - package name that is not a reverse-domain identifier
    /// - source path that does not exist
    pub fn build(self) -> Result<AppConfig> {
        let app_name = required(self.app_name, "app name")?;
        let version_name = required(self.version_name, "version name")?;
        let package_name = self.package_name.unwrap_or_default();
        validate_package_name(&package_name)?;

        let source_path = self
            .source_path
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or(ValidationError::EmptyField {
                field: "source path",
            })?;
        if !source_path.exists() {
            return Err(ValidationError::MissingSource(source_path).into());
        }

        Ok(AppConfig {
            app_name,
            version_name,
            version_code: self.version_code,
            source_path,
            package_name,
            ignored_dirs: self.ignored_dirs,
            icon: self.icon,
        })
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ValidationError::EmptyField { field }.into()),
    }
}
