//! `project.json` model, load and save.

use crate::error::{ErrorExt, Result, ValidationError};
use crate::project::BuildInfo;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// File name of the descriptor inside a project directory.
pub const DESCRIPTOR_FILE_NAME: &str = "project.json";

/// Declarative configuration of a script project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDescriptor {
    /// Project (and default application) name
    pub name: String,
    /// Reverse-domain package identifier
    pub package_name: String,
    /// Human readable version
    pub version_name: String,
    /// Integer version
    pub version_code: u32,
    /// Entry script, relative to the project directory
    #[serde(alias = "main", default = "default_main_script")]
    pub main_script_file: String,
    /// Build output directory, relative to the project directory
    #[serde(default = "default_build_dir")]
    pub build_dir: String,
    /// Launcher icon, relative to the project directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Identity of the most recent build
    #[serde(alias = "build", default)]
    pub build_info: BuildInfo,
    /// Keys this crate does not interpret, preserved on rewrite
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

fn default_main_script() -> String {
    "main.js".to_string()
}

fn default_build_dir() -> String {
    "build".to_string()
}

impl ProjectDescriptor {
    /// Descriptor for a freshly scaffolded project.
    pub fn new(name: impl Into<String>, package_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            package_name: package_name.into(),
            version_name: "1.0.0".to_string(),
            version_code: 1,
            main_script_file: default_main_script(),
            build_dir: default_build_dir(),
            icon: None,
            build_info: BuildInfo::default(),
            extra: BTreeMap::new(),
        }
    }

    /// Path of the descriptor file for a project directory.
    pub fn file_of_dir(project_dir: &Path) -> PathBuf {
        project_dir.join(DESCRIPTOR_FILE_NAME)
    }

    /// Parse a descriptor from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize as pretty printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load the descriptor of a project directory.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let path = Self::file_of_dir(project_dir);
        if !path.is_file() {
            return Err(ValidationError::MissingDescriptor(project_dir.to_path_buf()).into());
        }
        let json = std::fs::read_to_string(&path).fs_context("reading project descriptor", &path)?;
        Self::from_json(&json)
    }

    /// Write this descriptor into a project directory.
    pub fn save(&self, project_dir: &Path) -> Result<PathBuf> {
        let path = Self::file_of_dir(project_dir);
        self.write_to(&path)?;
        Ok(path)
    }

    /// Write this descriptor to an explicit path, creating parent directories.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).fs_context("creating descriptor directory", parent)?;
        }
        std::fs::write(path, self.to_json()?).fs_context("writing project descriptor", path)
    }

    /// Replace the build info with the next build's.
    ///
    /// Returns the new build info.
    pub fn bump_build(&mut self) -> &BuildInfo {
        self.build_info = self.build_info.next();
        &self.build_info
    }

    /// Scaffold a new project directory with a descriptor and an entry script.
    ///
    /// Existing files are left untouched.
    pub fn scaffold(project_dir: &Path, name: &str, package_name: &str) -> Result<Self> {
        std::fs::create_dir_all(project_dir)
            .fs_context("creating project directory", project_dir)?;
        let descriptor_path = Self::file_of_dir(project_dir);
        let descriptor = if descriptor_path.exists() {
            log::info!("Keeping existing descriptor {}", descriptor_path.display());
            Self::load(project_dir)?
        } else {
            let descriptor = Self::new(name, package_name);
            descriptor.save(project_dir)?;
            descriptor
        };

        let main = project_dir.join(&descriptor.main_script_file);
        if !main.exists() {
            std::fs::write(&main, "\"ui\";\n\ntoast(\"Hello\");\n")
                .fs_context("writing entry script", &main)?;
        }
        Ok(descriptor)
    }
}
