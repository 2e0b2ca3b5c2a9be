//! Compiled Android resource formats.
//!
//! - [`axml`]: binary XML, used for `AndroidManifest.xml`
//! - [`arsc`]: the resource table, `resources.arsc`
//!
//! Both are parsed into typed chunks, edited, and re-serialized with every
//! size field recomputed.

pub mod arsc;
pub mod axml;
pub mod chunk;
pub mod string_pool;
pub mod value;

pub use arsc::{ResourceTable, patch_resource_table};
pub use axml::{ManifestIdentity, PatchedManifest, XmlDocument, patch_manifest};

use crate::error::{ErrorExt, Result};
use std::path::Path;

/// Manifest location inside a package.
pub const MANIFEST_PATH: &str = "AndroidManifest.xml";
/// Resource table location inside a package.
pub const RESOURCE_TABLE_PATH: &str = "resources.arsc";
/// Launcher icon location inside a package.
pub const ICON_PATH: &str = "res/mipmap/ic_launcher.png";
/// Directory that receives the project's scripts.
pub const PROJECT_ASSETS_DIR: &str = "assets/project";

/// Read the package name declared by an exploded package's manifest.
pub fn read_package_name(workspace: &Path) -> Result<String> {
    let path = workspace.join(MANIFEST_PATH);
    let bytes = std::fs::read(&path).fs_context("reading manifest", &path)?;
    Ok(XmlDocument::parse(&bytes)?.package_name()?.to_string())
}

/// Patch the manifest of an exploded package in place.
pub fn patch_manifest_file(workspace: &Path, identity: &ManifestIdentity) -> Result<PatchedManifest> {
    let path = workspace.join(MANIFEST_PATH);
    let bytes = std::fs::read(&path).fs_context("reading manifest", &path)?;
    let patched = patch_manifest(&bytes, identity)?;
    std::fs::write(&path, &patched.bytes).fs_context("writing manifest", &path)?;
    Ok(patched)
}

/// Rename the resource table package of an exploded package in place.
///
/// Returns the replaced package name.
pub fn patch_resource_table_file(workspace: &Path, old: Option<&str>, new: &str) -> Result<String> {
    let path = workspace.join(RESOURCE_TABLE_PATH);
    let bytes = std::fs::read(&path).fs_context("reading resource table", &path)?;
    let (patched, previous) = patch_resource_table(&bytes, old, new)?;
    std::fs::write(&path, patched).fs_context("writing resource table", &path)?;
    Ok(previous)
}
