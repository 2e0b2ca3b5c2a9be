//! RAII guard for the scratch workspace.
//!
//! A guard starts out disarmed and never deletes anything. It is armed once
//! the directory carries the ownership marker written by
//! [`stage`](super::stage); from then on the workspace is removed when the
//! guard is dropped, including on panic and on early return with an error,
//! unless the guard was told to keep it.

use crate::error::{ErrorExt, Result};
use crate::workspace::is_owned;
use std::path::{Path, PathBuf};

/// Owns a workspace directory for the lifetime of one build.
#[derive(Debug)]
pub struct WorkspaceGuard {
    path: PathBuf,
    armed: bool,
    keep: bool,
}

impl WorkspaceGuard {
    /// Disarmed guard for `path`. The directory does not need to exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            armed: false,
            keep: false,
        }
    }

    /// Workspace directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Take ownership of the directory if it carries the workspace marker.
    ///
    /// Returns whether the guard is now armed.
    pub fn arm_if_owned(&mut self) -> bool {
        self.armed = is_owned(&self.path);
        self.armed
    }

    /// Whether dropping the guard may delete the directory.
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Whether the directory will survive the guard.
    pub fn is_kept(&self) -> bool {
        self.keep || !self.armed
    }

    /// Keep (or stop keeping) the directory when the guard drops.
    pub fn set_keep(&mut self, keep: bool) {
        self.keep = keep;
    }

    /// Release ownership and return the path; the directory is left on disk.
    pub fn detach(mut self) -> PathBuf {
        self.armed = false;
        std::mem::take(&mut self.path)
    }

    /// Remove the directory now, reporting failures.
    ///
    /// A disarmed guard leaves the directory alone.
    pub fn remove(mut self) -> Result<()> {
        let armed = std::mem::replace(&mut self.armed, false);
        if armed && self.path.exists() {
            std::fs::remove_dir_all(&self.path).fs_context("removing workspace", &self.path)?;
        }
        Ok(())
    }
}

impl Drop for WorkspaceGuard {
    fn drop(&mut self) {
        if self.is_kept() || !self.path.exists() {
            return;
        }
        // Drop must not panic; a leftover directory is only logged.
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => log::debug!("Removed workspace {}", self.path.display()),
            Err(e) => log::warn!(
                "Failed to remove workspace {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}
