//! Scratch workspace: template extraction, project staging and cleanup.
//!
//! A workspace is an exploded copy of the template package into which the
//! project's scripts are injected. It is owned by a [`WorkspaceGuard`] for
//! the duration of one build.
//!
//! Directories created by [`stage`] carry a [`WORKSPACE_MARKER`] file. Only
//! marked directories are ever cleared or deleted; a non-empty directory
//! without the marker is refused.

mod guard;
mod stager;

pub use guard::WorkspaceGuard;
pub use stager::{StageReport, copy_project_tree, stage, stage_single_script};

use crate::error::{Result, ValidationError};
use path_absolutize::Absolutize;
use std::path::{Path, PathBuf};

/// File at the workspace root that marks a directory as a scriptapk workspace.
pub const WORKSPACE_MARKER: &str = ".scriptapk-workspace";

/// Whether `dir` was created by [`stage`].
pub fn is_owned(dir: &Path) -> bool {
    dir.join(WORKSPACE_MARKER).is_file()
}

/// Whether `dir` may be cleared and used as a workspace.
///
/// Missing and empty directories qualify, as do marked ones.
pub fn is_claimable(dir: &Path) -> bool {
    match std::fs::read_dir(dir) {
        Ok(mut entries) => entries.next().is_none() || is_owned(dir),
        Err(_) => !dir.exists(),
    }
}

/// Reject a workspace that equals, contains or lies inside `source`.
pub fn check_overlap(workspace: &Path, source: &Path) -> Result<()> {
    let absolute = |p: &Path| {
        p.absolutize()
            .map(|p| p.into_owned())
            .unwrap_or_else(|_| p.to_path_buf())
    };
    let (ws, src) = (absolute(workspace), absolute(source));
    if ws.starts_with(&src) || src.starts_with(&ws) {
        return Err(ValidationError::WorkspaceOverlapsSource {
            workspace: ws,
            project: src,
        }
        .into());
    }
    Ok(())
}

/// Default location for a new workspace: `<cache dir>/scriptapk/build-<uuid>`.
///
/// Falls back to the system temp directory when no cache directory is known.
pub fn default_workspace_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("scriptapk")
        .join(format!("build-{}", uuid::Uuid::new_v4().simple()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_workspace_dirs_are_unique() {
        let a = default_workspace_dir();
        let b = default_workspace_dir();
        assert_ne!(a, b);
        assert!(a.to_string_lossy().contains("scriptapk"));
    }

    #[test]
    fn test_claimable_directories() {
        let root = tempfile::TempDir::new().unwrap();
        let dir = root.path().join("ws");
        assert!(is_claimable(&dir));
        std::fs::create_dir(&dir).unwrap();
        assert!(is_claimable(&dir));
        std::fs::write(dir.join("notes.txt"), "mine").unwrap();
        assert!(!is_claimable(&dir));
        std::fs::write(dir.join(WORKSPACE_MARKER), "").unwrap();
        assert!(is_claimable(&dir));
    }

    #[test]
    fn test_overlapping_workspace_is_rejected() {
        let root = tempfile::TempDir::new().unwrap();
        let project = root.path().join("tool");
        for workspace in [
            project.clone(),
            project.join("build/ws"),
            root.path().to_path_buf(),
            project.join("sub/../"),
        ] {
            let err = check_overlap(&workspace, &project).unwrap_err();
            assert!(matches!(
                err,
                crate::error::Error::Validation(ValidationError::WorkspaceOverlapsSource { .. })
            ));
        }
        check_overlap(&root.path().join("ws"), &project).unwrap();
        check_overlap(&root.path().join("tool-ws"), &project).unwrap();
    }
}
