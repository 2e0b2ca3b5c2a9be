//! Template extraction and project tree staging.

use crate::crypto::ScriptKey;
use crate::error::{Context, ErrorExt, Result, ValidationError};
use crate::project::{DESCRIPTOR_FILE_NAME, ProjectDescriptor};
use crate::script;
use crate::workspace::{WORKSPACE_MARKER, is_claimable};
use path_absolutize::Absolutize;
use std::collections::BTreeSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// What [`copy_project_tree`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageReport {
    /// Scripts written encrypted
    pub encrypted: usize,
    /// Other files copied verbatim
    pub copied: usize,
    /// Directories left out because they are ignored
    pub skipped_dirs: Vec<PathBuf>,
}

impl StageReport {
    /// Total number of files written.
    pub fn files(&self) -> usize {
        self.encrypted + self.copied
    }
}

/// Extract `template` into `workspace`.
///
/// A workspace left by an earlier build is cleared first, so running this
/// twice yields the same tree. A non-empty directory without the workspace
/// marker is refused and left untouched.
pub fn stage(template: &Path, workspace: &Path) -> Result<()> {
    let file = File::open(template).fs_context("opening template package", template)?;
    let mut archive = zip::ZipArchive::new(file)?;

    if !is_claimable(workspace) {
        return Err(ValidationError::ForeignWorkspace(workspace.to_path_buf()).into());
    }
    if workspace.exists() {
        std::fs::remove_dir_all(workspace).fs_context("clearing workspace", workspace)?;
    }
    std::fs::create_dir_all(workspace).fs_context("creating workspace", workspace)?;
    let marker = workspace.join(WORKSPACE_MARKER);
    std::fs::write(&marker, b"").fs_context("marking workspace", &marker)?;

    archive.extract(workspace)?;
    log::info!(
        "Extracted {} entries from {} into {}",
        archive.len(),
        template.display(),
        workspace.display()
    );
    Ok(())
}

fn absolute(path: &Path) -> PathBuf {
    path.absolutize()
        .map(|p| p.into_owned())
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Whether `dir` is an ignored directory or lies beneath one.
fn is_ignored(dir: &Path, ignored: &BTreeSet<PathBuf>) -> bool {
    ignored.iter().any(|i| dir.starts_with(i))
}

/// Copy `source_dir` into `target_dir`, encrypting scripts with `key`.
///
/// Directories in `ignored_dirs` (and everything beneath them) are skipped.
/// Any failure aborts the copy; files already written stay in place.
pub fn copy_project_tree(
    target_dir: &Path,
    source_dir: &Path,
    ignored_dirs: &BTreeSet<PathBuf>,
    key: &ScriptKey,
) -> Result<StageReport> {
    let source_dir = absolute(source_dir);
    let ignored: BTreeSet<PathBuf> = ignored_dirs.iter().map(|p| absolute(p)).collect();
    let mut report = StageReport::default();

    std::fs::create_dir_all(target_dir).fs_context("creating script directory", target_dir)?;

    let mut skipped = Vec::new();
    let walker = WalkDir::new(&source_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            if entry.depth() == 0 || !entry.file_type().is_dir() {
                return true;
            }
            if is_ignored(entry.path(), &ignored) {
                skipped.push(entry.path().to_path_buf());
                false
            } else {
                true
            }
        });

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(&source_dir)?;
        let dest = target_dir.join(relative);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).fs_context("creating script directory", parent)?;
        }

        if script::is_script(entry.path()) {
            write_encrypted(entry.path(), &dest, key)
                .with_context(|| format!("staging script {}", relative.display()))?;
            report.encrypted += 1;
        } else {
            std::fs::copy(entry.path(), &dest).fs_context("copying project file", entry.path())?;
            report.copied += 1;
        }
        log::debug!("Staged {}", relative.display());
    }

    for dir in &skipped {
        log::debug!("Skipped ignored directory {}", dir.display());
    }
    report.skipped_dirs = skipped;
    Ok(report)
}

/// Stage a single file as a one-file project.
///
/// The file becomes the descriptor's entry script and the descriptor is
/// written next to it, so the runtime sees a regular project. Scripts are
/// encrypted, any other file is copied verbatim. The synthesized descriptor
/// is not counted in the report.
pub fn stage_single_script(
    target_dir: &Path,
    script_file: &Path,
    descriptor: &ProjectDescriptor,
    key: &ScriptKey,
) -> Result<StageReport> {
    std::fs::create_dir_all(target_dir).fs_context("creating script directory", target_dir)?;
    let dest = target_dir.join(&descriptor.main_script_file);
    let mut report = StageReport::default();
    if script::is_script(script_file) {
        write_encrypted(script_file, &dest, key)
            .with_context(|| format!("staging script {}", script_file.display()))?;
        report.encrypted = 1;
    } else {
        log::warn!(
            "{} is not a script, packaging it unencrypted",
            script_file.display()
        );
        std::fs::copy(script_file, &dest).fs_context("copying project file", script_file)?;
        report.copied = 1;
    }
    descriptor.write_to(&target_dir.join(DESCRIPTOR_FILE_NAME))?;
    Ok(report)
}

fn write_encrypted(source: &Path, dest: &Path, key: &ScriptKey) -> Result<()> {
    let plain = std::fs::read(source).fs_context("reading script", source)?;
    let sealed = script::encrypt_script(&plain, key)?;
    std::fs::write(dest, sealed).fs_context("writing encrypted script", dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{ExecutionMode, decrypt_script};
    use std::io::Write;
    use tempfile::TempDir;

    fn key() -> ScriptKey {
        ScriptKey::derive("com.acme.tool", "1.0", "main.js", "ABCDEF12-1", "Tool")
    }

    fn project(root: &Path) -> PathBuf {
        let src = root.join("src");
        for dir in ["lib", "build/out", "res", "res/build"] {
            std::fs::create_dir_all(src.join(dir)).unwrap();
        }
        std::fs::write(src.join("main.js"), "\"ui\";\nX").unwrap();
        std::fs::write(src.join("lib/util.js"), "module.exports = 1;").unwrap();
        std::fs::write(src.join("res/logo.png"), [0x89, b'P', b'N', b'G']).unwrap();
        std::fs::write(src.join("res/build/keep.txt"), "kept").unwrap();
        std::fs::write(src.join("build/out/old.apk"), "stale").unwrap();
        src
    }

    #[test]
    fn test_copy_encrypts_scripts_and_copies_rest() {
        let root = TempDir::new().unwrap();
        let src = project(root.path());
        let target = root.path().join("ws/assets/project");
        let ignored = BTreeSet::from([src.join("build")]);

        let report = copy_project_tree(&target, &src, &ignored, &key()).unwrap();
        assert_eq!(report.encrypted, 2);
        assert_eq!(report.copied, 2);
        assert_eq!(report.skipped_dirs, vec![absolute(&src.join("build"))]);

        let (mode, plain) =
            decrypt_script(&std::fs::read(target.join("main.js")).unwrap(), &key()).unwrap();
        assert_eq!(mode, ExecutionMode::UI);
        assert_eq!(plain, b"\"ui\";\nX");
        assert_eq!(
            std::fs::read(target.join("res/logo.png")).unwrap(),
            [0x89, b'P', b'N', b'G']
        );
        assert!(target.join("res/build/keep.txt").exists());
        assert!(!target.join("build").exists());
    }

    #[test]
    fn test_failed_script_names_the_file() {
        let root = TempDir::new().unwrap();
        let src = project(root.path());
        let target = root.path().join("out");
        // A directory where the encrypted script should go cannot be written.
        std::fs::create_dir_all(target.join("lib/util.js")).unwrap();

        let err = copy_project_tree(&target, &src, &BTreeSet::new(), &key()).unwrap_err();
        assert!(matches!(err, crate::error::Error::Context(..)));
        assert!(err.to_string().starts_with("staging script lib/util.js"));
        assert!(matches!(err.root(), crate::error::Error::Fs { .. }));
    }

    #[test]
    fn test_nested_ignored_directory_is_skipped_as_subtree() {
        let root = TempDir::new().unwrap();
        let src = project(root.path());
        let target = root.path().join("out");
        let ignored = BTreeSet::from([src.join("build/out")]);

        copy_project_tree(&target, &src, &ignored, &key()).unwrap();
        assert!(!target.join("build/out/old.apk").exists());
    }

    #[test]
    fn test_ignored_path_is_normalized() {
        let root = TempDir::new().unwrap();
        let src = project(root.path());
        let target = root.path().join("out");
        let ignored = BTreeSet::from([src.join("res/../lib")]);

        let report = copy_project_tree(&target, &src, &ignored, &key()).unwrap();
        assert!(!target.join("lib/util.js").exists());
        assert!(target.join("res/logo.png").exists());
        assert_eq!(report.skipped_dirs.len(), 1);
    }

    #[test]
    fn test_stage_reextracts_cleanly() {
        let root = TempDir::new().unwrap();
        let template = root.path().join("template.apk");
        {
            let mut zip = zip::ZipWriter::new(File::create(&template).unwrap());
            let options = zip::write::SimpleFileOptions::default();
            zip.start_file("AndroidManifest.xml", options).unwrap();
            zip.write_all(b"manifest").unwrap();
            zip.start_file("assets/readme.txt", options).unwrap();
            zip.write_all(b"hi").unwrap();
            zip.finish().unwrap();
        }
        let ws = root.path().join("ws");
        stage(&template, &ws).unwrap();
        assert!(ws.join(WORKSPACE_MARKER).is_file());
        std::fs::write(ws.join("stray.txt"), "x").unwrap();
        stage(&template, &ws).unwrap();
        assert!(ws.join("assets/readme.txt").exists());
        assert!(!ws.join("stray.txt").exists());
    }

    #[test]
    fn test_stage_refuses_foreign_directory() {
        let root = TempDir::new().unwrap();
        let template = root.path().join("template.apk");
        {
            let mut zip = zip::ZipWriter::new(File::create(&template).unwrap());
            zip.start_file("AndroidManifest.xml", zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(b"manifest").unwrap();
            zip.finish().unwrap();
        }
        let home = root.path().join("home");
        std::fs::create_dir_all(home.join("docs")).unwrap();
        std::fs::write(home.join("docs/thesis.txt"), "years of work").unwrap();

        let err = stage(&template, &home).unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Validation(ValidationError::ForeignWorkspace(_))
        ));
        assert_eq!(
            std::fs::read_to_string(home.join("docs/thesis.txt")).unwrap(),
            "years of work"
        );
        assert!(!home.join("AndroidManifest.xml").exists());
    }

    #[test]
    fn test_stage_missing_template() {
        let root = TempDir::new().unwrap();
        let err = stage(&root.path().join("none.apk"), &root.path().join("ws")).unwrap_err();
        assert!(matches!(err, crate::error::Error::Fs { .. }));
    }

    #[test]
    fn test_single_script_gets_descriptor() {
        let root = TempDir::new().unwrap();
        let script_file = root.path().join("hello.js");
        std::fs::write(&script_file, "toast('X')").unwrap();
        let descriptor = ProjectDescriptor::new("Hello", "com.acme.hello");
        let target = root.path().join("assets/project");

        let report = stage_single_script(&target, &script_file, &descriptor, &key()).unwrap();
        assert_eq!((report.encrypted, report.copied), (1, 0));
        let (_, plain) =
            decrypt_script(&std::fs::read(target.join("main.js")).unwrap(), &key()).unwrap();
        assert_eq!(plain, b"toast('X')");
        let written = ProjectDescriptor::load(&target).unwrap();
        assert_eq!(written.package_name, "com.acme.hello");
    }

    #[test]
    fn test_single_non_script_is_copied_verbatim() {
        let root = TempDir::new().unwrap();
        let source = root.path().join("readme.txt");
        std::fs::write(&source, "plain notes").unwrap();
        let descriptor = ProjectDescriptor::new("Hello", "com.acme.hello");
        let target = root.path().join("assets/project");

        let report = stage_single_script(&target, &source, &descriptor, &key()).unwrap();
        assert_eq!((report.encrypted, report.copied), (0, 1));
        assert_eq!(
            std::fs::read_to_string(target.join("main.js")).unwrap(),
            "plain notes"
        );
        assert!(target.join(DESCRIPTOR_FILE_NAME).is_file());
    }
}
