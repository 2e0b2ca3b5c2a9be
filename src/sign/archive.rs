//! Deterministic re-archiving of a workspace with a signature block.

use crate::error::{Error, ErrorExt, Result};
use crate::sign::manifest::{Section, digest_b64, render_manifest, render_signature_file};
use crate::sign::signer::PackageSigner;
use crate::sign::{MANIFEST_ENTRY, SIGNATURE_FILE_ENTRY, is_signature_entry};
use crate::workspace::WORKSPACE_MARKER;
use std::io::Write;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

/// Extensions written without compression.
const STORED_EXTENSIONS: &[&str] = &["arsc", "png", "jpg", "jpeg", "ogg", "mp3", "webp"];

/// Data offset alignment of stored entries, as `zipalign` produces.
const STORED_ALIGNMENT: u16 = 4;

/// Result of [`archive_and_sign`].
#[derive(Debug, Clone)]
pub struct SignedArchive {
    /// Final package path
    pub path: PathBuf,
    /// Number of signed entries (signature files excluded)
    pub entries: usize,
}

fn entry_options(name: &str) -> SimpleFileOptions {
    let stored = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| STORED_EXTENSIONS.iter().any(|s| e.eq_ignore_ascii_case(s)));
    let options = SimpleFileOptions::default()
        .last_modified_time(DateTime::default())
        .unix_permissions(0o644);
    if stored {
        // The runtime maps resources.arsc straight out of the package.
        options
            .compression_method(CompressionMethod::Stored)
            .with_alignment(STORED_ALIGNMENT)
    } else {
        options.compression_method(CompressionMethod::Deflated)
    }
}

/// Workspace files as `(archive name, path)`, sorted by name.
///
/// Signature files left over from the template and the workspace marker are
/// dropped.
fn collect_entries(workspace: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(workspace).follow_links(false) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(workspace)?;
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if name == WORKSPACE_MARKER {
            continue;
        }
        if is_signature_entry(&name) {
            log::debug!("Dropping template signature file {}", name);
            continue;
        }
        entries.push((name, entry.path().to_path_buf()));
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(entries)
}

/// Write the signed archive of `workspace` to `writer`.
///
/// Content entries come first; the manifest, signature file and signature
/// block are appended once every digest is known.
pub fn write_signed_archive<W, S>(workspace: &Path, writer: W, signer: &S) -> Result<(W, usize)>
where
    W: Write + std::io::Seek,
    S: PackageSigner + ?Sized,
{
    let entries = collect_entries(workspace)?;
    let mut zip = ZipWriter::new(writer);
    let mut sections = Vec::with_capacity(entries.len());

    for (name, path) in &entries {
        let data = std::fs::read(path).fs_context("reading workspace file", path)?;
        zip.start_file(name.as_str(), entry_options(name))?;
        zip.write_all(&data).fs_context("writing package entry", path)?;
        sections.push(Section {
            name: name.clone(),
            digest: digest_b64(&data),
        });
    }

    let manifest = render_manifest(&sections);
    let signature_file = render_signature_file(&manifest, &sections);
    let block = signer.sign(signature_file.as_bytes())?;

    for (name, data) in [
        (MANIFEST_ENTRY, manifest.as_bytes()),
        (SIGNATURE_FILE_ENTRY, signature_file.as_bytes()),
        (signer.block_entry(), block.as_slice()),
    ] {
        zip.start_file(name, entry_options(name))?;
        zip.write_all(data)?;
    }

    let writer = zip.finish()?;
    Ok((writer, entries.len()))
}

/// Archive and sign `workspace` into `dest`.
///
/// The archive is built in a temp file next to `dest` and renamed over it
/// only after signing succeeded. On failure `dest` is untouched.
pub fn archive_and_sign<S>(workspace: &Path, dest: &Path, signer: &S) -> Result<SignedArchive>
where
    S: PackageSigner + ?Sized,
{
    let parent = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).fs_context("creating output directory", &parent)?;

    let file_name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| Error::Sign(format!("output path {} has no file name", dest.display())))?;
    let mut temp = tempfile::Builder::new()
        .prefix(&format!("{file_name}."))
        .suffix(".tmp")
        .tempfile_in(&parent)
        .fs_context("creating temporary package", &parent)?;

    let (_, entries) = write_signed_archive(workspace, temp.as_file_mut(), signer)?;
    temp.as_file()
        .sync_all()
        .fs_context("flushing temporary package", temp.path())?;

    temp.persist(dest).map_err(|e| Error::Fs {
        context: "moving signed package to",
        path: dest.to_path_buf(),
        error: e.error,
    })?;
    log::info!("Signed {} entries into {}", entries, dest.display());

    Ok(SignedArchive {
        path: dest.to_path_buf(),
        entries,
    })
}
