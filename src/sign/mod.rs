//! Package archiving and signing.
//!
//! The signature scheme follows the JAR layout: `META-INF/MANIFEST.MF` holds a
//! SHA-256 digest per entry, `META-INF/CERT.SF` holds digests of the manifest
//! and of each manifest section, and `META-INF/CERT.EC` (or `CERT.RSA` for RSA
//! keys) holds a detached PKCS#7 `SignedData` over `CERT.SF` with the signing
//! certificate embedded.

mod archive;
pub mod manifest;
mod signer;
mod verify;

pub use archive::{SignedArchive, archive_and_sign, write_signed_archive};
pub use signer::{ApkSigner, PackageSigner, fingerprint, generate_pkcs8};
pub use verify::{VerifiedApk, verify_apk};

use crate::error::{ErrorExt, Result};
use std::io::Read;
use std::path::Path;

/// Digest manifest entry.
pub const MANIFEST_ENTRY: &str = "META-INF/MANIFEST.MF";
/// Signature file entry.
pub const SIGNATURE_FILE_ENTRY: &str = "META-INF/CERT.SF";
/// Signature block entry for ECDSA keys.
pub const EC_BLOCK_ENTRY: &str = "META-INF/CERT.EC";
/// Signature block entry for RSA keys.
pub const RSA_BLOCK_ENTRY: &str = "META-INF/CERT.RSA";

/// Whether an archive entry belongs to a signature (ours or a template's).
pub fn is_signature_entry(name: &str) -> bool {
    let Some(file) = name.strip_prefix("META-INF/") else {
        return false;
    };
    if file.contains('/') {
        return false;
    }
    let upper = file.to_ascii_uppercase();
    upper == "MANIFEST.MF"
        || [".SF", ".RSA", ".DSA", ".EC"]
            .iter()
            .any(|ext| upper.ends_with(ext))
}

/// Hex SHA-256 of a file.
pub fn sha256_file(path: &Path) -> Result<String> {
    use sha2::{Digest, Sha256};

    let mut file = std::fs::File::open(path).fs_context("opening file for hashing", path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 8192];
    loop {
        let n = file
            .read(&mut buffer)
            .fs_context("reading file for hash calculation", path)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_entries() {
        assert!(is_signature_entry("META-INF/MANIFEST.MF"));
        assert!(is_signature_entry("META-INF/CERT.RSA"));
        assert!(is_signature_entry("META-INF/release.sf"));
        assert!(is_signature_entry(EC_BLOCK_ENTRY));
        assert!(!is_signature_entry("META-INF/services/foo"));
        assert!(!is_signature_entry("META-INF/kotlin.kotlin_module"));
        assert!(!is_signature_entry("assets/CERT.SF"));
    }

    #[test]
    fn test_sha256_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("f");
        std::fs::write(&path, b"abc").unwrap();
        assert_eq!(
            sha256_file(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
