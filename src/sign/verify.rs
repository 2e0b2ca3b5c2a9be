//! Signature verification of packages produced by [`archive_and_sign`](super::archive_and_sign).

use crate::error::{Error, ErrorExt, Result};
use crate::sign::manifest::{DIGEST_ATTR, MANIFEST_DIGEST_ATTR, digest_b64, parse_sections};
use crate::sign::signer::fingerprint;
use crate::sign::{
    EC_BLOCK_ENTRY, MANIFEST_ENTRY, RSA_BLOCK_ENTRY, SIGNATURE_FILE_ENTRY, is_signature_entry,
};
use cryptographic_message_syntax::SignedData;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// A package whose signature checked out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedApk {
    /// Number of signed entries
    pub entries: usize,
    /// Hex SHA-256 of the signing certificate
    pub certificate_fingerprint: String,
}

fn read_entry(archive: &mut zip::ZipArchive<File>, name: &str) -> Result<Vec<u8>> {
    let mut file = archive
        .by_name(name)
        .map_err(|_| Error::Verify(format!("missing {name}")))?;
    let mut data = Vec::with_capacity(file.size() as usize);
    file.read_to_end(&mut data)?;
    Ok(data)
}

fn text(name: &str, data: Vec<u8>) -> Result<String> {
    String::from_utf8(data).map_err(|_| Error::Verify(format!("{name} is not UTF-8")))
}

/// Verify the signature block, signature file and every entry digest of a package.
pub fn verify_apk(path: &Path) -> Result<VerifiedApk> {
    let file = File::open(path).fs_context("opening package", path)?;
    let mut archive = zip::ZipArchive::new(file)?;

    let manifest = text(MANIFEST_ENTRY, read_entry(&mut archive, MANIFEST_ENTRY)?)?;
    let signature_file = text(
        SIGNATURE_FILE_ENTRY,
        read_entry(&mut archive, SIGNATURE_FILE_ENTRY)?,
    )?;
    let block_name = [EC_BLOCK_ENTRY, RSA_BLOCK_ENTRY]
        .into_iter()
        .find(|name| archive.index_for_name(name).is_some())
        .ok_or_else(|| Error::Verify(format!("missing {EC_BLOCK_ENTRY} or {RSA_BLOCK_ENTRY}")))?;
    let block = read_entry(&mut archive, block_name)?;
    let certificate_fingerprint = verify_block(&block, signature_file.as_bytes())?;

    let sf_sections = parse_sections(&signature_file);
    let expected_manifest = sf_sections
        .first()
        .and_then(|s| s.get(MANIFEST_DIGEST_ATTR))
        .ok_or_else(|| Error::Verify(format!("{SIGNATURE_FILE_ENTRY} has no manifest digest")))?;
    if expected_manifest != digest_b64(manifest.as_bytes()) {
        return Err(Error::Verify(format!("{MANIFEST_ENTRY} digest mismatch")));
    }

    let mut digests = BTreeMap::new();
    for section in parse_sections(&manifest).into_iter().skip(1) {
        let name = section
            .get("Name")
            .ok_or_else(|| Error::Verify("manifest section without a name".into()))?
            .to_string();
        let digest = section
            .get(DIGEST_ATTR)
            .ok_or_else(|| Error::Verify(format!("no digest for {name}")))?
            .to_string();
        digests.insert(name, (digest, digest_b64(section.raw.as_bytes())));
    }

    for section in sf_sections.iter().skip(1) {
        let name = section
            .get("Name")
            .ok_or_else(|| Error::Verify("signature file section without a name".into()))?;
        let matches = digests.get(name).is_some_and(|(_, section_digest)| {
            section.get(DIGEST_ATTR) == Some(section_digest.as_str())
        });
        if !matches {
            return Err(Error::Verify(format!("section digest mismatch for {name}")));
        }
    }

    let names: Vec<String> = archive
        .file_names()
        .filter(|n| !n.ends_with('/') && !is_signature_entry(n))
        .map(str::to_string)
        .collect();
    for name in &names {
        let (expected, _) = digests
            .get(name)
            .ok_or_else(|| Error::Verify(format!("{name} is not covered by the manifest")))?;
        let data = read_entry(&mut archive, name)?;
        if *expected != digest_b64(&data) {
            return Err(Error::Verify(format!("digest mismatch for {name}")));
        }
    }
    if names.len() != digests.len() {
        return Err(Error::Verify(format!(
            "manifest lists {} entries, package has {}",
            digests.len(),
            names.len()
        )));
    }

    Ok(VerifiedApk {
        entries: names.len(),
        certificate_fingerprint,
    })
}

/// Check the PKCS#7 block against the signature file and return the signer's
/// certificate fingerprint.
fn verify_block(block: &[u8], signature_file: &[u8]) -> Result<String> {
    let signed_data = SignedData::parse_ber(block)
        .map_err(|e| Error::Verify(format!("malformed signature block: {e}")))?;
    let signer = signed_data
        .signers()
        .next()
        .ok_or_else(|| Error::Verify("signature block has no signer".into()))?;

    signer
        .verify_message_digest_with_content(signature_file)
        .map_err(|_| Error::Verify("signature block does not cover the signature file".into()))?;
    signer
        .verify_signature_with_signed_data_and_content(
            &signed_data,
            &signer.signed_content(Some(signature_file)),
        )
        .map_err(|_| Error::Verify("signature does not match the signature file".into()))?;

    let certificate = signed_data
        .certificates()
        .next()
        .ok_or_else(|| Error::Verify("signature block carries no certificate".into()))?;
    Ok(fingerprint(certificate.constructed_data()))
}
