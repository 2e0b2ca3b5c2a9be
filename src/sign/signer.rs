//! Signing keys and PKCS#7 signature blocks.
//!
//! A key file is a PEM bundle holding a PKCS#8 `PRIVATE KEY` and the
//! self-signed `CERTIFICATE` issued for it. Android compares certificates
//! across updates, so the certificate is created once by `keygen` and stored
//! next to the key rather than regenerated per build.

use crate::error::{Error, ErrorExt, Result};
use cryptographic_message_syntax::{SignedDataBuilder, SignerBuilder};
use ring::rand::SystemRandom;
use ring::signature::{ECDSA_P256_SHA256_ASN1_SIGNING, EcdsaKeyPair};
use sha2::{Digest, Sha256};
use std::path::Path;
use x509_certificate::{CapturedX509Certificate, InMemorySigningKeyPair, X509CertificateBuilder};

const PRIVATE_KEY_TAG: &str = "PRIVATE KEY";
const CERTIFICATE_TAG: &str = "CERTIFICATE";
const CERTIFICATE_SUBJECT: &str = "scriptapk";
const CERTIFICATE_VALIDITY_DAYS: i64 = 365 * 30;

/// Something that can produce a package's signature block.
pub trait PackageSigner {
    /// Archive name of the block, such as `META-INF/CERT.EC`.
    fn block_entry(&self) -> &'static str;

    /// Detached PKCS#7 `SignedData` over the signature file.
    fn sign(&self, signature_file: &[u8]) -> Result<Vec<u8>>;
}

/// Package signer holding a private key and its certificate.
pub struct ApkSigner {
    key_pair: InMemorySigningKeyPair,
    certificate: CapturedX509Certificate,
    ephemeral: bool,
}

impl std::fmt::Debug for ApkSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApkSigner")
            .field("fingerprint", &self.fingerprint())
            .field("block_entry", &self.block_entry())
            .field("ephemeral", &self.ephemeral)
            .finish()
    }
}

/// Generate a new PKCS#8 encoded ECDSA P-256 key.
pub fn generate_pkcs8() -> Result<Vec<u8>> {
    let rng = SystemRandom::new();
    let document = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, &rng)
        .map_err(|e| Error::Sign(format!("key generation failed: {e}")))?;
    Ok(document.as_ref().to_vec())
}

fn load_key_pair(der: &[u8]) -> Result<InMemorySigningKeyPair> {
    let key_pair = InMemorySigningKeyPair::from_pkcs8_der(der)
        .map_err(|e| Error::Sign(format!("rejected signing key: {e}")))?;
    if let InMemorySigningKeyPair::Ed25519(..) = key_pair {
        return Err(Error::Sign(
            "Ed25519 keys cannot sign Android packages, use an ECDSA P-256 or RSA key".into(),
        ));
    }
    Ok(key_pair)
}

/// Issue a long-lived self-signed certificate for `key_pair`.
fn self_signed(key_pair: &InMemorySigningKeyPair) -> Result<CapturedX509Certificate> {
    let mut builder = X509CertificateBuilder::default();
    builder
        .subject()
        .append_common_name_utf8_string(CERTIFICATE_SUBJECT)
        .map_err(|e| Error::Sign(format!("invalid certificate subject: {e:?}")))?;
    builder.validity_duration(chrono::Duration::days(CERTIFICATE_VALIDITY_DAYS));
    builder
        .create_with_key_pair(key_pair)
        .map_err(|e| Error::Sign(format!("certificate creation failed: {e}")))
}

impl ApkSigner {
    /// Signer for a PKCS#8 key with a freshly issued certificate.
    pub fn from_pkcs8(der: &[u8]) -> Result<Self> {
        let key_pair = load_key_pair(der)?;
        let certificate = self_signed(&key_pair)?;
        Ok(Self {
            key_pair,
            certificate,
            ephemeral: false,
        })
    }

    /// Signer for a PEM bundle with a `PRIVATE KEY` and an optional `CERTIFICATE`.
    pub fn from_pem(data: &[u8]) -> Result<Self> {
        let blocks = pem::parse_many(data)
            .map_err(|e| Error::Sign(format!("malformed key file: {e}")))?;
        let key = blocks
            .iter()
            .find(|b| b.tag() == PRIVATE_KEY_TAG)
            .ok_or_else(|| Error::Sign(format!("key file has no {PRIVATE_KEY_TAG} block")))?;
        let key_pair = load_key_pair(key.contents())?;

        let certificate = match blocks.iter().find(|b| b.tag() == CERTIFICATE_TAG) {
            Some(block) => CapturedX509Certificate::from_der(block.contents().to_vec())
                .map_err(|e| Error::Sign(format!("rejected certificate: {e}")))?,
            None => {
                log::warn!("Key file has no certificate, issuing one for this build only");
                self_signed(&key_pair)?
            }
        };

        Ok(Self {
            key_pair,
            certificate,
            ephemeral: false,
        })
    }

    /// Load a key file written by [`create_key_file`](Self::create_key_file).
    ///
    /// A bare DER PKCS#8 key is accepted as well.
    pub fn from_key_file(path: &Path) -> Result<Self> {
        let data = std::fs::read(path).fs_context("reading signing key", path)?;
        if data.starts_with(b"-----BEGIN") {
            Self::from_pem(&data)
        } else {
            Self::from_pkcs8(&data)
        }
    }

    /// Fresh key that lives only as long as this signer.
    pub fn generate() -> Result<Self> {
        let mut signer = Self::from_pkcs8(&generate_pkcs8()?)?;
        signer.ephemeral = true;
        log::warn!(
            "No signing key configured, using ephemeral key {}",
            signer.fingerprint()
        );
        Ok(signer)
    }

    /// Generate a key and certificate, write them to `path` and return a signer.
    pub fn create_key_file(path: &Path) -> Result<Self> {
        let der = generate_pkcs8()?;
        let signer = Self::from_pkcs8(&der)?;
        let bundle = pem::encode_many(&[
            pem::Pem::new(PRIVATE_KEY_TAG, der),
            pem::Pem::new(CERTIFICATE_TAG, signer.certificate_der().to_vec()),
        ]);

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).fs_context("creating key directory", parent)?;
        }
        std::fs::write(path, bundle).fs_context("writing signing key", path)?;
        Ok(signer)
    }

    /// Whether the key was generated for this run only.
    pub fn is_ephemeral(&self) -> bool {
        self.ephemeral
    }

    /// DER encoding of the signing certificate.
    pub fn certificate_der(&self) -> &[u8] {
        self.certificate.constructed_data()
    }

    /// Hex SHA-256 of the signing certificate.
    pub fn fingerprint(&self) -> String {
        fingerprint(self.certificate_der())
    }
}

impl PackageSigner for ApkSigner {
    fn block_entry(&self) -> &'static str {
        match self.key_pair {
            InMemorySigningKeyPair::Rsa(..) => super::RSA_BLOCK_ENTRY,
            _ => super::EC_BLOCK_ENTRY,
        }
    }

    fn sign(&self, signature_file: &[u8]) -> Result<Vec<u8>> {
        SignedDataBuilder::default()
            .content_external(signature_file.to_vec())
            .certificate(self.certificate.clone())
            .signer(SignerBuilder::new(&self.key_pair, self.certificate.clone()))
            .build_der()
            .map_err(|e| Error::Sign(format!("building signature block failed: {e}")))
    }
}

/// Hex SHA-256 of a DER certificate.
pub fn fingerprint(certificate_der: &[u8]) -> String {
    hex::encode(Sha256::digest(certificate_der))
}
