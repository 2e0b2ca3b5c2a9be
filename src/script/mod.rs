//! Encrypted script format consumed by the on-device runtime loader.
//!
//! An encrypted script is an [`EncryptedScriptHeader`] followed by the
//! AES-256-CBC ciphertext of the script source.

pub mod header;
mod mode;

pub use header::EncryptedScriptHeader;
pub use mode::ExecutionMode;

use crate::crypto::{self, ScriptKey};
use crate::error::{CryptoError, Result};

/// File extensions treated as scripts (encrypted rather than copied).
pub const SCRIPT_EXTENSIONS: &[&str] = &["js"];

/// Whether a path names a script by its extension.
pub fn is_script(path: &std::path::Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| SCRIPT_EXTENSIONS.iter().any(|s| ext.eq_ignore_ascii_case(s)))
}

/// Encrypt a script, sniffing its execution mode from the plaintext.
///
/// Returns `header ++ ciphertext`.
pub fn encrypt_script(plain: &[u8], key: &ScriptKey) -> Result<Vec<u8>> {
    let mode = ExecutionMode::sniff_bytes(plain);
    encrypt_script_with_mode(plain, mode, key)
}

/// Encrypt a script with an explicit execution mode.
pub fn encrypt_script_with_mode(
    plain: &[u8],
    mode: ExecutionMode,
    key: &ScriptKey,
) -> Result<Vec<u8>> {
    let sealed = crypto::encrypt(plain, key)?;
    let mut out = Vec::with_capacity(header::HEADER_LEN + sealed.len());
    out.extend_from_slice(&EncryptedScriptHeader::new(mode).to_bytes());
    out.extend_from_slice(&sealed);
    Ok(out)
}

/// Split an encrypted script into its header and decrypted plaintext.
pub fn decrypt_script(bytes: &[u8], key: &ScriptKey) -> Result<(ExecutionMode, Vec<u8>)> {
    let header = EncryptedScriptHeader::parse(bytes).ok_or(CryptoError::BadHeader)?;
    let plain = crypto::decrypt(&bytes[header::HEADER_LEN..], key)?;
    Ok((header.mode, plain))
}
