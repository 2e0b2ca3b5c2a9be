//! AES-256-CBC with PKCS#7 padding.

use crate::crypto::ScriptKey;
use crate::error::{CryptoError, Result};
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Encrypt `plain` under `key`.
pub fn encrypt(plain: &[u8], key: &ScriptKey) -> Result<Vec<u8>> {
    let cipher = Aes256CbcEnc::new_from_slices(key.key(), key.iv())
        .map_err(|e| CryptoError::Init(e.to_string()))?;
    Ok(cipher.encrypt_padded_vec_mut::<Pkcs7>(plain))
}

/// Decrypt `cipher_bytes` under `key`.
pub fn decrypt(cipher_bytes: &[u8], key: &ScriptKey) -> Result<Vec<u8>> {
    let cipher = Aes256CbcDec::new_from_slices(key.key(), key.iv())
        .map_err(|e| CryptoError::Init(e.to_string()))?;
    let plain = cipher
        .decrypt_padded_vec_mut::<Pkcs7>(cipher_bytes)
        .map_err(|e| CryptoError::Padding(e.to_string()))?;
    Ok(plain)
}
