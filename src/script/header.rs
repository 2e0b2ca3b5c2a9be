//! Encrypted script file header.
//!
//! Layout (8 bytes, no length prefix):
//!
//! | offset | size | field |
//! |--------|------|-------|
//! | 0 | 6 | magic `77 01 17 7F 12 12` |
//! | 6 | 2 | execution mode flags, big-endian i16 |
//!
//! Ciphertext follows immediately; its length is the file size minus 8.

use crate::script::ExecutionMode;

/// Header magic.
pub const MAGIC: [u8; 6] = [0x77, 0x01, 0x17, 0x7f, 0x12, 0x12];

/// Total header length in bytes.
pub const HEADER_LEN: usize = 8;

/// Header prepended to every encrypted script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncryptedScriptHeader {
    /// How the runtime should run the decrypted script
    pub mode: ExecutionMode,
}

impl EncryptedScriptHeader {
    /// Header for the given mode.
    pub fn new(mode: ExecutionMode) -> Self {
        Self { mode }
    }

    /// Encode to bytes.
    pub fn to_bytes(self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[..6].copy_from_slice(&MAGIC);
        out[6..].copy_from_slice(&self.mode.bits().to_be_bytes());
        out
    }

    /// Decode from the start of `bytes`.
    ///
    /// Returns `None` when the magic does not match.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < HEADER_LEN || bytes[..6] != MAGIC {
            return None;
        }
        let flags = i16::from_be_bytes([bytes[6], bytes[7]]);
        Some(Self {
            mode: ExecutionMode::from_bits(flags),
        })
    }
}
