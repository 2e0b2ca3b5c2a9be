//! Script encryption primitives.
//!
//! Keys are derived deterministically from descriptor fields (see
//! [`ScriptKey::derive`]); the iv depends on the per-build id, so ciphertext of
//! an unchanged script differs from build to build.

pub mod cipher;
mod key;

pub use cipher::{decrypt, encrypt};
pub use key::ScriptKey;
