//! Script key derivation.

use crate::project::ProjectDescriptor;

/// AES-256 key and CBC iv for a project's scripts.
///
/// Both are ASCII hex text of MD5 digests, which is what the runtime loader
/// derives on the device from the bundled descriptor.
#[derive(Clone, PartialEq, Eq)]
pub struct ScriptKey {
    key: [u8; 32],
    iv: [u8; 16],
}

impl std::fmt::Debug for ScriptKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptKey").finish_non_exhaustive()
    }
}

fn md5_hex(input: &str) -> String {
    format!("{:x}", md5::compute(input.as_bytes()))
}

impl ScriptKey {
    /// Derive key and iv.
    ///
    /// `key = md5hex(package_name ++ version_name ++ main_script_file)`,
    /// `iv = md5hex(build_id ++ project_name)[..16]`.
    pub fn derive(
        package_name: &str,
        version_name: &str,
        main_script_file: &str,
        build_id: &str,
        project_name: &str,
    ) -> Self {
        let key_hex = md5_hex(&format!("{package_name}{version_name}{main_script_file}"));
        let iv_hex = md5_hex(&format!("{build_id}{project_name}"));

        let mut key = [0u8; 32];
        key.copy_from_slice(key_hex.as_bytes());
        let mut iv = [0u8; 16];
        iv.copy_from_slice(&iv_hex.as_bytes()[..16]);
        Self { key, iv }
    }

    /// Derive from a descriptor using its current build info.
    pub fn for_descriptor(descriptor: &ProjectDescriptor) -> Self {
        Self::derive(
            &descriptor.package_name,
            &descriptor.version_name,
            &descriptor.main_script_file,
            &descriptor.build_info.build_id,
            &descriptor.name,
        )
    }

    /// Cipher key bytes
    pub fn key(&self) -> &[u8; 32] {
        &self.key
    }

    /// Initialization vector bytes
    pub fn iv(&self) -> &[u8; 16] {
        &self.iv
    }
}
