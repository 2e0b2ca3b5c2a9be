//! Per-build identity stored in the project descriptor.

use serde::{Deserialize, Serialize};

/// Identity of a single build.
///
/// `build_number` never decreases for a project. `build_id` is regenerated on
/// every build and feeds the script iv, so it is not reused across builds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    /// Opaque id, unique per build invocation
    #[serde(alias = "build_id")]
    pub build_id: String,
    /// Monotonic per-project build counter
    #[serde(alias = "build_number")]
    pub build_number: u64,
    /// Milliseconds since the Unix epoch when the build was generated
    #[serde(default, alias = "build_time")]
    pub build_time: i64,
}

impl BuildInfo {
    /// Generate fresh build info for the given build number.
    pub fn generate(build_number: u64) -> Self {
        let nonce = uuid::Uuid::new_v4().simple().to_string();
        let build_id = format!("{}-{}", nonce[..8].to_uppercase(), build_number);
        Self {
            build_id,
            build_number,
            build_time: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Build info for the build following this one.
    pub fn next(&self) -> Self {
        Self::generate(self.build_number.saturating_add(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_before_first_build() {
        let info = BuildInfo::default();
        assert_eq!(info.build_number, 0);
        assert!(info.build_id.is_empty());
        assert_eq!(info.next().build_number, 1);
    }

    #[test]
    fn test_next_increments_and_regenerates_id() {
        let first = BuildInfo::generate(7);
        let second = first.next();
        assert_eq!(second.build_number, 8);
        assert_ne!(first.build_id, second.build_id);
        assert!(second.build_id.ends_with("-8"));
    }

    #[test]
    fn test_reads_snake_case_keys() {
        let info: BuildInfo =
            serde_json::from_str(r#"{"build_id":"ABC-3","build_number":3,"build_time":1}"#)
                .unwrap();
        assert_eq!(info.build_number, 3);
        assert_eq!(info.build_id, "ABC-3");
    }
}
