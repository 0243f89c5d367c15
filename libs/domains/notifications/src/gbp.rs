//! Build types handed to us by the build publisher when a signal fires.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A build of a machine, as reported by the publisher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Build {
    pub machine: String,
    pub build_id: String,
    #[serde(default)]
    pub keep: bool,
    #[serde(default)]
    pub submitted: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed: Option<DateTime<Utc>>,
    #[serde(default)]
    pub built: Option<DateTime<Utc>>,
    /// Build notes. Can be large.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Build logs. Can be very large.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs: Option<String>,
}

impl Build {
    pub fn new(machine: impl Into<String>, build_id: impl Into<String>) -> Self {
        Self {
            machine: machine.into(),
            build_id: build_id.into(),
            keep: false,
            submitted: None,
            completed: None,
            built: None,
            note: None,
            logs: None,
        }
    }
}

/// A binary package produced by a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub cpv: String,
    pub repo: String,
    pub path: String,
    pub build_id: u64,
    pub size: u64,
    pub build_time: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMetadata {
    pub total: u64,
    pub size: u64,
    pub built: Vec<Package>,
}

/// Metadata the publisher attaches to a pulled build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GbpMetadata {
    pub build_duration: u64,
    pub packages: PackageMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_serialization_omits_empty_logs_and_note() {
        let build = Build::new("babette", "25");
        let value = serde_json::to_value(&build).unwrap();

        assert_eq!(value["machine"], "babette");
        assert_eq!(value["build_id"], "25");
        assert!(value.get("logs").is_none());
        assert!(value.get("note").is_none());
    }

    #[test]
    fn test_gbp_metadata_deserializes() {
        let json = serde_json::json!({
            "build_duration": 600,
            "packages": {
                "total": 1,
                "size": 50,
                "built": [{
                    "cpv": "sys-kernel/vanilla-sources-6.6.7",
                    "repo": "gentoo",
                    "path": "/path/to/binary.tar.xz",
                    "build_id": 1,
                    "size": 50,
                    "build_time": 0
                }]
            }
        });

        let meta: GbpMetadata = serde_json::from_value(json).unwrap();
        assert_eq!(meta.packages.built[0].cpv, "sys-kernel/vanilla-sources-6.6.7");
    }
}
