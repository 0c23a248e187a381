//! Vendor definitions for multi-vendor support.
//!
//! Each vendor decides how its configuration is retrieved, how artifacts
//! are named on disk, and which structural markers a valid capture must
//! contain.

pub mod vendors;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Supported device families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vendor {
    /// Interactive shell with prompt detection and enable escalation.
    Cisco,
    /// Command-exec channel plus SFTP binary snapshots.
    Mikrotik,
}

impl Vendor {
    /// Directory name and log label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Vendor::Cisco => "cisco",
            Vendor::Mikrotik => "mikrotik",
        }
    }

    /// `kind` component of text artifact file names.
    pub fn artifact_kind(&self) -> &'static str {
        match self {
            Vendor::Cisco => "running-config",
            Vendor::Mikrotik => "export",
        }
    }

    /// Extension of text artifacts.
    pub fn artifact_extension(&self) -> &'static str {
        match self {
            Vendor::Cisco => "txt",
            Vendor::Mikrotik => "rsc",
        }
    }

    /// Glob matching every text artifact of this vendor in a device directory.
    pub fn artifact_pattern(&self) -> String {
        format!("*_{}.{}", self.artifact_kind(), self.artifact_extension())
    }

    /// Whether text artifacts carry the `# key: value` metadata header.
    pub fn writes_metadata_header(&self) -> bool {
        matches!(self, Vendor::Mikrotik)
    }

    /// Whether the retrieved text contains at least one structural marker.
    pub fn has_structural_marker(&self, text: &str) -> bool {
        match self {
            Vendor::Cisco => vendors::cisco_ios::has_structural_marker(text),
            Vendor::Mikrotik => vendors::mikrotik::has_structural_marker(text),
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_patterns() {
        assert_eq!(Vendor::Cisco.artifact_pattern(), "*_running-config.txt");
        assert_eq!(Vendor::Mikrotik.artifact_pattern(), "*_export.rsc");
    }

    #[test]
    fn test_vendor_serde() {
        let vendor: Vendor = serde_yaml::from_str("mikrotik").unwrap();
        assert_eq!(vendor, Vendor::Mikrotik);
        assert_eq!(serde_json::to_string(&Vendor::Cisco).unwrap(), "\"cisco\"");
    }
}
