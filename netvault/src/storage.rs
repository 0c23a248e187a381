//! Backup artifact layout and persistence.
//!
//! Every artifact lives at `{root}/{vendor}/{device}/{file}` and its file
//! name embeds a UTC timestamp with second precision. Artifacts are written
//! once and never modified or deleted here.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use log::debug;

use crate::error::{Result, StorageError};
use crate::platform::Vendor;

/// `chrono` format of artifact timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H%M%S";

/// First line of the metadata header.
pub const METADATA_MARKER: &str = "# backup_metadata";

/// Current UTC time as an artifact timestamp.
pub fn timestamp_now() -> String {
    Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Whether `name` can be used as a single path component on both the
/// device and the backup host.
pub fn is_safe_file_name(name: &str) -> bool {
    !(name.is_empty()
        || name == "."
        || name == ".."
        || name
            .chars()
            .any(|c| c.is_whitespace() || c == '/' || c == '\\'))
}

/// Leading `# key: value` comment block written before exported text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataHeader {
    pub device: String,
    pub vendor: Vendor,
    pub model: Option<String>,
    pub host: String,
    pub backup_time: String,
}

impl MetadataHeader {
    /// Render the block, terminated by a blank line. Absent fields are
    /// omitted.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(METADATA_MARKER);
        out.push('\n');
        let fields = [
            ("device", Some(self.device.as_str())),
            ("vendor", Some(self.vendor.as_str())),
            ("model", self.model.as_deref()),
            ("host", Some(self.host.as_str())),
            ("backup_time", Some(self.backup_time.as_str())),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                let _ = writeln!(out, "# {}: {}", key, value);
            }
        }
        out.push('\n');
        out
    }
}

/// A text artifact written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedArtifact {
    pub path: PathBuf,
    pub size: u64,
}

/// Resolves artifact paths under a backup root and writes text artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `{root}/{vendor}/{device}`
    pub fn device_dir(&self, vendor: Vendor, device: &str) -> PathBuf {
        self.root.join(vendor.as_str()).join(device)
    }

    /// `{root}/summary`
    pub fn summary_dir(&self) -> PathBuf {
        self.root.join("summary")
    }

    /// `{timestamp}_{kind}.{ext}`
    pub fn text_artifact_name(vendor: Vendor, timestamp: &str) -> String {
        format!(
            "{}_{}.{}",
            timestamp,
            vendor.artifact_kind(),
            vendor.artifact_extension()
        )
    }

    pub fn text_artifact_path(&self, vendor: Vendor, device: &str, timestamp: &str) -> PathBuf {
        self.device_dir(vendor, device)
            .join(Self::text_artifact_name(vendor, timestamp))
    }

    /// Write a text artifact, creating parent directories as needed.
    ///
    /// The file ends with exactly one newline.
    pub fn save_text(
        &self,
        vendor: Vendor,
        device: &str,
        timestamp: &str,
        body: &str,
        header: Option<&MetadataHeader>,
    ) -> Result<SavedArtifact> {
        let path = self.text_artifact_path(vendor, device, timestamp);
        let dir = self.device_dir(vendor, device);
        fs::create_dir_all(&dir).map_err(|e| StorageError::io(&dir, e))?;

        let mut content = header.map(MetadataHeader::render).unwrap_or_default();
        content.push_str(body.trim_end_matches(['\r', '\n']));
        content.push('\n');

        fs::write(&path, &content).map_err(|e| StorageError::io(&path, e))?;
        let size = content.len() as u64;
        debug!(
            "device={} saved {} bytes to {}",
            device,
            size,
            path.display()
        );
        Ok(SavedArtifact { path, size })
    }
}
