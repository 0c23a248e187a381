//! Binary snapshot retrieval: create on device, verify, download, clean up.

use std::future::Future;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use super::exec::CommandRunner;
use crate::error::{Result, SnapshotError, StorageError};
use crate::platform::vendors::mikrotik;
use crate::storage::is_safe_file_name;

/// File operations on the device's filesystem.
pub trait FileTransfer: Send {
    /// Size of a remote file, `None` when it does not exist.
    fn remote_size(&mut self, remote: &str) -> impl Future<Output = Result<Option<u64>>> + Send;

    /// Copy a remote file to `local`, returning the bytes written.
    fn download(&mut self, remote: &str, local: &Path)
    -> impl Future<Output = Result<u64>> + Send;

    /// Delete a remote file.
    fn remove(&mut self, remote: &str) -> impl Future<Output = Result<()>> + Send;

    /// End the transfer session.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// A command runner that can also open a file-transfer session on the same
/// connection.
pub trait TransferOpener: CommandRunner {
    type Transfer: FileTransfer;

    fn open_transfer(&mut self) -> impl Future<Output = Result<Self::Transfer>> + Send;
}

/// A snapshot stored locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotArtifact {
    pub path: PathBuf,
    pub size: u64,
}

/// Pulls one binary snapshot into a device directory.
#[derive(Debug, Clone)]
pub struct SnapshotFetcher {
    device: String,
    device_dir: PathBuf,
    timestamp: String,
}

impl SnapshotFetcher {
    pub fn new(
        device: impl Into<String>,
        device_dir: impl Into<PathBuf>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            device: device.into(),
            device_dir: device_dir.into(),
            timestamp: timestamp.into(),
        }
    }

    /// Remote file name the device writes.
    pub fn remote_file(&self) -> String {
        mikrotik::snapshot_remote_file(&self.device)
    }

    /// Temporary local path used while downloading.
    pub fn temp_path(&self) -> PathBuf {
        self.device_dir.join(format!("{}.part", self.remote_file()))
    }

    /// Final local path.
    pub fn final_path(&self) -> PathBuf {
        self.device_dir.join(format!(
            "{}_{}.{}",
            self.device,
            self.timestamp,
            mikrotik::SNAPSHOT_EXTENSION
        ))
    }

    /// Run the full snapshot protocol.
    ///
    /// The local file is only renamed into place after the download is
    /// verified non-empty, and the remote copy is only deleted after that.
    /// Failing to delete the remote copy is logged, not returned.
    pub async fn fetch<O: TransferOpener>(&self, opener: &mut O) -> Result<SnapshotArtifact> {
        validate_device_name(&self.device)?;

        let command = mikrotik::snapshot_command(&self.device);
        info!("device={} creating system backup", self.device);
        let output = opener.run(&command).await?;
        let rejected = mikrotik::detect_failure(&output.stdout);
        if output.exit_status != Some(0) || rejected.is_some() {
            let stderr = if output.stderr.trim().is_empty() {
                output.stdout.trim().to_string()
            } else {
                output.stderr.trim().to_string()
            };
            return Err(SnapshotError::CreateFailed {
                exit_status: output.exit_status,
                stderr,
            }
            .into());
        }

        let mut transfer = opener.open_transfer().await?;
        let result = self.pull(&mut transfer).await;
        if let Err(e) = transfer.close().await {
            debug!("device={} transfer close failed: {}", self.device, e);
        }
        result
    }

    async fn pull<T: FileTransfer>(&self, transfer: &mut T) -> Result<SnapshotArtifact> {
        let remote = self.remote_file();

        match transfer.remote_size(&remote).await? {
            None => return Err(SnapshotError::NotFound { remote }.into()),
            Some(0) => return Err(SnapshotError::Empty { remote }.into()),
            Some(size) => debug!("device={} remote {} size={}", self.device, remote, size),
        }

        tokio::fs::create_dir_all(&self.device_dir)
            .await
            .map_err(|e| StorageError::io(&self.device_dir, e))?;

        let temp = self.temp_path();
        transfer.download(&remote, &temp).await?;

        let size = tokio::fs::metadata(&temp)
            .await
            .map_err(|e| StorageError::io(&temp, e))?
            .len();
        if size == 0 {
            if let Err(e) = tokio::fs::remove_file(&temp).await {
                debug!("device={} could not remove {}: {}", self.device, temp.display(), e);
            }
            return Err(SnapshotError::DownloadVerificationFailed { path: temp }.into());
        }

        let target = self.final_path();
        tokio::fs::rename(&temp, &target)
            .await
            .map_err(|e| StorageError::io(&target, e))?;
        info!(
            "device={} saved system backup path={} size={}",
            self.device,
            target.display(),
            size
        );

        if let Err(e) = transfer.remove(&remote).await {
            warn!(
                "device={} could not remove remote {}: {}",
                self.device, remote, e
            );
        }

        Ok(SnapshotArtifact { path: target, size })
    }
}

/// Names become remote and local file names, so they must be a single
/// path component without whitespace.
fn validate_device_name(name: &str) -> Result<()> {
    if !is_safe_file_name(name) {
        return Err(SnapshotError::InvalidDeviceName {
            name: name.to_string(),
        }
        .into());
    }
    Ok(())
}
