//! Per-device backup orchestration.
//!
//! One device at a time: probe, connect, retrieve, validate, persist,
//! compare, and for RouterOS pull the binary snapshot. Sessions and the
//! transport are closed on every exit path. A failing device never stops
//! the run.

use std::path::PathBuf;
use std::time::Duration;

use log::{debug, error, info, warn};
use secrecy::SecretString;

use crate::channel::PtyChannel;
use crate::diff::{ChangeState, DiffOutcome, evaluate_change, write_diff};
use crate::error::{Error, ErrorKind, Result, TransportError};
use crate::normalize::comparison_text;
use crate::platform::Vendor;
use crate::session::{
    InteractiveSession, SnapshotArtifact, SnapshotFetcher, fetch_export, fetch_running_config,
    validate_config_text,
};
use crate::storage::{ArtifactStore, MetadataHeader, SavedArtifact, timestamp_now};
use crate::transport::{
    AuthMethod, DEFAULT_TIMEOUT, HostKeyVerification, SshConfig, SshTransport, probe,
};

/// Fully resolved device: inventory entry plus its credentials.
#[derive(Debug, Clone)]
pub struct DeviceDescriptor {
    pub name: String,
    pub vendor: Vendor,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub auth: AuthMethod,
    pub enable_credential: Option<SecretString>,
    pub model: Option<String>,
    /// Pull the binary snapshot after the export (RouterOS only).
    pub system_backup: bool,
}

/// Run-wide settings shared by every device.
#[derive(Debug, Clone)]
pub struct BackupOptions {
    pub root: PathBuf,
    pub timeout: Duration,
    pub host_key_verification: HostKeyVerification,
    pub known_hosts: Option<PathBuf>,
}

impl BackupOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            timeout: DEFAULT_TIMEOUT,
            host_key_verification: HostKeyVerification::default(),
            known_hosts: None,
        }
    }

    pub fn store(&self) -> ArtifactStore {
        ArtifactStore::new(&self.root)
    }

    fn ssh_config(&self, device: &DeviceDescriptor) -> SshConfig {
        let mut config = SshConfig::new(
            device.host.clone(),
            device.port,
            device.username.clone(),
            device.auth.clone(),
        );
        config.timeout = self.timeout;
        config.host_key_verification = self.host_key_verification.clone();
        config.known_hosts_path = self.known_hosts.clone();
        config
    }
}

/// Failure of one task, reduced to what logs and the summary need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&Error> for TaskFailure {
    fn from(err: &Error) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// A persisted text artifact and its comparison with the previous one.
#[derive(Debug, Clone)]
pub struct TextBackup {
    pub artifact: SavedArtifact,
    pub outcome: DiffOutcome,
    pub diff_path: Option<PathBuf>,
}

/// Everything a successful device run produced.
#[derive(Debug, Clone)]
pub struct DeviceBackup {
    pub text: TextBackup,
    /// `None` when no snapshot was requested.
    pub snapshot: Option<std::result::Result<SnapshotArtifact, TaskFailure>>,
}

impl DeviceBackup {
    /// True unless a requested snapshot failed.
    pub fn is_success(&self) -> bool {
        !matches!(self.snapshot, Some(Err(_)))
    }
}

/// Outcome of one device within a run.
#[derive(Debug)]
pub struct DeviceRun {
    pub device: String,
    pub vendor: Vendor,
    pub result: Result<DeviceBackup>,
}

/// Back up every device in order. Errors are logged and recorded per device.
pub async fn run_backups(
    devices: &[DeviceDescriptor],
    options: &BackupOptions,
) -> Vec<DeviceRun> {
    info!("starting backup for {} device(s)", devices.len());
    let mut runs = Vec::with_capacity(devices.len());
    for device in devices {
        let result = backup_device(device, options).await;
        match &result {
            Ok(backup) if backup.is_success() => info!("device={} backup ok", device.name),
            Ok(_) => warn!("device={} backup partially failed", device.name),
            Err(e) => error!(
                "device={} backup failed kind={} error={}",
                device.name,
                e.kind(),
                e
            ),
        }
        runs.push(DeviceRun {
            device: device.name.clone(),
            vendor: device.vendor,
            result,
        });
    }
    runs
}

/// Back up a single device.
pub async fn backup_device(
    device: &DeviceDescriptor,
    options: &BackupOptions,
) -> Result<DeviceBackup> {
    let timestamp = timestamp_now();
    info!(
        "device={} starting backup vendor={} host={}:{}",
        device.name, device.vendor, device.host, device.port
    );

    debug!(
        "device={} checking tcp connectivity timeout={:?}",
        device.name, options.timeout
    );
    if !probe(&device.host, device.port, options.timeout).await {
        error!(
            "device={} tcp_check fail host={} port={}",
            device.name, device.host, device.port
        );
        return Err(TransportError::Unreachable {
            host: device.host.clone(),
            port: device.port,
        }
        .into());
    }
    info!(
        "device={} tcp_check ok host={} port={}",
        device.name, device.host, device.port
    );

    let transport = SshTransport::connect(options.ssh_config(device)).await?;
    debug!("device={} connected as {}", device.name, device.username);

    let result = match device.vendor {
        Vendor::Cisco => backup_cisco(&transport, device, options, &timestamp).await,
        Vendor::Mikrotik => backup_mikrotik(&transport, device, options, &timestamp).await,
    };

    if let Err(e) = transport.close().await {
        debug!("device={} transport close failed: {}", device.name, e);
    }
    debug!("device={} connection closed", device.name);
    result
}

async fn backup_cisco(
    transport: &SshTransport,
    device: &DeviceDescriptor,
    options: &BackupOptions,
    timestamp: &str,
) -> Result<DeviceBackup> {
    let channel = PtyChannel::new(transport.open_shell().await?);
    let mut session = InteractiveSession::new(channel, device.name.as_str(), options.timeout);
    let fetched = fetch_running_config(&mut session, device.enable_credential.as_ref()).await;
    session.close().await;
    let config = fetched?;
    debug!("device={} running-config received bytes={}", device.name, config.len());

    let text = record_text_backup(&options.store(), device, timestamp, &config)?;
    Ok(DeviceBackup {
        text,
        snapshot: None,
    })
}

async fn backup_mikrotik(
    transport: &SshTransport,
    device: &DeviceDescriptor,
    options: &BackupOptions,
    timestamp: &str,
) -> Result<DeviceBackup> {
    let mut runner = transport;
    let export = fetch_export(&mut runner, &device.name).await?;
    validate_config_text(Vendor::Mikrotik, &export)?;
    debug!("device={} export received bytes={}", device.name, export.len());

    let store = options.store();
    let text = record_text_backup(&store, device, timestamp, &export)?;

    if !device.system_backup {
        debug!("device={} system backup disabled", device.name);
        return Ok(DeviceBackup {
            text,
            snapshot: None,
        });
    }

    let fetcher = SnapshotFetcher::new(
        device.name.as_str(),
        store.device_dir(Vendor::Mikrotik, &device.name),
        timestamp,
    );
    let snapshot = match fetcher.fetch(&mut runner).await {
        Ok(artifact) => Ok(artifact),
        Err(e) => {
            error!(
                "device={} system backup failed kind={} error={}",
                device.name,
                e.kind(),
                e
            );
            Err(TaskFailure::from(&e))
        }
    };

    Ok(DeviceBackup {
        text,
        snapshot: Some(snapshot),
    })
}

/// Persist retrieved text, compare it with the previous artifact and write
/// the diff when it changed.
pub fn record_text_backup(
    store: &ArtifactStore,
    device: &DeviceDescriptor,
    timestamp: &str,
    body: &str,
) -> Result<TextBackup> {
    let vendor = device.vendor;
    let header = vendor.writes_metadata_header().then(|| MetadataHeader {
        device: device.name.clone(),
        vendor,
        model: device.model.clone(),
        host: device.host.clone(),
        backup_time: timestamp.to_string(),
    });

    let artifact = store.save_text(vendor, &device.name, timestamp, body, header.as_ref())?;
    info!(
        "device={} backup saved path={} size={}",
        device.name,
        artifact.path.display(),
        artifact.size
    );

    let outcome = evaluate_change(&artifact.path, &vendor.artifact_pattern(), |text| {
        comparison_text(vendor, text)
    })?;
    let diff_path = write_diff(&outcome)?;

    match outcome.config_changed {
        ChangeState::Unknown => info!("device={} no previous backup to compare", device.name),
        ChangeState::Unchanged => info!("device={} config unchanged", device.name),
        ChangeState::Changed => info!(
            "device={} config changed added={} removed={} diff={}",
            device.name,
            outcome.added,
            outcome.removed,
            diff_path
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        ),
    }

    Ok(TextBackup {
        artifact,
        outcome,
        diff_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn device(name: &str, vendor: Vendor, port: u16) -> DeviceDescriptor {
        DeviceDescriptor {
            name: name.into(),
            vendor,
            host: "127.0.0.1".into(),
            port,
            username: "backup".into(),
            auth: AuthMethod::Password(SecretString::from("pw".to_string())),
            enable_credential: None,
            model: Some("RB4011".into()),
            system_backup: true,
        }
    }

    #[test]
    fn test_record_text_backup_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let device = device("r1", Vendor::Mikrotik, 22);

        let first = record_text_backup(
            &store,
            &device,
            "2026-01-01_000000",
            "/interface bridge\nadd name=bridge1\n",
        )
        .unwrap();
        assert_eq!(first.outcome.config_changed, ChangeState::Unknown);
        let content = fs::read_to_string(&first.artifact.path).unwrap();
        assert!(content.starts_with(
            "# backup_metadata\n# device: r1\n# vendor: mikrotik\n# model: RB4011\n"
        ));

        // Force a later mtime than the first artifact
        let past = filetime::FileTime::from_unix_time(1_000, 0);
        filetime::set_file_mtime(&first.artifact.path, past).unwrap();

        let second = record_text_backup(
            &store,
            &device,
            "2026-01-02_000000",
            "/interface bridge\nadd name=bridge1\n/system ntp client\nset enabled=yes\n",
        )
        .unwrap();
        assert_eq!(second.outcome.config_changed, ChangeState::Changed);
        assert_eq!((second.outcome.added, second.outcome.removed), (2, 0));
        let diff_path = second.diff_path.unwrap();
        assert_eq!(
            diff_path,
            dir.path().join("mikrotik/r1/2026-01-02_000000_export.diff")
        );
    }

    #[test]
    fn test_cisco_artifacts_have_no_header() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let device = device("R1", Vendor::Cisco, 22);

        let backup = record_text_backup(&store, &device, "2026-01-01_000000", "version 15.2\n!")
            .unwrap();
        assert_eq!(
            fs::read_to_string(&backup.artifact.path).unwrap(),
            "version 15.2\n!\n"
        );
        assert!(backup.diff_path.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_device_fails_fast() {
        // Bind then drop to get a port nothing listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let dir = tempfile::tempdir().unwrap();
        let mut options = BackupOptions::new(dir.path());
        options.timeout = Duration::from_millis(500);

        let runs = run_backups(&[device("r1", Vendor::Mikrotik, port)], &options).await;
        assert_eq!(runs.len(), 1);
        let err = runs[0].result.as_ref().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransportUnreachable);
        assert!(!dir.path().join("mikrotik").exists());
    }

    #[test]
    fn test_snapshot_failure_marks_device_failed() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let device = device("r1", Vendor::Mikrotik, 22);
        let text =
            record_text_backup(&store, &device, "2026-01-01_000000", "/ip address\n").unwrap();

        let backup = DeviceBackup {
            text,
            snapshot: Some(Err(TaskFailure {
                kind: ErrorKind::SnapshotEmpty,
                message: "empty".into(),
            })),
        };
        assert!(!backup.is_success());
    }
}
