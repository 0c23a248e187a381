//! Machine-readable run summary.
//!
//! One JSON document per run at `{root}/summary/run_{run_id}.json` with run
//! totals and a per-device, per-task breakdown.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use serde::Serialize;

use crate::backup::{DeviceBackup, DeviceRun, TaskFailure, TextBackup};
use crate::diff::ChangeState;
use crate::error::{ErrorKind, Result, StorageError};
use crate::platform::Vendor;
use crate::session::SnapshotArtifact;

/// Final state of one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Success,
    Failed,
    Skipped,
}

/// Result of one task (`running_config`, `export`, `system_backup`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskSummary {
    pub performed: bool,
    pub saved_path: Option<PathBuf>,
    pub size_bytes: Option<u64>,
    pub config_changed: Option<ChangeState>,
    pub lines_added: Option<usize>,
    pub lines_removed: Option<usize>,
    pub diff_path: Option<PathBuf>,
    pub error: Option<String>,
}

impl TaskSummary {
    fn failed(failure: &TaskFailure) -> Self {
        Self {
            performed: true,
            saved_path: None,
            size_bytes: None,
            config_changed: None,
            lines_added: None,
            lines_removed: None,
            diff_path: None,
            error: Some(failure.message.clone()),
        }
    }

    fn from_text(text: &TextBackup) -> Self {
        let compared = text.outcome.config_changed != ChangeState::Unknown;
        Self {
            performed: true,
            saved_path: Some(text.artifact.path.clone()),
            size_bytes: Some(text.artifact.size),
            config_changed: Some(text.outcome.config_changed),
            lines_added: compared.then_some(text.outcome.added),
            lines_removed: compared.then_some(text.outcome.removed),
            diff_path: text.diff_path.clone(),
            error: None,
        }
    }

    fn from_snapshot(artifact: &SnapshotArtifact) -> Self {
        Self {
            performed: true,
            saved_path: Some(artifact.path.clone()),
            size_bytes: Some(artifact.size),
            config_changed: None,
            lines_added: None,
            lines_removed: None,
            diff_path: None,
            error: None,
        }
    }
}

/// Per-device entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceSummary {
    pub name: String,
    pub vendor: Vendor,
    pub status: DeviceStatus,
    pub error: Option<String>,
    pub error_kind: Option<ErrorKind>,
    pub tasks: BTreeMap<String, TaskSummary>,
}

impl DeviceSummary {
    /// A device that was never attempted.
    pub fn skipped(name: &str, vendor: Vendor, reason: &TaskFailure) -> Self {
        Self {
            name: name.to_string(),
            vendor,
            status: DeviceStatus::Skipped,
            error: Some(reason.message.clone()),
            error_kind: Some(reason.kind),
            tasks: BTreeMap::new(),
        }
    }

    /// Summarize a device run.
    pub fn from_run(run: &DeviceRun) -> Self {
        let text_task = match run.vendor {
            Vendor::Cisco => "running_config",
            Vendor::Mikrotik => "export",
        };
        let mut tasks = BTreeMap::new();

        match &run.result {
            Err(e) => {
                let failure = TaskFailure::from(e);
                tasks.insert(text_task.to_string(), TaskSummary::failed(&failure));
                Self {
                    name: run.device.clone(),
                    vendor: run.vendor,
                    status: DeviceStatus::Failed,
                    error: Some(failure.message),
                    error_kind: Some(failure.kind),
                    tasks,
                }
            }
            Ok(backup) => {
                tasks.insert(text_task.to_string(), TaskSummary::from_text(&backup.text));
                let failure = snapshot_task(backup, &mut tasks);
                Self {
                    name: run.device.clone(),
                    vendor: run.vendor,
                    status: if failure.is_some() {
                        DeviceStatus::Failed
                    } else {
                        DeviceStatus::Success
                    },
                    error: failure.map(|f| f.message.clone()),
                    error_kind: failure.map(|f| f.kind),
                    tasks,
                }
            }
        }
    }
}

fn snapshot_task<'a>(
    backup: &'a DeviceBackup,
    tasks: &mut BTreeMap<String, TaskSummary>,
) -> Option<&'a TaskFailure> {
    let snapshot = backup.snapshot.as_ref()?;
    let (task, failure) = match snapshot {
        Ok(artifact) => (TaskSummary::from_snapshot(artifact), None),
        Err(failure) => (TaskSummary::failed(failure), Some(failure)),
    };
    tasks.insert("system_backup".to_string(), task);
    failure
}

/// Run-level counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunTotals {
    pub devices_total: usize,
    pub devices_processed: usize,
    pub devices_success: usize,
    pub devices_failed: usize,
    pub backups_created: usize,
    pub configs_changed: usize,
}

/// The serialized document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub timestamp: String,
    pub dry_run: bool,
    pub totals: RunTotals,
    pub devices: Vec<DeviceSummary>,
}

impl RunSummary {
    pub fn new(run_id: impl Into<String>, timestamp: impl Into<String>, dry_run: bool) -> Self {
        Self {
            run_id: run_id.into(),
            timestamp: timestamp.into(),
            dry_run,
            totals: RunTotals::default(),
            devices: Vec::new(),
        }
    }

    pub fn set_devices_total(&mut self, total: usize) {
        self.totals.devices_total = total;
    }

    /// Record a device and update the totals.
    pub fn add_device(&mut self, device: DeviceSummary) {
        match device.status {
            DeviceStatus::Success => {
                self.totals.devices_processed += 1;
                self.totals.devices_success += 1;
            }
            DeviceStatus::Failed => {
                self.totals.devices_processed += 1;
                self.totals.devices_failed += 1;
            }
            DeviceStatus::Skipped => {}
        }
        for task in device.tasks.values() {
            if task.performed && task.saved_path.is_some() {
                self.totals.backups_created += 1;
            }
            if task.config_changed == Some(ChangeState::Changed) {
                self.totals.configs_changed += 1;
            }
        }
        self.devices.push(device);
    }

    /// Process exit status: 0 when nothing failed, 2 when every processed
    /// device failed, 1 otherwise.
    pub fn exit_code(&self) -> u8 {
        let totals = &self.totals;
        if totals.devices_failed == 0 {
            0
        } else if totals.devices_success == 0 {
            2
        } else {
            1
        }
    }

    /// Write the summary under `{root}/summary/`.
    pub fn save(&self, root: &Path) -> Result<PathBuf> {
        let dir = root.join("summary");
        fs::create_dir_all(&dir).map_err(|e| StorageError::io(&dir, e))?;
        let path = dir.join(format!("run_{}.json", self.run_id));
        let body = serde_json::to_string_pretty(self).map_err(StorageError::from)?;
        fs::write(&path, body).map_err(|e| StorageError::io(&path, e))?;
        info!("run summary saved path={}", path.display());
        Ok(path)
    }
}
