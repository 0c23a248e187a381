//! # Netvault
//!
//! Async SSH configuration backup for network devices.
//!
//! Netvault connects to each device in an inventory, retrieves its
//! configuration, stores it as a timestamped artifact and reports whether
//! it changed since the previous backup.
//!
//! ## Features
//!
//! - Async SSH connections via russh, SFTP via russh-sftp
//! - Interactive shell sessions with prompt detection, enable escalation
//!   and paging suppression (Cisco IOS)
//! - Exec-channel exports with variant fallback plus binary system backups
//!   pulled over SFTP (MikroTik RouterOS)
//! - Vendor-aware normalization, SHA-256 change detection and unified diffs
//! - JSON run summaries
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use netvault::{AuthMethod, BackupOptions, DeviceDescriptor, Vendor, backup_device};
//! use secrecy::SecretString;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), netvault::Error> {
//!     let device = DeviceDescriptor {
//!         name: "core-sw1".into(),
//!         vendor: Vendor::Cisco,
//!         host: "192.0.2.1".into(),
//!         port: 22,
//!         username: "backup".into(),
//!         auth: AuthMethod::Password(SecretString::from("secret".to_string())),
//!         enable_credential: None,
//!         model: None,
//!         system_backup: false,
//!     };
//!
//!     let backup = backup_device(&device, &BackupOptions::new("backups")).await?;
//!     println!("saved {}", backup.text.artifact.path.display());
//!     Ok(())
//! }
//! ```

pub mod backup;
pub mod channel;
pub mod diff;
pub mod error;
pub mod inventory;
pub mod logging;
pub mod normalize;
pub mod platform;
pub mod session;
pub mod storage;
pub mod summary;
pub mod transport;

// Re-export main types for convenience
pub use backup::{
    BackupOptions, DeviceBackup, DeviceDescriptor, DeviceRun, TaskFailure, TextBackup,
    backup_device, run_backups,
};
pub use diff::{ChangeState, DiffOutcome, evaluate_change};
pub use error::{Error, ErrorKind, Result};
pub use inventory::{DeviceEntry, SecretEntry, Secrets, load_inventory};
pub use normalize::{comparison_text, normalize};
pub use platform::Vendor;
pub use storage::{ArtifactStore, timestamp_now};
pub use summary::{DeviceStatus, DeviceSummary, RunSummary};
pub use transport::{AuthMethod, HostKeyVerification, SshConfig};
