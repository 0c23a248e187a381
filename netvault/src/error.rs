//! Error types for netvault.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Main error type for netvault operations.
#[derive(Error, Debug)]
pub enum Error {
    /// SSH transport-level errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Interactive and command-exec session errors
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Binary snapshot protocol errors
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    /// Artifact persistence and change-detection errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Inventory or secrets problems
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Transport layer errors (reachability, SSH connection, authentication).
#[derive(Error, Debug)]
pub enum TransportError {
    /// TCP probe could not reach the SSH port
    #[error("{host}:{port} is unreachable")]
    Unreachable { host: String, port: u16 },

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// SSH key error
    #[error("SSH key error: {0}")]
    Key(String),

    /// Host key does not match the one in known_hosts
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// Host is not in known_hosts and strict checking is enabled
    #[error("Host key for {host}:{port} is unknown")]
    HostKeyUnknown { host: String, port: u16 },

    /// known_hosts could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// Connection setup timed out
    #[error("Connection timed out after {0:?}")]
    Timeout(Duration),
}

/// Session layer errors (prompt detection, privilege, command execution).
#[derive(Error, Debug)]
pub enum SessionError {
    /// No prompt appeared before the deadline
    #[error("Timed out after {0:?} waiting for a prompt")]
    Timeout(Duration),

    /// The enable challenge or the post-enable prompt did not appear
    #[error("Timed out after {timeout:?} waiting for '{expected}' during enable")]
    EnableTimeout { expected: String, timeout: Duration },

    /// Privilege escalation finished in the wrong mode
    #[error("Enable did not reach privileged mode (prompt '{prompt}')")]
    EnableFailed { prompt: String },

    /// Command returned a non-zero exit status or no variant was accepted
    #[error("Command '{command}' failed (exit status {exit_status:?}): {stderr}")]
    CommandFailed {
        command: String,
        exit_status: Option<u32>,
        stderr: String,
    },

    /// Retrieved configuration text failed the sanity check
    #[error("Invalid output: {reason}")]
    InvalidOutput { reason: String },

    /// Channel closed by the remote end while waiting
    #[error("Channel closed")]
    Closed,

    /// SSH protocol error on an open channel
    #[error("Channel SSH error: {0}")]
    Ssh(#[from] russh::Error),
}

/// Binary snapshot protocol errors.
#[derive(Error, Debug)]
pub enum SnapshotError {
    /// Device name would produce an unsafe file name
    #[error("Invalid device name '{name}' for a snapshot")]
    InvalidDeviceName { name: String },

    /// The device rejected the snapshot command
    #[error("Snapshot creation failed (exit status {exit_status:?}): {stderr}")]
    CreateFailed {
        exit_status: Option<u32>,
        stderr: String,
    },

    /// The snapshot file does not exist on the device
    #[error("Snapshot file '{remote}' not found on device")]
    NotFound { remote: String },

    /// The snapshot file exists but is empty
    #[error("Snapshot file '{remote}' is empty on device")]
    Empty { remote: String },

    /// The downloaded file is empty
    #[error("Downloaded snapshot '{}' is empty", path.display())]
    DownloadVerificationFailed { path: PathBuf },

    /// File-transfer channel fault
    #[error("Transfer error: {0}")]
    Transfer(String),
}

/// Artifact persistence errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Filesystem error on a specific path
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Invalid sibling glob pattern
    #[error("Invalid artifact pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    /// Run summary serialization failed
    #[error("Summary serialization failed: {0}")]
    Summary(#[from] serde_json::Error),
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Inventory and secrets errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File could not be read
    #[error("Unable to read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// YAML could not be parsed
    #[error("Unable to parse '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Structurally valid YAML with invalid content
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    /// No credentials for a device's secret reference
    #[error("Secret '{secret_ref}' not found")]
    SecretNotFound { secret_ref: String },
}

/// Closed taxonomy of failure kinds reported per device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    TransportUnreachable,
    AuthenticationFailed,
    ConnectionError,
    SessionTimeout,
    EnableTimeout,
    EnableFailed,
    CommandFailed,
    InvalidOutput,
    InvalidDeviceName,
    SnapshotCreateFailed,
    SnapshotNotFound,
    SnapshotEmpty,
    DownloadVerificationFailed,
    TransferError,
    Storage,
    Configuration,
}

impl ErrorKind {
    /// Snake-case name used in logs and the run summary.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::TransportUnreachable => "transport_unreachable",
            ErrorKind::AuthenticationFailed => "authentication_failed",
            ErrorKind::ConnectionError => "connection_error",
            ErrorKind::SessionTimeout => "session_timeout",
            ErrorKind::EnableTimeout => "enable_timeout",
            ErrorKind::EnableFailed => "enable_failed",
            ErrorKind::CommandFailed => "command_failed",
            ErrorKind::InvalidOutput => "invalid_output",
            ErrorKind::InvalidDeviceName => "invalid_device_name",
            ErrorKind::SnapshotCreateFailed => "snapshot_create_failed",
            ErrorKind::SnapshotNotFound => "snapshot_not_found",
            ErrorKind::SnapshotEmpty => "snapshot_empty",
            ErrorKind::DownloadVerificationFailed => "download_verification_failed",
            ErrorKind::TransferError => "transfer_error",
            ErrorKind::Storage => "storage",
            ErrorKind::Configuration => "configuration",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Classify this error into the per-device failure taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Transport(e) => match e {
                TransportError::Unreachable { .. } => ErrorKind::TransportUnreachable,
                TransportError::AuthenticationFailed { .. } => ErrorKind::AuthenticationFailed,
                TransportError::Ssh(_)
                | TransportError::Key(_)
                | TransportError::HostKeyChanged { .. }
                | TransportError::HostKeyUnknown { .. }
                | TransportError::KnownHosts(_)
                | TransportError::Timeout(_) => ErrorKind::ConnectionError,
            },
            Error::Session(e) => match e {
                SessionError::Timeout(_) => ErrorKind::SessionTimeout,
                SessionError::EnableTimeout { .. } => ErrorKind::EnableTimeout,
                SessionError::EnableFailed { .. } => ErrorKind::EnableFailed,
                SessionError::CommandFailed { .. } => ErrorKind::CommandFailed,
                SessionError::InvalidOutput { .. } => ErrorKind::InvalidOutput,
                SessionError::Closed | SessionError::Ssh(_) => ErrorKind::ConnectionError,
            },
            Error::Snapshot(e) => match e {
                SnapshotError::InvalidDeviceName { .. } => ErrorKind::InvalidDeviceName,
                SnapshotError::CreateFailed { .. } => ErrorKind::SnapshotCreateFailed,
                SnapshotError::NotFound { .. } => ErrorKind::SnapshotNotFound,
                SnapshotError::Empty { .. } => ErrorKind::SnapshotEmpty,
                SnapshotError::DownloadVerificationFailed { .. } => {
                    ErrorKind::DownloadVerificationFailed
                }
                SnapshotError::Transfer(_) => ErrorKind::TransferError,
            },
            Error::Storage(_) => ErrorKind::Storage,
            Error::Config(_) => ErrorKind::Configuration,
        }
    }
}

/// Result type alias using netvault's Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        let err: Error = TransportError::Unreachable {
            host: "10.0.0.1".into(),
            port: 22,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::TransportUnreachable);

        let err: Error = SessionError::Timeout(Duration::from_secs(5)).into();
        assert_eq!(err.kind(), ErrorKind::SessionTimeout);

        let err: Error = SnapshotError::DownloadVerificationFailed {
            path: PathBuf::from("r1.backup.part"),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::DownloadVerificationFailed);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ErrorKind::EnableFailed.to_string(), "enable_failed");
        assert_eq!(
            serde_json::to_string(&ErrorKind::SnapshotEmpty).unwrap(),
            "\"snapshot_empty\""
        );
    }
}
