//! SSH transport layer wrapping russh.
//!
//! This module provides reachability probing, connection setup and
//! authentication, and the three channel kinds the sessions need:
//! an interactive PTY shell, one-shot command exec, and SFTP.

pub mod config;
mod probe;
mod ssh;

pub use config::{AuthMethod, DEFAULT_TIMEOUT, HostKeyVerification, SshConfig};
pub use probe::probe;
pub use ssh::{ExecOutput, SftpTransfer, SshTransport};
