//! Device sessions built on top of the transport.
//!
//! - [`InteractiveSession`] drives a PTY shell with prompt detection and
//!   enable escalation.
//! - [`CommandRunner`] executes one-shot commands on exec channels.
//! - [`SnapshotFetcher`] creates, downloads and cleans up binary snapshots
//!   over a [`FileTransfer`].

mod exec;
mod interactive;
mod output;
mod snapshot;

#[cfg(test)]
pub(crate) mod testing;

pub use exec::{CommandRunner, fetch_export, run_first_accepted};
pub use interactive::{
    EnableOutcome, InteractiveSession, SessionEvent, SessionState, fetch_running_config,
};
pub use output::{extract_command_output, validate_config_text};
pub use snapshot::{FileTransfer, SnapshotArtifact, SnapshotFetcher, TransferOpener};
