//! In-memory fakes for session tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::channel::ShellChannel;
use crate::error::{Result, SessionError, SnapshotError};
use crate::transport::ExecOutput;

use super::{CommandRunner, FileTransfer, TransferOpener};

/// Shell that answers the n-th write with the n-th scripted reply.
///
/// Replies are queued as separate chunks so prompt detection sees the same
/// fragmentation a real PTY produces. Once the queue drains, `read` blocks
/// forever unless `then_eof` was set.
#[derive(Default)]
pub(crate) struct ScriptedShell {
    replies: VecDeque<Vec<Vec<u8>>>,
    pending: VecDeque<Vec<u8>>,
    sent: Vec<String>,
    eof: bool,
    fail_close: bool,
    close_calls: usize,
}

impl ScriptedShell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_write(mut self, chunks: &[&str]) -> Self {
        self.replies
            .push_back(chunks.iter().map(|c| c.as_bytes().to_vec()).collect());
        self
    }

    pub fn then_eof(mut self) -> Self {
        self.eof = true;
        self
    }

    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.clone()
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls
    }
}

impl ShellChannel for ScriptedShell {
    async fn write(&mut self, data: &[u8]) -> Result<()> {
        self.sent.push(String::from_utf8_lossy(data).into_owned());
        if let Some(reply) = self.replies.pop_front() {
            self.pending.extend(reply);
        }
        Ok(())
    }

    async fn read(&mut self) -> Result<Option<Vec<u8>>> {
        if let Some(chunk) = self.pending.pop_front() {
            return Ok(Some(chunk));
        }
        if self.eof {
            return Ok(None);
        }
        std::future::pending::<()>().await;
        Ok(None)
    }

    async fn close(&mut self) -> Result<()> {
        self.close_calls += 1;
        if self.fail_close {
            return Err(SessionError::Closed.into());
        }
        Ok(())
    }
}

/// Exec runner with canned responses per command.
#[derive(Default)]
pub(crate) struct FakeRunner {
    responses: HashMap<String, ExecOutput>,
    timeouts: HashSet<String>,
    commands: Vec<String>,
    transfer: Option<FakeTransfer>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, command: &str, output: ExecOutput) -> Self {
        self.responses.insert(command.to_string(), output);
        self
    }

    /// Running `command` fails with a session timeout.
    pub fn time_out(mut self, command: &str) -> Self {
        self.timeouts.insert(command.to_string());
        self
    }

    pub fn with_transfer(mut self, transfer: FakeTransfer) -> Self {
        self.transfer = Some(transfer);
        self
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.clone()
    }
}

impl CommandRunner for FakeRunner {
    async fn run(&mut self, command: &str) -> Result<ExecOutput> {
        self.commands.push(command.to_string());
        if self.timeouts.contains(command) {
            return Err(SessionError::Timeout(Duration::from_secs(5)).into());
        }
        Ok(self
            .responses
            .get(command)
            .cloned()
            .unwrap_or_else(|| ExecOutput {
                stdout: String::new(),
                stderr: "bad command name".to_string(),
                exit_status: Some(1),
            }))
    }
}

impl TransferOpener for FakeRunner {
    type Transfer = FakeTransfer;

    async fn open_transfer(&mut self) -> Result<FakeTransfer> {
        self.transfer
            .take()
            .ok_or_else(|| SnapshotError::Transfer("sftp subsystem unavailable".into()).into())
    }
}

#[derive(Default)]
struct TransferState {
    removed: Vec<String>,
    closed: bool,
}

/// Shared view of what a [`FakeTransfer`] did after it was moved.
#[derive(Clone, Default)]
pub(crate) struct TransferLog(Arc<Mutex<TransferState>>);

impl TransferLog {
    pub fn removed(&self) -> Vec<String> {
        self.0.lock().unwrap().removed.clone()
    }

    pub fn closed(&self) -> bool {
        self.0.lock().unwrap().closed
    }
}

/// In-memory remote filesystem.
#[derive(Default)]
pub(crate) struct FakeTransfer {
    files: HashMap<String, Vec<u8>>,
    truncate_downloads: bool,
    fail_remove: bool,
    log: TransferLog,
}

impl FakeTransfer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, name: &str, data: &[u8]) -> Self {
        self.files.insert(name.to_string(), data.to_vec());
        self
    }

    /// Downloads succeed but write nothing locally.
    pub fn truncating_downloads(mut self) -> Self {
        self.truncate_downloads = true;
        self
    }

    pub fn failing_remove(mut self) -> Self {
        self.fail_remove = true;
        self
    }

    pub fn log(&self) -> TransferLog {
        self.log.clone()
    }
}

impl FileTransfer for FakeTransfer {
    async fn remote_size(&mut self, remote: &str) -> Result<Option<u64>> {
        Ok(self.files.get(remote).map(|data| data.len() as u64))
    }

    async fn download(&mut self, remote: &str, local: &Path) -> Result<u64> {
        let data = self
            .files
            .get(remote)
            .ok_or_else(|| SnapshotError::Transfer(format!("no such file {remote}")))?;
        let data: &[u8] = if self.truncate_downloads { &[] } else { data };
        std::fs::write(local, data).map_err(|e| SnapshotError::Transfer(e.to_string()))?;
        Ok(data.len() as u64)
    }

    async fn remove(&mut self, remote: &str) -> Result<()> {
        if self.fail_remove {
            return Err(SnapshotError::Transfer("permission denied".into()).into());
        }
        self.files.remove(remote);
        self.log.0.lock().unwrap().removed.push(remote.to_string());
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.log.0.lock().unwrap().closed = true;
        Ok(())
    }
}
