//! Interactive shell session for prompt-driven devices.
//!
//! The session is a small state machine over a [`ShellChannel`]:
//!
//! ```text
//! Connecting ──opened──► PromptUnknown ──prompt──► UserMode ──enable──► PrivilegedMode
//!      │                       │                      │                      │
//!      └───────────────────────┴───────── close ──────┴──────────────────────┴──► Closed
//! ```
//!
//! Every wait is bounded by the session timeout: reads are raced against a
//! deadline and the wait fails with a timeout error once it passes.

use std::time::Duration;

use log::{debug, error, info, trace, warn};
use secrecy::{ExposeSecret, SecretString};
use tokio::time::Instant;

use super::output::{extract_command_output, validate_config_text};
use crate::channel::{PromptMode, ShellChannel, TerminalBuffer, extract_prompt};
use crate::error::{Result, SessionError};
use crate::platform::Vendor;
use crate::platform::vendors::cisco_ios;

/// Lifecycle state of an interactive session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    PromptUnknown,
    UserMode,
    PrivilegedMode,
    Closed,
}

/// Inputs that drive [`SessionState`] transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Shell channel is open and a wake-up newline was sent.
    Opened,
    /// A prompt line was recognized in the output.
    Prompt(PromptMode),
    /// The session was closed locally or by the remote end.
    Closed,
}

impl SessionState {
    /// Transition function for the session state machine.
    pub fn next(self, event: SessionEvent) -> SessionState {
        match (self, event) {
            (_, SessionEvent::Closed) | (SessionState::Closed, _) => SessionState::Closed,
            (SessionState::Connecting, SessionEvent::Opened) => SessionState::PromptUnknown,
            (_, SessionEvent::Prompt(PromptMode::User)) => SessionState::UserMode,
            (_, SessionEvent::Prompt(PromptMode::Privileged)) => SessionState::PrivilegedMode,
            (state, SessionEvent::Prompt(PromptMode::Unknown)) | (state, SessionEvent::Opened) => {
                state
            }
        }
    }

    /// Prompt mode implied by this state.
    pub fn mode(&self) -> PromptMode {
        match self {
            SessionState::UserMode => PromptMode::User,
            SessionState::PrivilegedMode => PromptMode::Privileged,
            _ => PromptMode::Unknown,
        }
    }
}

/// What [`InteractiveSession::ensure_enable`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnableOutcome {
    /// Session was already at a `#` prompt; nothing was sent.
    AlreadyPrivileged,
    /// No enable credential configured; nothing was sent.
    Skipped,
    /// Escalation reached privileged mode.
    Escalated,
}

/// Stateful command/response session over an interactive shell.
pub struct InteractiveSession<C: ShellChannel> {
    channel: C,
    buffer: TerminalBuffer,
    timeout: Duration,
    prompt: Option<String>,
    state: SessionState,
    device: String,
}

impl<C: ShellChannel> InteractiveSession<C> {
    /// Wrap an open shell channel. No bytes are exchanged until
    /// [`initialize`](Self::initialize).
    pub fn new(channel: C, device: impl Into<String>, timeout: Duration) -> Self {
        Self {
            channel,
            buffer: TerminalBuffer::new(),
            timeout,
            prompt: None,
            state: SessionState::Connecting,
            device: device.into(),
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Last recognized prompt line.
    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref()
    }

    /// Prompt mode derived from the last prompt.
    pub fn mode(&self) -> PromptMode {
        self.state.mode()
    }

    /// The underlying channel.
    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Wake the shell with a bare newline and wait for the first prompt.
    pub async fn initialize(&mut self) -> Result<()> {
        self.channel.write(b"\n").await?;
        self.state = self.state.next(SessionEvent::Opened);
        self.wait_for_prompt().await?;
        debug!(
            "device={} initial prompt detected prompt={} mode={}",
            self.device,
            self.prompt.as_deref().unwrap_or(""),
            self.mode()
        );
        Ok(())
    }

    /// Send a line (the newline is appended).
    pub async fn send(&mut self, line: &str) -> Result<()> {
        trace!("device={} send {:?}", self.device, line);
        self.write_line(line).await
    }

    async fn send_hidden(&mut self, secret: &str) -> Result<()> {
        trace!("device={} send <hidden>", self.device);
        self.write_line(secret).await
    }

    async fn write_line(&mut self, line: &str) -> Result<()> {
        if self.state == SessionState::Closed {
            return Err(SessionError::Closed.into());
        }
        let mut data = Vec::with_capacity(line.len() + 1);
        data.extend_from_slice(line.as_bytes());
        data.push(b'\n');
        self.channel.write(&data).await
    }

    /// Read until the output ends at a `>` or `#` prompt.
    ///
    /// Returns everything read since the previous wait, prompt included.
    pub async fn wait_for_prompt(&mut self) -> Result<String> {
        match self.read_until(|text| extract_prompt(text).is_some()).await? {
            Some(text) => Ok(text),
            None => Err(SessionError::Timeout(self.timeout).into()),
        }
    }

    /// Send a command and return the raw output up to the next prompt.
    pub async fn run_command(&mut self, command: &str) -> Result<String> {
        self.send(command).await?;
        self.wait_for_prompt().await
    }

    /// Send a command and return its output without echo or trailing prompt.
    pub async fn send_command(&mut self, command: &str) -> Result<String> {
        let raw = self.run_command(command).await?;
        Ok(extract_command_output(&raw, command))
    }

    /// Escalate to privileged mode when a credential is available.
    ///
    /// Already being at a `#` prompt, or having no credential, is not an
    /// error and sends nothing. Ending the exchange anywhere but a `#`
    /// prompt fails with `EnableFailed`.
    pub async fn ensure_enable(&mut self, secret: Option<&SecretString>) -> Result<EnableOutcome> {
        if self.state == SessionState::PrivilegedMode {
            info!("device={} enable not required (already privileged)", self.device);
            return Ok(EnableOutcome::AlreadyPrivileged);
        }

        let Some(secret) = secret else {
            info!("device={} enable skipped (no enable credential)", self.device);
            return Ok(EnableOutcome::Skipped);
        };

        info!("device={} enable requested", self.device);
        self.send(cisco_ios::ENABLE_COMMAND).await?;

        // A device without an enable secret goes straight to the prompt
        let challenge = self
            .read_until(|text| {
                text.contains(cisco_ios::ENABLE_CHALLENGE) || extract_prompt(text).is_some()
            })
            .await?;
        let Some(challenge) = challenge else {
            error!("device={} enable failed: no password challenge", self.device);
            return Err(self.enable_timeout(cisco_ios::ENABLE_CHALLENGE));
        };

        if challenge.contains(cisco_ios::ENABLE_CHALLENGE) {
            self.send_hidden(secret.expose_secret()).await?;
            if self.read_until(|text| extract_prompt(text).is_some()).await?.is_none() {
                error!("device={} enable failed: no prompt after password", self.device);
                return Err(self.enable_timeout("prompt"));
            }
        }

        if self.state != SessionState::PrivilegedMode {
            error!("device={} enable failed", self.device);
            return Err(SessionError::EnableFailed {
                prompt: self.prompt.clone().unwrap_or_default(),
            }
            .into());
        }

        info!("device={} enable ok", self.device);
        Ok(EnableOutcome::Escalated)
    }

    /// Turn off `--More--` pagination.
    ///
    /// A rejected paging command is logged but not fatal; the capture that
    /// follows is still checked by the output validator.
    pub async fn disable_paging(&mut self) -> Result<()> {
        debug!("device={} sending {}", self.device, cisco_ios::PAGING_COMMAND);
        let raw = self.run_command(cisco_ios::PAGING_COMMAND).await?;
        if let Some(failure) = cisco_ios::detect_failure(&raw) {
            warn!(
                "device={} paging not disabled ({}); output may be truncated",
                self.device, failure
            );
        }
        Ok(())
    }

    /// Close the channel. Safe to call more than once; never fails.
    pub async fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.state = self.state.next(SessionEvent::Closed);
        if let Err(e) = self.channel.close().await {
            debug!("device={} channel close failed: {}", self.device, e);
        }
        debug!("device={} interactive session closed", self.device);
    }

    fn enable_timeout(&self, expected: &str) -> crate::error::Error {
        SessionError::EnableTimeout {
            expected: expected.to_string(),
            timeout: self.timeout,
        }
        .into()
    }

    /// Core read loop. `Ok(None)` means the deadline passed first.
    async fn read_until(&mut self, done: impl Fn(&str) -> bool) -> Result<Option<String>> {
        let deadline = Instant::now() + self.timeout;
        loop {
            if done(self.buffer.as_str()) {
                return Ok(Some(self.buffer.take()));
            }

            match tokio::time::timeout_at(deadline, self.channel.read()).await {
                Err(_) => {
                    debug!(
                        "device={} wait timed out after {:?}, buffered={:?}",
                        self.device,
                        self.timeout,
                        self.buffer.as_str()
                    );
                    return Ok(None);
                }
                Ok(Ok(Some(chunk))) => {
                    self.buffer.extend(&chunk);
                    self.observe_prompt();
                }
                Ok(Ok(None)) => {
                    self.state = self.state.next(SessionEvent::Closed);
                    return Err(SessionError::Closed.into());
                }
                Ok(Err(e)) => return Err(e),
            }
        }
    }

    fn observe_prompt(&mut self) {
        if let Some(prompt) = extract_prompt(self.buffer.as_str()) {
            let mode = PromptMode::from_prompt(prompt);
            self.prompt = Some(prompt.to_string());
            self.state = self.state.next(SessionEvent::Prompt(mode));
        }
    }
}

/// Retrieve the running configuration over an initialized-or-fresh session.
///
/// Runs the full sequence: prompt detection, optional enable, paging
/// suppression, `show running-config`, output extraction and validation.
/// The caller owns closing the session.
pub async fn fetch_running_config<C: ShellChannel>(
    session: &mut InteractiveSession<C>,
    enable: Option<&SecretString>,
) -> Result<String> {
    if session.state() == SessionState::Connecting {
        session.initialize().await?;
    }
    session.ensure_enable(enable).await?;
    session.disable_paging().await?;
    let config = session.send_command(cisco_ios::CONFIG_COMMAND).await?;
    validate_config_text(Vendor::Cisco, &config)?;
    Ok(config)
}
