//! SSH transport implementation using russh.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use log::{debug, warn};
use russh::client::{self, Handle, Msg};
use russh::keys::{PrivateKeyWithHashAlg, PublicKey, load_secret_key};
use russh::{Channel, ChannelMsg};
use russh_sftp::client::SftpSession;
use russh_sftp::client::error::Error as SftpError;
use russh_sftp::protocol::StatusCode;
use secrecy::ExposeSecret;
use tokio::io::AsyncWriteExt;

use super::config::{AuthMethod, HostKeyVerification, SshConfig};
use crate::error::{Result, SessionError, SnapshotError, StorageError, TransportError};
use crate::session::{CommandRunner, FileTransfer, TransferOpener};

/// Captured result of a one-shot exec channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    /// Standard output, lossily decoded.
    pub stdout: String,

    /// Standard error (extended data stream 1), lossily decoded.
    pub stderr: String,

    /// Exit status reported by the server, if any.
    pub exit_status: Option<u32>,
}

impl ExecOutput {
    /// Exit status 0 with non-blank stdout.
    pub fn is_success(&self) -> bool {
        self.exit_status == Some(0) && !self.stdout.trim().is_empty()
    }
}

/// SSH transport wrapping russh client.
pub struct SshTransport {
    /// The russh session handle.
    session: Handle<SshHandler>,

    /// Configuration used for this connection.
    config: SshConfig,
}

impl SshTransport {
    /// Connect to the SSH server and authenticate.
    pub async fn connect(config: SshConfig) -> Result<Self> {
        let ssh_config = Arc::new(client::Config {
            inactivity_timeout: Some(config.timeout * 6),
            ..Default::default()
        });

        let rejection = Arc::new(Mutex::new(None));
        let handler = SshHandler {
            host: config.host.clone(),
            port: config.port,
            policy: config.host_key_verification.clone(),
            known_hosts_path: config.known_hosts_path.clone(),
            rejection: Arc::clone(&rejection),
        };

        let mut session = tokio::time::timeout(
            config.timeout,
            client::connect(ssh_config, (config.host.as_str(), config.port), handler),
        )
        .await
        .map_err(|_| TransportError::Timeout(config.timeout))?
        .map_err(|e| {
            rejection
                .lock()
                .ok()
                .and_then(|mut slot| slot.take())
                .unwrap_or(TransportError::Ssh(e))
        })?;

        tokio::time::timeout(config.timeout, Self::authenticate(&mut session, &config))
            .await
            .map_err(|_| TransportError::Timeout(config.timeout))??;

        debug!("ssh session established to {}", config.socket_addr());
        Ok(Self { session, config })
    }

    /// Configuration used for this connection.
    pub fn config(&self) -> &SshConfig {
        &self.config
    }

    /// Open a new PTY channel with an interactive shell.
    pub async fn open_shell(&self) -> Result<Channel<Msg>> {
        let channel = self
            .session
            .channel_open_session()
            .await
            .map_err(TransportError::Ssh)?;

        channel
            .request_pty(
                true,
                "xterm",
                self.config.terminal_width,
                self.config.terminal_height,
                0,
                0,
                &[],
            )
            .await
            .map_err(TransportError::Ssh)?;

        channel
            .request_shell(true)
            .await
            .map_err(TransportError::Ssh)?;

        Ok(channel)
    }

    /// Run one command on a fresh exec channel and collect its output.
    ///
    /// The whole exchange, from channel open to channel close, is bounded
    /// by the session timeout.
    pub async fn exec(&self, command: &str) -> Result<ExecOutput> {
        let timeout = self.config.timeout;
        let exchange = async {
            let mut channel = self
                .session
                .channel_open_session()
                .await
                .map_err(SessionError::Ssh)?;
            channel.exec(true, command).await.map_err(SessionError::Ssh)?;

            let mut stdout = Vec::new();
            let mut stderr = Vec::new();
            let mut exit_status = None;

            while let Some(msg) = channel.wait().await {
                match msg {
                    ChannelMsg::Data { data } => stdout.extend_from_slice(&data),
                    ChannelMsg::ExtendedData { data, ext: 1 } => stderr.extend_from_slice(&data),
                    ChannelMsg::ExitStatus { exit_status: code } => exit_status = Some(code),
                    ChannelMsg::Close => break,
                    _ => {}
                }
            }

            Ok::<_, SessionError>(ExecOutput {
                stdout: String::from_utf8_lossy(&stdout).into_owned(),
                stderr: String::from_utf8_lossy(&stderr).into_owned(),
                exit_status,
            })
        };

        let output = tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| SessionError::Timeout(timeout))??;
        Ok(output)
    }

    /// Open an SFTP sub-channel on this connection.
    pub async fn open_sftp(&self) -> Result<SftpTransfer> {
        let channel = self
            .session
            .channel_open_session()
            .await
            .map_err(|e| SnapshotError::Transfer(e.to_string()))?;
        channel
            .request_subsystem(true, "sftp")
            .await
            .map_err(|e| SnapshotError::Transfer(e.to_string()))?;
        let handshake = SftpSession::new(channel.into_stream());
        let sftp = tokio::time::timeout(self.config.timeout, handshake)
            .await
            .map_err(|_| SnapshotError::Transfer("sftp handshake timed out".into()))?
            .map_err(|e| SnapshotError::Transfer(e.to_string()))?;
        Ok(SftpTransfer { sftp })
    }

    /// Whether the underlying session has been torn down.
    pub fn is_closed(&self) -> bool {
        self.session.is_closed()
    }

    /// Authenticate with the server.
    async fn authenticate(session: &mut Handle<SshHandler>, config: &SshConfig) -> Result<()> {
        let success = match &config.auth {
            AuthMethod::Password(password) => session
                .authenticate_password(&config.username, password.expose_secret())
                .await
                .map_err(TransportError::Ssh)?
                .success(),
            AuthMethod::PrivateKey { path, passphrase } => {
                let key = load_secret_key(path, passphrase.as_ref().map(|p| p.expose_secret()))
                    .map_err(|e| TransportError::Key(e.to_string()))?;

                // Get the best RSA hash algorithm supported by the server
                let hash_alg = session
                    .best_supported_rsa_hash()
                    .await
                    .map_err(TransportError::Ssh)?
                    .flatten();

                session
                    .authenticate_publickey(
                        &config.username,
                        PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg),
                    )
                    .await
                    .map_err(TransportError::Ssh)?
                    .success()
            }
        };

        if !success {
            return Err(TransportError::AuthenticationFailed {
                user: config.username.clone(),
            }
            .into());
        }

        Ok(())
    }

    /// Close the connection.
    pub async fn close(self) -> Result<()> {
        self.session
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await
            .map_err(TransportError::Ssh)?;
        Ok(())
    }
}

impl CommandRunner for &SshTransport {
    async fn run(&mut self, command: &str) -> Result<ExecOutput> {
        self.exec(command).await
    }
}

impl TransferOpener for &SshTransport {
    type Transfer = SftpTransfer;

    async fn open_transfer(&mut self) -> Result<SftpTransfer> {
        self.open_sftp().await
    }
}

/// SFTP client bound to one SSH connection.
pub struct SftpTransfer {
    sftp: SftpSession,
}

impl FileTransfer for SftpTransfer {
    async fn remote_size(&mut self, remote: &str) -> Result<Option<u64>> {
        match self.sftp.metadata(remote).await {
            Ok(attrs) => Ok(Some(attrs.size.unwrap_or(0))),
            Err(SftpError::Status(status))
                if matches!(status.status_code, StatusCode::NoSuchFile) =>
            {
                Ok(None)
            }
            Err(e) => Err(SnapshotError::Transfer(e.to_string()).into()),
        }
    }

    async fn download(&mut self, remote: &str, local: &Path) -> Result<u64> {
        let mut source = self
            .sftp
            .open(remote)
            .await
            .map_err(|e| SnapshotError::Transfer(e.to_string()))?;
        let mut target = tokio::fs::File::create(local)
            .await
            .map_err(|e| StorageError::io(local, e))?;
        let copied = tokio::io::copy(&mut source, &mut target)
            .await
            .map_err(|e| SnapshotError::Transfer(e.to_string()))?;
        target
            .flush()
            .await
            .map_err(|e| StorageError::io(local, e))?;
        Ok(copied)
    }

    async fn remove(&mut self, remote: &str) -> Result<()> {
        self.sftp
            .remove_file(remote)
            .await
            .map_err(|e| SnapshotError::Transfer(e.to_string()))?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.sftp
            .close()
            .await
            .map_err(|e| SnapshotError::Transfer(e.to_string()))?;
        Ok(())
    }
}

/// Host key policy for one connection attempt.
struct SshHandler {
    host: String,
    port: u16,
    policy: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
    /// Detailed rejection reason, read back by `connect` in place of
    /// russh's generic `UnknownKey`.
    rejection: Arc<Mutex<Option<TransportError>>>,
}

impl SshHandler {
    /// Apply the policy to the presented key.
    fn verify(&self, key: &PublicKey) -> std::result::Result<(), TransportError> {
        if self.policy == HostKeyVerification::Disabled {
            return Ok(());
        }

        let known = match &self.known_hosts_path {
            Some(path) => russh::keys::check_known_hosts_path(&self.host, self.port, key, path),
            None => russh::keys::check_known_hosts(&self.host, self.port, key),
        };

        match known {
            Ok(true) => Ok(()),
            Ok(false) if self.policy == HostKeyVerification::Strict => {
                Err(TransportError::HostKeyUnknown {
                    host: self.host.clone(),
                    port: self.port,
                })
            }
            Ok(false) => {
                if let Err(e) = self.learn(key) {
                    warn!("host {}: could not record host key: {}", self.host, e);
                } else {
                    debug!("host {}: learned new host key", self.host);
                }
                Ok(())
            }
            Err(russh::keys::Error::KeyChanged { line }) => Err(TransportError::HostKeyChanged {
                host: self.host.clone(),
                port: self.port,
                line,
            }),
            Err(e) => Err(TransportError::KnownHosts(e.to_string())),
        }
    }

    fn learn(&self, key: &PublicKey) -> std::result::Result<(), TransportError> {
        let learned = match &self.known_hosts_path {
            Some(path) => {
                russh::keys::known_hosts::learn_known_hosts_path(&self.host, self.port, key, path)
            }
            None => russh::keys::known_hosts::learn_known_hosts(&self.host, self.port, key),
        };
        learned.map_err(|e| TransportError::KnownHosts(e.to_string()))
    }
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        match self.verify(server_public_key) {
            Ok(()) => Ok(true),
            Err(e) => {
                if let Ok(mut slot) = self.rejection.lock() {
                    *slot = Some(e);
                }
                Ok(false)
            }
        }
    }
}
