//! Byte-level channel abstraction for interactive shells.

use std::future::Future;

use log::trace;
use russh::client::Msg;
use russh::{Channel, ChannelMsg};

use crate::error::{Result, SessionError};

/// A bidirectional byte stream to a device shell.
///
/// `read` must be cancel-safe: sessions race it against a deadline and drop
/// the future when the deadline wins.
pub trait ShellChannel: Send {
    /// Write raw bytes to the remote shell.
    fn write(&mut self, data: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Wait for the next chunk of output. `None` means the remote end closed.
    fn read(&mut self) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send;

    /// Close the channel.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// PTY shell channel backed by russh.
pub struct PtyChannel {
    channel: Channel<Msg>,
}

impl PtyChannel {
    /// Wrap an already opened PTY + shell channel.
    pub fn new(channel: Channel<Msg>) -> Self {
        Self { channel }
    }
}

impl ShellChannel for PtyChannel {
    async fn write(&mut self, data: &[u8]) -> Result<()> {
        self.channel.data(data).await.map_err(SessionError::Ssh)?;
        Ok(())
    }

    async fn read(&mut self) -> Result<Option<Vec<u8>>> {
        loop {
            match self.channel.wait().await {
                Some(ChannelMsg::Data { data }) => return Ok(Some(data.to_vec())),
                Some(ChannelMsg::ExtendedData { data, .. }) => return Ok(Some(data.to_vec())),
                Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => return Ok(None),
                Some(other) => trace!("ignoring channel message {:?}", other),
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.channel.close().await.map_err(SessionError::Ssh)?;
        Ok(())
    }
}
