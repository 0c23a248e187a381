//! Channel layer for terminal decoding and prompt detection.
//!
//! This module turns the raw PTY byte stream into text and decides when
//! the device is waiting at a prompt.

mod buffer;
mod prompt;
mod pty;

pub use buffer::TerminalBuffer;
pub use prompt::{PromptMode, extract_prompt, is_prompt_line};
pub use pty::{PtyChannel, ShellChannel};
