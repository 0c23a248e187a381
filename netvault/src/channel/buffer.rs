//! Terminal output buffer with ANSI escape stripping.
//!
//! Network device shells emit cursor movement and color sequences mixed
//! with the text we care about. Bytes are pushed through a `vte` parser so
//! only printable characters and line control survive, and the parser state
//! carries over between reads so an escape sequence split across two SSH
//! packets is still removed.

use vte::{Parser, Perform};

/// Accumulates decoded terminal text between prompt waits.
pub struct TerminalBuffer {
    parser: Parser,
    text: TextSink,
}

#[derive(Default)]
struct TextSink {
    buffer: String,
}

impl Perform for TextSink {
    fn print(&mut self, c: char) {
        self.buffer.push(c);
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            b'\n' | b'\r' | b'\t' => self.buffer.push(byte as char),
            // Backspace over echoed input
            0x08 => {
                self.buffer.pop();
            }
            _ => {}
        }
    }
}

impl TerminalBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self {
            parser: Parser::new(),
            text: TextSink {
                buffer: String::with_capacity(4096),
            },
        }
    }

    /// Feed raw channel bytes into the buffer.
    pub fn extend(&mut self, data: &[u8]) {
        self.parser.advance(&mut self.text, data);
    }

    /// Current decoded contents.
    pub fn as_str(&self) -> &str {
        &self.text.buffer
    }

    /// Take ownership of the contents and reset.
    pub fn take(&mut self) -> String {
        std::mem::take(&mut self.text.buffer)
    }

    /// Get the current buffer length in bytes.
    pub fn len(&self) -> usize {
        self.text.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.text.buffer.is_empty()
    }

    /// Clear the buffer.
    pub fn clear(&mut self) {
        self.text.buffer.clear();
    }
}

impl Default for TerminalBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TerminalBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalBuffer")
            .field("len", &self.text.buffer.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_extend() {
        let mut buffer = TerminalBuffer::new();
        buffer.extend(b"R1#show version\r\n");
        assert_eq!(buffer.as_str(), "R1#show version\r\n");
    }

    #[test]
    fn test_ansi_stripping() {
        let mut buffer = TerminalBuffer::new();
        buffer.extend(b"\x1b[32mGreen text\x1b[0m");
        assert_eq!(buffer.as_str(), "Green text");
    }

    #[test]
    fn test_escape_split_across_reads() {
        let mut buffer = TerminalBuffer::new();
        buffer.extend(b"R1>\x1b[");
        buffer.extend(b"2Kdone");
        assert_eq!(buffer.as_str(), "R1>done");
    }

    #[test]
    fn test_utf8_split_across_reads() {
        let mut buffer = TerminalBuffer::new();
        let bytes = "description Zürich".as_bytes();
        let split = bytes.len() - 5;
        buffer.extend(&bytes[..split]);
        buffer.extend(&bytes[split..]);
        assert_eq!(buffer.as_str(), "description Zürich");
    }

    #[test]
    fn test_backspace_removes_previous_char() {
        let mut buffer = TerminalBuffer::new();
        buffer.extend(b"enabx\x08le");
        assert_eq!(buffer.as_str(), "enable");
    }

    #[test]
    fn test_take_clears_buffer() {
        let mut buffer = TerminalBuffer::new();
        buffer.extend(b"test data");
        assert_eq!(buffer.take(), "test data");
        assert!(buffer.is_empty());
    }
}
