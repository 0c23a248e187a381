//! Prompt detection for line-oriented device shells.
//!
//! A prompt is the unterminated last line a device prints when it is ready
//! for input, ending in `>` (user mode) or `#` (privileged mode). Every
//! session transition goes through [`extract_prompt`].

use std::fmt;

/// Privilege mode derived from a prompt's trailing character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptMode {
    /// `>` prompt
    User,
    /// `#` prompt
    Privileged,
    /// No prompt recognized yet
    Unknown,
}

impl PromptMode {
    /// Derive the mode from a prompt string.
    pub fn from_prompt(prompt: &str) -> Self {
        match prompt.trim_end().chars().last() {
            Some('#') => PromptMode::Privileged,
            Some('>') => PromptMode::User,
            _ => PromptMode::Unknown,
        }
    }
}

impl fmt::Display for PromptMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PromptMode::User => "user",
            PromptMode::Privileged => "privileged",
            PromptMode::Unknown => "unknown",
        })
    }
}

/// Whether a complete line looks like a device prompt.
pub fn is_prompt_line(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty() && (trimmed.ends_with('>') || trimmed.ends_with('#'))
}

/// Return the prompt the buffer currently ends with, if any.
///
/// Only the text after the last newline is considered: devices print the
/// prompt without a line terminator, so a configuration line that happens
/// to end in `#` (a banner delimiter, say) is never mistaken for one.
pub fn extract_prompt(buffer: &str) -> Option<&str> {
    let tail = match memchr::memrchr(b'\n', buffer.as_bytes()) {
        Some(pos) => &buffer[pos + 1..],
        None => buffer,
    };
    // A bare CR redraw leaves the visible line after the last '\r'
    let tail = match tail.trim_end().rfind('\r') {
        Some(pos) => &tail[pos + 1..],
        None => tail,
    };
    is_prompt_line(tail).then(|| tail.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_mode() {
        assert_eq!(PromptMode::from_prompt("R1#"), PromptMode::Privileged);
        assert_eq!(PromptMode::from_prompt("R1> "), PromptMode::User);
        assert_eq!(PromptMode::from_prompt("Password:"), PromptMode::Unknown);
    }

    #[test]
    fn test_extract_prompt_trailing_line() {
        assert_eq!(extract_prompt("banner\r\nR1>"), Some("R1>"));
        assert_eq!(extract_prompt("\r\n\r\nR1# "), Some("R1#"));
        assert_eq!(extract_prompt("R1#"), Some("R1#"));
    }

    #[test]
    fn test_extract_prompt_ignores_terminated_lines() {
        assert_eq!(extract_prompt("banner motd #\r\n"), None);
        assert_eq!(extract_prompt("hostname R1\r\n!\r\nend\r\n"), None);
        assert_eq!(extract_prompt("Password: "), None);
        assert_eq!(extract_prompt(""), None);
    }

    #[test]
    fn test_extract_prompt_after_carriage_return() {
        assert_eq!(extract_prompt("--More--\r        \rR1#"), Some("R1#"));
    }

    #[test]
    fn test_is_prompt_line() {
        assert!(is_prompt_line("R1#"));
        assert!(is_prompt_line("  switch>  "));
        assert!(!is_prompt_line("hostname R1"));
        assert!(!is_prompt_line("   "));
    }
}
