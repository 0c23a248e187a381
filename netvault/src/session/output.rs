//! Command output cleanup and configuration sanity checks.

use crate::channel::is_prompt_line;
use crate::error::{Result, SessionError};
use crate::platform::Vendor;

/// Strip the command echo and trailing prompt from raw shell output.
///
/// Everything up to and including the first line containing `command` is
/// dropped. When no echo is found the whole buffer is kept. Trailing prompt
/// and blank lines are removed in both cases. Line endings are normalized to
/// `\n` and the result carries no trailing newline.
pub fn extract_command_output(raw: &str, command: &str) -> String {
    let lines: Vec<&str> = raw.lines().map(|line| line.trim_end_matches('\r')).collect();

    let start = lines
        .iter()
        .position(|line| line.contains(command))
        .map_or(0, |echo| echo + 1);

    let mut kept = &lines[start..];
    while let Some((last, rest)) = kept.split_last() {
        if last.trim().is_empty() || is_prompt_line(last) {
            kept = rest;
        } else {
            break;
        }
    }

    kept.join("\n")
}

/// Reject output that cannot be a configuration for `vendor`.
pub fn validate_config_text(vendor: Vendor, text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(SessionError::InvalidOutput {
            reason: "empty output".to_string(),
        }
        .into());
    }
    if !vendor.has_structural_marker(text) {
        return Err(SessionError::InvalidOutput {
            reason: format!("no {} configuration markers found", vendor),
        }
        .into());
    }
    Ok(())
}
