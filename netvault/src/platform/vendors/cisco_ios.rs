//! Cisco IOS / IOS-XE interactive shell profile.
//!
//! ```text
//! R1>                      # user EXEC
//! R1#                      # privileged EXEC
//! ```
//!
//! The running configuration is only readable from privileged EXEC, so the
//! session escalates with `enable` when a secret is configured.

use std::sync::LazyLock;

use regex::Regex;

/// Command that escalates to privileged EXEC.
pub const ENABLE_COMMAND: &str = "enable";

/// Literal challenge printed after `enable`.
pub const ENABLE_CHALLENGE: &str = "Password:";

/// Command that disables `--More--` pagination for this session.
pub const PAGING_COMMAND: &str = "terminal length 0";

/// Command that prints the configuration being backed up.
pub const CONFIG_COMMAND: &str = "show running-config";

/// Output fragments that mean the device rejected a command.
pub const FAILURE_PATTERNS: &[&str] = &[
    "% Invalid input",
    "% Incomplete command",
    "% Ambiguous command",
    "% Unknown command",
];

/// Lines that change without any configuration change.
static VOLATILE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)^!\s+Last configuration change",
        r"(?i)^!\s+NVRAM config last updated",
        r"(?i)^!\s+Time:",
        r"(?i)^!\s+.*uptime is",
        r"(?i)^Current configuration : \d+ bytes",
        r"(?i)^ntp clock-period \d+",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("Invalid regex pattern"))
    .collect()
});

/// Whether a line is volatile metadata rather than configuration.
pub fn is_volatile_line(line: &str) -> bool {
    VOLATILE_PATTERNS.iter().any(|pattern| pattern.is_match(line))
}

/// Whether the text looks like a real running-config capture.
pub fn has_structural_marker(text: &str) -> bool {
    text.lines().any(|line| {
        let line = line.trim_end();
        line.starts_with("version ")
            || line.starts_with("hostname ")
            || line.starts_with("Building configuration")
            || line.starts_with("Current configuration")
            || line == "!"
    })
}

/// Return the first failure pattern contained in `output`.
pub fn detect_failure(output: &str) -> Option<&'static str> {
    FAILURE_PATTERNS
        .iter()
        .copied()
        .find(|pattern| output.contains(pattern))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volatile_patterns_compile() {
        assert_eq!(VOLATILE_PATTERNS.len(), 6);
    }

    #[test]
    fn test_volatile_lines() {
        assert!(is_volatile_line(
            "! Last configuration change at 10:01:22 UTC Mon Jan 5 2026 by admin"
        ));
        assert!(is_volatile_line("! NVRAM config last updated at 09:00:00 UTC"));
        assert!(is_volatile_line("Current configuration : 4521 bytes"));
        assert!(is_volatile_line("ntp clock-period 17179869"));
        assert!(is_volatile_line("!   router uptime is 3 weeks"));

        assert!(!is_volatile_line("hostname R1"));
        assert!(!is_volatile_line("!"));
        assert!(!is_volatile_line("ntp server 10.0.0.1"));
    }

    #[test]
    fn test_structural_markers() {
        assert!(has_structural_marker("version 15.2\nhostname R1"));
        assert!(has_structural_marker("interface Gi0/1\n!\n"));
        assert!(!has_structural_marker("% Invalid input detected at '^' marker."));
        assert!(!has_structural_marker(""));
    }

    #[test]
    fn test_detect_failure() {
        assert_eq!(
            detect_failure("terminal length 0\n% Invalid input detected"),
            Some("% Invalid input")
        );
        assert_eq!(detect_failure("R1#"), None);
    }
}
