//! MikroTik RouterOS command-exec profile.
//!
//! RouterOS runs each SSH exec request as a single console command, so no
//! prompt handling is needed. Exports are plain text; the binary system
//! backup is created on the device and pulled over SFTP.

use std::sync::LazyLock;

use regex::Regex;

/// Export variants, most sanitized first. Some firmware revisions reject
/// `hide-sensitive`, in which case the bare export is accepted.
pub const EXPORT_COMMANDS: &[&str] = &["/export hide-sensitive", "/export"];

/// Console messages RouterOS prints on stdout, often with exit status 0,
/// when it rejects a command. They only count at the start of the output.
pub const FAILURE_PATTERNS: &[&str] = &[
    "bad command name",
    "expected end of command",
    "syntax error",
    "failure:",
];

/// Extension of the binary snapshot file.
pub const SNAPSHOT_EXTENSION: &str = "backup";

static EXPORT_BANNER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#\s.*\bby RouterOS\b").expect("Invalid regex pattern"));

/// Command that writes a binary snapshot named `name` on the device.
pub fn snapshot_command(name: &str) -> String {
    format!("/system backup save name={} dont-encrypt=yes", name)
}

/// Remote file the snapshot command produces.
pub fn snapshot_remote_file(name: &str) -> String {
    format!("{}.{}", name, SNAPSHOT_EXTENSION)
}

/// Whether the line is the generated-at banner RouterOS puts on exports.
pub fn is_export_banner(line: &str) -> bool {
    EXPORT_BANNER.is_match(line)
}

/// Return the failure pattern that opens `output`, if any.
///
/// Output with a `/path` menu line is an export and never a rejection, even
/// when a script body or comment quotes one of the messages.
pub fn detect_failure(output: &str) -> Option<&'static str> {
    if output
        .lines()
        .any(|line| line.trim_start().starts_with('/'))
    {
        return None;
    }
    let first = output.lines().map(str::trim).find(|line| !line.is_empty())?;
    FAILURE_PATTERNS
        .iter()
        .copied()
        .find(|pattern| first.starts_with(pattern))
}

/// Whether the text looks like a RouterOS export.
pub fn has_structural_marker(text: &str) -> bool {
    text.lines()
        .map(str::trim_start)
        .any(|line| line.starts_with('/') || line.starts_with('#'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_names() {
        assert_eq!(
            snapshot_command("router1"),
            "/system backup save name=router1 dont-encrypt=yes"
        );
        assert_eq!(snapshot_remote_file("router1"), "router1.backup");
    }

    #[test]
    fn test_export_banner() {
        assert!(is_export_banner("# 2026-01-07 00:49:07 by RouterOS 7.19"));
        assert!(is_export_banner("# jan/07/2026 00:49:07 by RouterOS 6.49.10"));
        assert!(!is_export_banner("# software id = ABCD-1234"));
        assert!(!is_export_banner("/interface bridge"));
    }

    #[test]
    fn test_detect_failure() {
        assert_eq!(
            detect_failure("expected end of command (line 1 column 9)"),
            Some("expected end of command")
        );
        assert_eq!(detect_failure("failure: not enough space"), Some("failure:"));
        assert_eq!(
            detect_failure("\nbad command name export (line 1 column 2)\n"),
            Some("bad command name")
        );
        assert_eq!(detect_failure("/interface bridge"), None);
        assert_eq!(detect_failure(""), None);
    }

    #[test]
    fn test_quoted_failure_text_is_not_a_rejection() {
        let export = "# by RouterOS 7.19\n\
            /system script\n\
            add name=check source=\":log warning \\\"failure: uplink down\\\"\"\n\
            /interface bridge\n\
            add comment=\"syntax error on purpose\" name=bridge1\n";
        assert_eq!(detect_failure(export), None);
        assert_eq!(detect_failure("Configuration backup saved"), None);
    }

    #[test]
    fn test_export_banner_pattern_compiles() {
        assert!(EXPORT_BANNER.is_match("# by RouterOS 7"));
    }

    #[test]
    fn test_structural_markers() {
        assert!(has_structural_marker("/interface bridge\nadd name=bridge1"));
        assert!(!has_structural_marker("bad command name export"));
    }
}
