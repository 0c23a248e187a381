//! Vendor-specific text canonicalization for change detection.
//!
//! Normalized text is only hashed and diffed; artifacts on disk keep the
//! raw capture.

use crate::platform::Vendor;
use crate::platform::vendors::{cisco_ios, mikrotik};
use crate::storage::METADATA_MARKER;

/// Canonicalize configuration text for comparison.
///
/// Line endings become `\n`, each line is right-trimmed and trailing blank
/// lines are dropped. Cisco volatile lines (save timestamps, uptime, byte
/// counts, clock drift) are removed. Comments in RouterOS exports are kept.
/// The result has no trailing newline and `normalize(normalize(x))` equals
/// `normalize(x)`.
pub fn normalize(vendor: Vendor, raw: &str) -> String {
    let unified = unify_line_endings(raw);
    let mut lines: Vec<&str> = unified
        .split('\n')
        .map(str::trim_end)
        .filter(|line| match vendor {
            Vendor::Cisco => !cisco_ios::is_volatile_line(line),
            Vendor::Mikrotik => true,
        })
        .collect();

    while lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}

/// Text used to compare two artifacts of `vendor`.
///
/// RouterOS artifacts lose the metadata header and the generated-at banner
/// before normalization, since both change on every run.
pub fn comparison_text(vendor: Vendor, raw: &str) -> String {
    match vendor {
        Vendor::Cisco => normalize(vendor, raw),
        Vendor::Mikrotik => normalize(vendor, &strip_export_preamble(raw)),
    }
}

fn unify_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// Drop the leading metadata block and any export banner in the leading
/// comment block.
fn strip_export_preamble(raw: &str) -> String {
    let unified = unify_line_endings(raw);
    let mut lines = unified.split('\n').peekable();

    if lines.peek().map(|line| line.trim_end()) == Some(METADATA_MARKER) {
        lines.next();
        while lines
            .peek()
            .is_some_and(|line| line.starts_with("# ") && line.contains(": "))
        {
            lines.next();
        }
        if lines.peek().is_some_and(|line| line.trim().is_empty()) {
            lines.next();
        }
    }

    let mut leading_comments = true;
    let mut kept = Vec::new();
    for line in lines {
        if leading_comments && line.starts_with('#') {
            if mikrotik::is_export_banner(line) {
                continue;
            }
        } else {
            leading_comments = false;
        }
        kept.push(line);
    }
    kept.join("\n")
}
