//! Change detection between successive artifacts of one device.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use log::debug;
use serde::Serialize;
use sha2::{Digest, Sha256};

use super::unified::{DEFAULT_CONTEXT, unified_diff};
use crate::error::{Result, StorageError};

/// Three-valued change verdict.
///
/// `Unknown` means there was no earlier artifact to compare against, which
/// is not the same as `Unchanged`. Serializes as `true`/`false`/`null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "Option<bool>")]
pub enum ChangeState {
    Changed,
    Unchanged,
    Unknown,
}

impl From<ChangeState> for Option<bool> {
    fn from(state: ChangeState) -> Self {
        match state {
            ChangeState::Changed => Some(true),
            ChangeState::Unchanged => Some(false),
            ChangeState::Unknown => None,
        }
    }
}

/// Metadata about one side of a comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSide {
    pub path: PathBuf,
    /// Hex SHA-256 of the normalized text.
    pub sha256: String,
    /// Size of the file on disk.
    pub size_bytes: u64,
    /// Line count of the normalized text.
    pub lines: usize,
}

/// Result of comparing the current artifact with the previous one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffOutcome {
    pub previous: Option<ArtifactSide>,
    pub current: ArtifactSide,
    pub config_changed: ChangeState,
    pub added: usize,
    pub removed: usize,
    pub diff_text: Option<String>,
}

/// Compare `current` with the artifact that precedes it.
///
/// Siblings are the files in `current`'s directory matching `pattern`,
/// ordered by modification time (ties keep directory order). Both texts go
/// through `normalize` before hashing and diffing.
pub fn evaluate_change(
    current: &Path,
    pattern: &str,
    normalize: impl Fn(&str) -> String,
) -> Result<DiffOutcome> {
    let previous = select_previous(current, pattern)?;

    let current_text = normalize(&read_text(current)?);
    let current_side = describe(current, &current_text)?;

    let Some(previous) = previous else {
        debug!("no previous artifact for {}", current.display());
        return Ok(DiffOutcome {
            previous: None,
            current: current_side,
            config_changed: ChangeState::Unknown,
            added: 0,
            removed: 0,
            diff_text: None,
        });
    };

    let previous_text = normalize(&read_text(&previous)?);
    let previous_side = describe(&previous, &previous_text)?;

    if previous_side.sha256 == current_side.sha256 {
        return Ok(DiffOutcome {
            previous: Some(previous_side),
            current: current_side,
            config_changed: ChangeState::Unchanged,
            added: 0,
            removed: 0,
            diff_text: None,
        });
    }

    let diff = unified_diff(
        &previous_text,
        &current_text,
        &previous.display().to_string(),
        &current.display().to_string(),
        DEFAULT_CONTEXT,
    );
    Ok(DiffOutcome {
        previous: Some(previous_side),
        current: current_side,
        config_changed: ChangeState::Changed,
        added: diff.added,
        removed: diff.removed,
        diff_text: Some(diff.text),
    })
}

/// Pick the artifact preceding `current` among its siblings.
///
/// When `current` is not in the listing the second-to-last sibling is
/// returned, if there are at least two.
pub fn select_previous(current: &Path, pattern: &str) -> Result<Option<PathBuf>> {
    let siblings = list_siblings(current, pattern)?;
    let current_key = canonical(current);

    match siblings.iter().position(|path| canonical(path) == current_key) {
        Some(0) => Ok(None),
        Some(index) => Ok(Some(siblings[index - 1].clone())),
        None if siblings.len() > 1 => Ok(Some(siblings[siblings.len() - 2].clone())),
        None => Ok(None),
    }
}

/// Write the diff next to the current artifact with a `.diff` extension.
///
/// Only changed outcomes produce a file.
pub fn write_diff(outcome: &DiffOutcome) -> Result<Option<PathBuf>> {
    let (ChangeState::Changed, Some(text)) = (outcome.config_changed, &outcome.diff_text) else {
        return Ok(None);
    };
    let path = outcome.current.path.with_extension("diff");
    fs::write(&path, text).map_err(|e| StorageError::io(&path, e))?;
    Ok(Some(path))
}

fn list_siblings(current: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let dir = match current.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let matcher = glob::Pattern::new(pattern).map_err(StorageError::from)?;

    let entries = fs::read_dir(&dir).map_err(|e| StorageError::io(&dir, e))?;
    let mut siblings: Vec<(SystemTime, PathBuf)> = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| StorageError::io(&dir, e))?;
        let name = entry.file_name();
        if !matcher.matches(&name.to_string_lossy()) {
            continue;
        }
        let metadata = entry.metadata().map_err(|e| StorageError::io(entry.path(), e))?;
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata
            .modified()
            .map_err(|e| StorageError::io(entry.path(), e))?;
        siblings.push((modified, entry.path()));
    }

    siblings.sort_by_key(|(modified, _)| *modified);
    Ok(siblings.into_iter().map(|(_, path)| path).collect())
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn read_text(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| StorageError::io(path, e))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn describe(path: &Path, normalized: &str) -> Result<ArtifactSide> {
    let size_bytes = fs::metadata(path)
        .map_err(|e| StorageError::io(path, e))?
        .len();
    Ok(ArtifactSide {
        path: path.to_path_buf(),
        sha256: hex::encode(Sha256::digest(normalized.as_bytes())),
        size_bytes,
        lines: normalized.lines().count(),
    })
}
