//! Change detection engine.
//!
//! [`evaluate_change`] finds the artifact preceding the current one, hashes
//! both normalized texts and, when they differ, renders a unified diff.

mod detector;
mod unified;

pub use detector::{
    ArtifactSide, ChangeState, DiffOutcome, evaluate_change, select_previous, write_diff,
};
pub use unified::{DEFAULT_CONTEXT, UnifiedDiff, unified_diff};
