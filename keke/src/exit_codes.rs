//! Stable exit codes for keke CLI commands.

/// Command succeeded, including a cancelled or empty rollback and a
/// conversation stopped by the iteration cap.
pub const OK: i32 = 0;
/// Command failed: missing project, bad config, remote failure, or an
/// invalid rollback selection.
pub const FAILURE: i32 = 1;
