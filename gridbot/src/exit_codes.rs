//! Stable exit codes for gridbot CLI commands.

/// Command succeeded, or the run reached the goal.
pub const OK: i32 = 0;
/// Invalid input: unreadable program/config/catalog, bad arguments, rejected start.
pub const INVALID: i32 = 1;
/// The program ran and ended in a failure (collision, loop limit, goal not reached).
pub const FAILED: i32 = 2;
/// The run was aborted before finishing.
pub const ABORTED: i32 = 3;
