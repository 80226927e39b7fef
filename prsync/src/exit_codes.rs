//! Stable exit codes for prsync CLI commands.

/// Command succeeded. Partial sync failures still exit with this code.
pub const OK: i32 = 0;
/// Invalid configuration (missing credentials, unreadable config) or invocation.
pub const INVALID: i32 = 1;
