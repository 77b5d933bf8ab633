//! Constants and configuration values for clu.
//!
//! This module centralizes the magic numbers and strings used by the
//! launcher, the output buffer and the command-line front end.

use std::time::Duration;

use nix::sys::signal::Signal;

// ============================================================================
// Output Capture
// ============================================================================

/// Number of bytes requested from the output pipe per read.
pub const READ_CHUNK_SIZE: usize = 100;

// ============================================================================
// Shell Execution Constants
// ============================================================================

/// Shell used by [`crate::command::format_cmd`].
pub const DEFAULT_SHELL: &str = "sh";

/// Shell argument flag for executing command strings.
pub const SHELL_COMMAND_FLAG: &str = "-c";

// ============================================================================
// Priority Classes
// ============================================================================

/// Nice value applied for [`crate::priority::ProcessPriority::Low`].
pub const NICE_LOW: i32 = 10;

/// Nice value applied for [`crate::priority::ProcessPriority::Normal`].
pub const NICE_NORMAL: i32 = 0;

/// Nice value applied for [`crate::priority::ProcessPriority::High`].
pub const NICE_HIGH: i32 = -5;

/// Nice value applied for [`crate::priority::ProcessPriority::VeryHigh`].
pub const NICE_VERY_HIGH: i32 = -10;

// ============================================================================
// Termination
// ============================================================================

/// Signal delivered by `kill_permanent`. Termination is forced and has no
/// grace period.
pub const KILL_SIGNAL: Signal = Signal::SIGKILL;

// ============================================================================
// Command-line Front End
// ============================================================================

/// Configuration file looked up when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "clu.yaml";

/// How often `clu start` checks whether its permanent process is still alive.
pub const PERMANENT_POLL_INTERVAL: Duration = Duration::from_millis(100);
