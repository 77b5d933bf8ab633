//! clu launches external processes, optionally capturing their standard
//! output, in one of three modes: asynchronous (fire and forget), permanent
//! (the caller terminates it later) or synchronous (block until exit). Each
//! launch can request a priority class.
//!
//! ```no_run
//! use clu::{ExecOptions, Executor, ProcessPriority, format_cmd};
//!
//! let executor = Executor::new();
//! let options = ExecOptions::default().priority(ProcessPriority::Low);
//!
//! let mut output = String::new();
//! let summary = executor.sync_execute(&format_cmd("ls | wc -l"), &options, Some(&mut output))?;
//! println!("exit {:?}: {output}", summary.code);
//!
//! let server = executor.permanent_execute("python3 -m http.server", &options, None)?;
//! executor.kill_permanent(&server)?;
//! # Ok::<(), clu::ExecError>(())
//! ```

/// CLI interface.
pub mod cli;

/// Command-line splitting and shell wrapping.
pub mod command;

/// Configuration management.
pub mod config;

/// Constants shared across the crate.
pub mod constants;

/// Error handling and last-error reporting.
pub mod error;

/// Execution modes.
pub mod executor;

/// Process creation.
pub mod launcher;

/// Output capture.
pub mod output;

/// Priority classes.
pub mod priority;

/// Permanent process registry.
pub mod registry;

#[cfg(test)]
mod test_utils;

pub use command::format_cmd;
pub use error::{ExecError, LastError, last_error};
pub use executor::{ExecOptions, Executor, ExitSummary};
pub use output::OutputBuffer;
pub use priority::ProcessPriority;
pub use registry::{ProcessId, ProcessRegistry};
