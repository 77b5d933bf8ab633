//! Command-line interface for clu.
use std::{convert::Infallible, path::PathBuf, str::FromStr};

use clap::{Args, Parser, Subcommand};
use tracing::level_filters::LevelFilter;

use crate::{executor::ExecOptions, priority::ProcessPriority};

/// Wrapper around `LevelFilter` so clap can parse log levels from either
/// string names ("info", "debug", etc.) or numeric shorthands (0-5).
#[derive(Clone, Copy, Debug)]
pub struct LogLevelArg(LevelFilter);

impl LogLevelArg {
    /// String representation suitable for `RUST_LOG`.
    pub fn as_str(&self) -> &'static str {
        match self.0 {
            LevelFilter::OFF => "off",
            LevelFilter::ERROR => "error",
            LevelFilter::WARN => "warn",
            LevelFilter::INFO => "info",
            LevelFilter::DEBUG => "debug",
            LevelFilter::TRACE => "trace",
        }
    }
}

impl FromStr for LogLevelArg {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err("log level cannot be empty".into());
        }

        if let Ok(number) = trimmed.parse::<u8>() {
            let level = match number {
                0 => LevelFilter::OFF,
                1 => LevelFilter::ERROR,
                2 => LevelFilter::WARN,
                3 => LevelFilter::INFO,
                4 => LevelFilter::DEBUG,
                5 => LevelFilter::TRACE,
                _ => {
                    return Err(format!(
                        "unsupported log level number '{number}' (expected 0-5)"
                    ));
                }
            };

            return Ok(LogLevelArg(level));
        }

        let level = match trimmed.to_ascii_lowercase().as_str() {
            "off" => LevelFilter::OFF,
            "error" | "err" => LevelFilter::ERROR,
            "warn" | "warning" => LevelFilter::WARN,
            "info" => LevelFilter::INFO,
            "debug" => LevelFilter::DEBUG,
            "trace" => LevelFilter::TRACE,
            _ => return Err(format!("invalid log level '{trimmed}'")),
        };

        Ok(LogLevelArg(level))
    }
}

fn parse_priority(value: &str) -> Result<ProcessPriority, Infallible> {
    Ok(ProcessPriority::parse_lenient(value))
}

/// Command-line interface for clu.
#[derive(Parser, Debug)]
#[command(name = "clu", version, author)]
#[command(about = "Launch, watch and terminate external processes", long_about = None)]
pub struct Cli {
    /// Override the logging verbosity for this invocation only.
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Configuration file supplying launch defaults and named commands.
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// The command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Launch options accepted by every launching subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct LaunchArgs {
    /// Working directory of the launched process.
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Priority class: low, normal, high or very_high (unknown names mean normal).
    #[arg(short, long, value_parser = parse_priority)]
    pub priority: Option<ProcessPriority>,

    /// Let the process write to this terminal.
    #[arg(long)]
    pub show_window: bool,

    /// Fail instead of warning when the priority cannot be applied.
    #[arg(long)]
    pub strict_priority: bool,

    /// Run the command line through `sh -c`.
    #[arg(long)]
    pub shell: bool,

    /// Command and arguments to execute.
    #[arg(trailing_var_arg = true, required = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

impl LaunchArgs {
    /// Command line built from the trailing arguments. A single argument is
    /// taken as a complete command line; several are quoted back together.
    pub fn command_line(&self) -> String {
        if self.shell {
            return crate::command::format_cmd(&self.command.join(" "));
        }
        match self.command.as_slice() {
            [line] => line.clone(),
            words => shell_words::join(words),
        }
    }

    /// Applies the flags on top of `base`.
    pub fn options(&self, base: ExecOptions) -> ExecOptions {
        let mut options = base;
        if let Some(dir) = &self.cwd {
            options.working_dir = Some(dir.clone());
        }
        if let Some(priority) = self.priority {
            options.priority = priority;
        }
        options.show_window |= self.show_window;
        options.strict_priority |= self.strict_priority;
        options
    }
}

/// Available commands for clu.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a command to completion and print its output.
    Run {
        /// Launch options and the command.
        #[command(flatten)]
        launch: LaunchArgs,

        /// Do not capture standard output.
        #[arg(long)]
        no_capture: bool,

        /// Emit machine-readable JSON instead of the raw output.
        #[arg(long)]
        json: bool,
    },

    /// Start a command and return immediately, printing its PID.
    Spawn {
        /// Launch options and the command.
        #[command(flatten)]
        launch: LaunchArgs,
    },

    /// Start a command and keep it alive until it exits or Ctrl-C kills it.
    Start {
        /// Launch options and the command.
        #[command(flatten)]
        launch: LaunchArgs,
    },

    /// Run a command defined in the configuration file, in its configured mode.
    Task {
        /// Name of the command under `commands:`.
        name: String,
    },

    /// Print a command wrapped for execution through the shell.
    Format {
        /// Raw shell command.
        #[arg(trailing_var_arg = true, required = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
}

/// Parses command-line arguments and returns a `Cli` struct.
pub fn parse_args() -> Cli {
    Cli::parse()
}
