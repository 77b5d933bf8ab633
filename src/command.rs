//! Command-line splitting and shell wrapping.
use crate::{
    constants::{DEFAULT_SHELL, SHELL_COMMAND_FLAG},
    error::ExecError,
};

/// Wraps a raw shell command so it runs through `sh -c`.
///
/// The launchers take command lines verbatim and never interpret pipes,
/// redirections or variables themselves; run the command through this
/// helper first when those are needed.
///
/// ```
/// assert_eq!(clu::format_cmd("echo $HOME | wc -c"), "sh -c 'echo $HOME | wc -c'");
/// ```
pub fn format_cmd(command: &str) -> String {
    format!(
        "{DEFAULT_SHELL} {SHELL_COMMAND_FLAG} {}",
        shell_words::quote(command)
    )
}

/// Splits a command line into program and arguments using POSIX word rules
/// (quotes and backslash escapes). No quoting is added.
pub fn split_command_line(command: &str) -> Result<Vec<String>, ExecError> {
    let argv = shell_words::split(command).map_err(|err| ExecError::InvalidCommand {
        command: command.to_string(),
        reason: err.to_string(),
    })?;

    if argv.is_empty() {
        return Err(ExecError::InvalidCommand {
            command: command.to_string(),
            reason: "no program given".into(),
        });
    }

    Ok(argv)
}
