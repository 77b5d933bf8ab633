//! Error handling for clu.
use std::cell::Cell;

use nix::errno::Errno;
use thiserror::Error;

/// Defines all possible errors raised while launching, waiting on or
/// terminating a process.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The command line was empty or could not be split into arguments.
    #[error("Invalid command line `{command}`: {reason}")]
    InvalidCommand {
        /// The offending command line.
        command: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The OS refused to create the process.
    #[error("Failed to launch `{command}`: {source}")]
    Launch {
        /// The command line that failed to start.
        command: String,
        /// The underlying error that occurred.
        #[source]
        source: std::io::Error,
    },

    /// The anonymous pipe used for output capture could not be created.
    #[error("Failed to create output pipe: {0}")]
    Pipe(#[source] std::io::Error),

    /// Reading from the output pipe failed for a reason other than closure.
    #[error("Failed to read process output: {0}")]
    Read(#[source] std::io::Error),

    /// The output buffer has no pipe attached.
    #[error("Output buffer is not attached to a process")]
    Detached,

    /// Waiting for the process or retrieving its exit status failed.
    #[error("Failed to wait for PID {pid}: {source}")]
    Wait {
        /// PID of the process being waited on.
        pid: u32,
        /// The underlying error that occurred.
        #[source]
        source: std::io::Error,
    },

    /// The requested priority class could not be applied.
    #[error("Failed to set priority of PID {pid}: {source}")]
    Priority {
        /// PID of the process.
        pid: u32,
        /// The underlying error that occurred.
        #[source]
        source: std::io::Error,
    },

    /// Forced termination of a permanent process failed.
    #[error("Failed to terminate PID {pid}: {source}")]
    Terminate {
        /// PID of the process.
        pid: u32,
        /// The underlying error that occurred.
        #[source]
        source: std::io::Error,
    },

    /// The handle was never produced by `permanent_execute`, or was already killed.
    #[error("Process {0} is not a registered permanent process")]
    NotRegistered(String),

    /// Closing an owned handle failed.
    #[error("Failed to close handle: {0}")]
    Close(#[source] std::io::Error),

    /// Error for poisoned mutex.
    #[error("Mutex is poisoned: {0}")]
    Poisoned(String),
}

impl ExecError {
    /// Raw OS error code carried by this error, if any.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            ExecError::Launch { source, .. }
            | ExecError::Wait { source, .. }
            | ExecError::Priority { source, .. }
            | ExecError::Terminate { source, .. } => source.raw_os_error(),
            ExecError::Pipe(source) | ExecError::Read(source) | ExecError::Close(source) => {
                source.raw_os_error()
            }
            _ => None,
        }
    }

    /// Records the carried OS error code as the calling thread's last error
    /// and hands the error back.
    pub(crate) fn recorded(self) -> Self {
        if let Some(code) = self.raw_os_error() {
            record_os_error(code);
        }
        self
    }
}

/// Implement the `From` trait to convert a `std::sync::PoisonError` into an `ExecError`.
impl<T> From<std::sync::PoisonError<T>> for ExecError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        ExecError::Poisoned(err.to_string())
    }
}

/// Converts a nix errno into the `std::io::Error` carried by [`ExecError`].
pub(crate) fn errno_to_io(err: Errno) -> std::io::Error {
    std::io::Error::from_raw_os_error(err as i32)
}

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Error reading or accessing a configuration file.
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Error parsing YAML configuration.
    #[error("Invalid YAML format: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// A `${VAR}` reference named an unset variable.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    /// The named command is not defined in the configuration.
    #[error("Command '{0}' is not defined in the configuration")]
    UnknownCommand(String),
}

thread_local! {
    static LAST_OS_ERROR: Cell<Option<i32>> = const { Cell::new(None) };
}

/// Stores `code` as the calling thread's most recent OS error.
pub(crate) fn record_os_error(code: i32) {
    LAST_OS_ERROR.with(|slot| slot.set(Some(code)));
}

/// Snapshot of the calling thread's most recent OS error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastError {
    code: i32,
}

impl LastError {
    /// Numeric OS error code (`errno`). Zero means no error.
    pub fn code(&self) -> i32 {
        self.code
    }

    /// Human-readable description of the code as reported by the system.
    pub fn message(&self) -> String {
        Errno::from_raw(self.code).desc().to_string()
    }

    /// Same as [`LastError::message`], cut to at most `size` bytes without
    /// splitting a character.
    pub fn message_truncated(&self, size: usize) -> String {
        let mut message = self.message();
        if message.len() > size {
            let mut end = size;
            while !message.is_char_boundary(end) {
                end -= 1;
            }
            message.truncate(end);
        }
        message
    }
}

/// Returns the most recent OS error recorded by a failed operation on the
/// calling thread, falling back to the thread's current `errno`.
pub fn last_error() -> LastError {
    let code = LAST_OS_ERROR
        .with(Cell::get)
        .unwrap_or_else(|| Errno::last() as i32);
    LastError { code }
}
