//! Process creation shared by every execution mode.
use std::{
    os::fd::OwnedFd,
    path::PathBuf,
    process::{Child, Command, Stdio},
};

#[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))]
use nix::fcntl::OFlag;
use tracing::{debug, error, warn};

use crate::{
    command::split_command_line,
    error::{ExecError, errno_to_io},
    output::OutputBuffer,
    priority::ProcessPriority,
};

/// Everything needed to create one process.
#[derive(Debug, Clone, Default)]
pub struct LaunchRequest {
    /// Command line, used verbatim.
    pub command: String,
    /// Working directory. `None` inherits the caller's.
    pub working_dir: Option<PathBuf>,
    /// Priority class applied right after creation.
    pub priority: ProcessPriority,
    /// Let the child write to the caller's terminal. Hidden children get
    /// `/dev/null` for every stream that is not captured.
    pub show_window: bool,
    /// Fail the launch (killing the child) if the priority cannot be applied.
    pub strict_priority: bool,
}

impl LaunchRequest {
    /// Request for `command` with default options.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Self::default()
        }
    }
}

/// Creates the process described by `request`.
///
/// When `output` is given, the child's standard output is a pipe whose read
/// end is handed to the buffer. The parent's copy of the write end is closed
/// before this returns so the buffer observes end of stream once the child
/// exits. On failure nothing is left open and `output` is untouched.
pub fn launch(
    request: &LaunchRequest,
    output: Option<&mut OutputBuffer>,
) -> Result<Child, ExecError> {
    let argv = split_command_line(&request.command).map_err(ExecError::recorded)?;

    let mut cmd = Command::new(&argv[0]);
    cmd.args(&argv[1..]);
    if let Some(dir) = &request.working_dir {
        cmd.current_dir(dir);
    }

    let visible = || {
        if request.show_window {
            Stdio::inherit()
        } else {
            Stdio::null()
        }
    };
    cmd.stderr(visible());

    let read_end = if output.is_some() {
        let (read_end, write_end) = create_pipe()?;
        cmd.stdin(Stdio::inherit()).stdout(Stdio::from(write_end));
        Some(read_end)
    } else {
        cmd.stdin(visible()).stdout(visible());
        None
    };

    debug!("Executing command: {cmd:?}");
    let spawned = cmd.spawn();
    // The command holds the parent's copy of the pipe's write end.
    drop(cmd);

    let mut child = match spawned {
        Ok(child) => child,
        Err(source) => {
            error!("Failed to launch `{}`: {source}", request.command);
            return Err(ExecError::Launch {
                command: request.command.clone(),
                source,
            }
            .recorded());
        }
    };
    let pid = child.id();
    debug!("Launched `{}` with PID {pid}", request.command);

    if let Err(source) = request.priority.apply(pid) {
        if request.strict_priority {
            error!(
                "Failed to apply {} priority to PID {pid}: {source}; terminating it",
                request.priority
            );
            let _ = child.kill();
            let _ = child.wait();
            return Err(ExecError::Priority { pid, source }.recorded());
        }
        warn!(
            "Failed to apply {} priority to PID {pid}: {source}",
            request.priority
        );
    }

    if let (Some(buffer), Some(read_end)) = (output, read_end) {
        buffer.set_handle(read_end);
    }

    Ok(child)
}

/// Reads back the priority class of a running process.
pub fn current_priority(pid: u32) -> Result<ProcessPriority, ExecError> {
    ProcessPriority::of_process(pid).map_err(|source| ExecError::Priority { pid, source }.recorded())
}

/// Anonymous pipe with both ends close-on-exec; the child only sees the write
/// end through its duplicated standard output.
#[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))]
pub(crate) fn create_pipe() -> Result<(OwnedFd, OwnedFd), ExecError> {
    nix::unistd::pipe2(OFlag::O_CLOEXEC).map_err(|err| ExecError::Pipe(errno_to_io(err)).recorded())
}

#[cfg(not(any(target_os = "linux", target_os = "android", target_os = "freebsd")))]
pub(crate) fn create_pipe() -> Result<(OwnedFd, OwnedFd), ExecError> {
    use std::os::fd::AsRawFd;

    use nix::fcntl::{FcntlArg, FdFlag, fcntl};

    let pipe_err = |err| ExecError::Pipe(errno_to_io(err)).recorded();

    // No pipe2 here: a fork on another thread may briefly inherit these.
    let (read_end, write_end) = nix::unistd::pipe().map_err(pipe_err)?;
    for fd in [&read_end, &write_end] {
        fcntl(fd.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC)).map_err(pipe_err)?;
    }
    Ok((read_end, write_end))
}
