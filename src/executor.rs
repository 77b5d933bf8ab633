//! The three execution modes: async, permanent and synchronous.
use std::{
    os::unix::process::ExitStatusExt,
    path::PathBuf,
    process::{Child, ExitStatus},
    sync::{Mutex, OnceLock},
};

use serde::Serialize;
use tracing::{debug, warn};

use crate::{
    error::ExecError,
    launcher::{LaunchRequest, launch},
    output::OutputBuffer,
    priority::ProcessPriority,
    registry::{ProcessId, ProcessRegistry},
};

/// Launch options shared by every execution mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOptions {
    /// Working directory. `None` inherits the caller's.
    pub working_dir: Option<PathBuf>,
    /// Let the child write to the caller's terminal.
    pub show_window: bool,
    /// Priority class applied right after creation.
    pub priority: ProcessPriority,
    /// Treat a priority that cannot be applied as a launch failure.
    pub strict_priority: bool,
}

impl ExecOptions {
    /// Sets the working directory.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Sets window visibility.
    pub fn show_window(mut self, show: bool) -> Self {
        self.show_window = show;
        self
    }

    /// Sets the priority class.
    pub fn priority(mut self, priority: ProcessPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Sets whether a failed priority change aborts the launch.
    pub fn strict_priority(mut self, strict: bool) -> Self {
        self.strict_priority = strict;
        self
    }

    fn request(&self, command: &str) -> LaunchRequest {
        LaunchRequest {
            command: command.to_string(),
            working_dir: self.working_dir.clone(),
            priority: self.priority,
            show_window: self.show_window,
            strict_priority: self.strict_priority,
        }
    }
}

/// How a synchronously executed process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExitSummary {
    /// Exit code if the process terminated normally.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<i32>,
    /// Signal number if the process was terminated by a signal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<i32>,
}

impl ExitSummary {
    /// Whether the process exited with code 0.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<ExitStatus> for ExitSummary {
    fn from(status: ExitStatus) -> Self {
        Self {
            code: status.code(),
            signal: status.signal(),
        }
    }
}

/// Launches processes and keeps track of the ones it is responsible for.
///
/// Permanent processes live in the executor's [`ProcessRegistry`] until
/// [`Executor::kill_permanent`] succeeds. Async children are never exposed;
/// they are only kept long enough to be reaped once they exit.
#[derive(Debug, Default)]
pub struct Executor {
    registry: ProcessRegistry,
    detached: Mutex<Vec<Child>>,
}

static GLOBAL: OnceLock<Executor> = OnceLock::new();

impl Executor {
    /// Creates an executor with an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an executor that records permanent processes in `registry`.
    pub fn with_registry(registry: ProcessRegistry) -> Self {
        Self {
            registry,
            detached: Mutex::default(),
        }
    }

    /// Process-wide executor, created on first use and never dropped.
    pub fn global() -> &'static Executor {
        GLOBAL.get_or_init(Executor::new)
    }

    /// Registry of the permanent processes started by this executor.
    pub fn registry(&self) -> &ProcessRegistry {
        &self.registry
    }

    /// Starts `command` and returns as soon as it is running.
    ///
    /// Returns the PID for information only: the process cannot be waited on
    /// or killed through the executor. When `output` is given it is attached
    /// to the child's standard output, and draining it is up to the caller.
    pub fn async_execute(
        &self,
        command: &str,
        options: &ExecOptions,
        output: Option<&mut OutputBuffer>,
    ) -> Result<u32, ExecError> {
        self.reap_detached();

        let child = launch(&options.request(command), output)?;
        let pid = child.id();
        debug!("Detached `{command}` (PID {pid})");
        self.detached.lock()?.push(child);
        Ok(pid)
    }

    /// Starts `command` and keeps it registered until
    /// [`Executor::kill_permanent`] is called with the returned id.
    ///
    /// An attached `output` buffer is only wired up. Once the pipe is full
    /// the child blocks on writes, so drain it (possibly from another thread)
    /// if the process produces a lot of output.
    pub fn permanent_execute(
        &self,
        command: &str,
        options: &ExecOptions,
        output: Option<&mut OutputBuffer>,
    ) -> Result<ProcessId, ExecError> {
        self.reap_detached();

        let child = launch(&options.request(command), output)?;
        self.registry.insert(child)
    }

    /// Runs `command` to completion, blocking without timeout.
    ///
    /// When `output` is given the child's standard output is captured and
    /// written to it (replacing its content) even if waiting or reading
    /// fails afterwards. A launch failure leaves `output` untouched.
    pub fn sync_execute(
        &self,
        command: &str,
        options: &ExecOptions,
        output: Option<&mut String>,
    ) -> Result<ExitSummary, ExecError> {
        self.reap_detached();

        // Must outlive the child until its output has been fully read.
        let mut buffer = OutputBuffer::new();
        let capture = output.is_some();
        let mut child = launch(&options.request(command), capture.then_some(&mut buffer))?;
        let pid = child.id();

        // Draining before the wait keeps a chatty child from blocking on a full pipe.
        let drained = if capture { buffer.fill().map(|_| ()) } else { Ok(()) };

        let waited = child.wait().map_err(|source| ExecError::Wait { pid, source }.recorded());

        let filled = if capture { buffer.fill().map(|_| ()) } else { Ok(()) };
        if let Some(output) = output {
            *output = buffer.get().to_owned();
        }

        let status = waited?;
        drained.and(filled)?;

        let summary = ExitSummary::from(status);
        if !summary.success() {
            debug!("`{command}` (PID {pid}) exited with {summary:?}");
        }
        Ok(summary)
    }

    /// Forcibly terminates a process started by [`Executor::permanent_execute`].
    ///
    /// Ids this executor did not hand out, or already killed, are rejected
    /// with [`ExecError::NotRegistered`] without touching any process. A
    /// process that already exited on its own yields [`ExecError::Terminate`]
    /// and stays registered.
    pub fn kill_permanent(&self, id: &ProcessId) -> Result<(), ExecError> {
        self.reap_detached();
        self.registry.kill(id)
    }

    /// Whether a permanent process is still running.
    pub fn is_running(&self, id: &ProcessId) -> Result<bool, ExecError> {
        self.registry.is_running(id)
    }

    /// Number of permanent processes awaiting termination.
    pub fn permanent_count(&self) -> Result<usize, ExecError> {
        self.registry.len()
    }

    /// Reaps async children that have exited. Returns how many are still running.
    pub fn reap_detached(&self) -> usize {
        let Ok(mut detached) = self.detached.lock() else {
            warn!("Detached process list is poisoned; skipping reap");
            return 0;
        };

        detached.retain_mut(|child| match child.try_wait() {
            Ok(Some(status)) => {
                debug!("Detached PID {} exited ({status})", child.id());
                false
            }
            Ok(None) => true,
            Err(err) => {
                warn!("Failed to poll detached PID {}: {err}", child.id());
                false
            }
        });
        detached.len()
    }
}
