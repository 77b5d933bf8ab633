//! Registry of caller-managed ("permanent") processes.

use std::{
    collections::HashMap,
    fmt,
    process::Child,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
};

use nix::{errno::Errno, sys::signal, unistd::Pid};
use tracing::{debug, warn};

use crate::{
    constants::KILL_SIGNAL,
    error::{ExecError, errno_to_io},
};

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier of a process started by `permanent_execute`.
///
/// Only a registry can mint one. The token is unique for the lifetime of the
/// program, so an id survives PID reuse and ids from another registry are
/// never mistaken for local entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessId {
    pid: u32,
    token: u64,
}

impl ProcessId {
    /// OS process id of the tracked process.
    pub fn pid(&self) -> u32 {
        self.pid
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.pid, self.token)
    }
}

/// Tracks the processes whose termination the caller is responsible for.
///
/// The registry owns each [`Child`] until it is killed. Dropping the
/// registry neither kills nor reaps what is left in it.
#[derive(Clone, Default)]
pub struct ProcessRegistry {
    processes: Arc<Mutex<HashMap<ProcessId, Child>>>,
}

impl ProcessRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes ownership of `child` and returns the id that refers to it.
    pub fn insert(&self, child: Child) -> Result<ProcessId, ExecError> {
        let id = ProcessId {
            pid: child.id(),
            token: NEXT_TOKEN.fetch_add(1, Ordering::Relaxed),
        };
        self.processes.lock()?.insert(id, child);
        debug!("Registered permanent process {id}");
        Ok(id)
    }

    /// Whether `id` refers to a process tracked here.
    pub fn contains(&self, id: &ProcessId) -> Result<bool, ExecError> {
        Ok(self.processes.lock()?.contains_key(id))
    }

    /// Number of tracked processes.
    pub fn len(&self) -> Result<usize, ExecError> {
        Ok(self.processes.lock()?.len())
    }

    /// Returns `true` when nothing is tracked.
    pub fn is_empty(&self) -> Result<bool, ExecError> {
        Ok(self.len()? == 0)
    }

    /// Ids of every tracked process.
    pub fn ids(&self) -> Result<Vec<ProcessId>, ExecError> {
        Ok(self.processes.lock()?.keys().copied().collect())
    }

    /// Whether the tracked process has not exited yet.
    pub fn is_running(&self, id: &ProcessId) -> Result<bool, ExecError> {
        let mut processes = self.processes.lock()?;
        let child = processes
            .get_mut(id)
            .ok_or_else(|| ExecError::NotRegistered(id.to_string()))?;
        let status = child.try_wait().map_err(|source| ExecError::Wait {
            pid: id.pid,
            source,
        })?;
        Ok(status.is_none())
    }

    /// Forcibly terminates a tracked process, then forgets and reaps it.
    ///
    /// Unknown ids are rejected before any signal is sent. A process that
    /// already exited cannot be terminated: its PID is not signalled, the
    /// call fails with `ESRCH` and the entry stays. If the signal cannot be
    /// delivered the entry stays as well.
    pub fn kill(&self, id: &ProcessId) -> Result<(), ExecError> {
        let mut processes = self.processes.lock()?;
        let Some(child) = processes.get_mut(id) else {
            return Err(ExecError::NotRegistered(id.to_string()).recorded());
        };

        // Once reaped the PID may belong to someone else; never signal it.
        let exited = child.try_wait().map_err(|source| {
            ExecError::Wait {
                pid: id.pid,
                source,
            }
            .recorded()
        })?;
        if let Some(status) = exited {
            warn!("Permanent process {id} already exited ({status}); nothing to terminate");
            return Err(ExecError::Terminate {
                pid: id.pid,
                source: errno_to_io(Errno::ESRCH),
            }
            .recorded());
        }

        if let Err(err) = signal::kill(Pid::from_raw(id.pid as i32), KILL_SIGNAL) {
            warn!("Failed to terminate permanent process {id}: {err}");
            return Err(ExecError::Terminate {
                pid: id.pid,
                source: errno_to_io(err),
            }
            .recorded());
        }

        let Some(mut child) = processes.remove(id) else {
            return Err(ExecError::NotRegistered(id.to_string()).recorded());
        };
        drop(processes);

        // The signal was delivered, so termination succeeded even if reaping fails.
        match child.wait() {
            Ok(status) => debug!("Permanent process {id} terminated ({status})"),
            Err(err) => warn!("Permanent process {id} was killed but could not be reaped: {err}"),
        }
        Ok(())
    }
}

impl fmt::Debug for ProcessRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tracked = self.processes.lock().map(|p| p.len()).unwrap_or_default();
        f.debug_struct("ProcessRegistry")
            .field("tracked", &tracked)
            .finish()
    }
}
