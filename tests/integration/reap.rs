#[path = "common/mod.rs"]
mod common;

use clu::{ExecOptions, Executor};
use common::wait_for_process_exit;
use nix::sys::signal::{SigHandler, Signal, signal};

// Runs in its own test binary: ignoring SIGCHLD makes the kernel reap every
// child of this process, so `wait` after a kill fails with ECHILD.
#[test]
fn kill_succeeds_when_reaping_fails() {
    unsafe {
        signal(Signal::SIGCHLD, SigHandler::SigIgn).unwrap();
    }

    let executor = Executor::new();
    let id = executor
        .permanent_execute("sleep 30", &ExecOptions::default(), None)
        .unwrap();
    assert!(executor.is_running(&id).unwrap());

    executor.kill_permanent(&id).unwrap();
    assert_eq!(executor.permanent_count().unwrap(), 0);
    wait_for_process_exit(id.pid());
}
