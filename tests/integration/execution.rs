#[path = "common/mod.rs"]
mod common;

use std::time::{Duration, Instant};

use clu::{
    ExecError, ExecOptions, Executor, ProcessPriority, constants::NICE_LOW, format_cmd,
    last_error, launcher::current_priority,
};
use common::{can_raise_priority, force_kill, is_process_alive, own_nice};
use tempfile::tempdir;

#[test]
fn sync_captures_exact_output() {
    let executor = Executor::new();
    let mut output = String::new();

    let summary = executor
        .sync_execute("printf 'one\\ntwo\\n'", &ExecOptions::default(), Some(&mut output))
        .unwrap();

    assert!(summary.success());
    assert_eq!(summary.code, Some(0));
    assert_eq!(output, "one\ntwo\n");
}

#[test]
fn non_zero_exit_keeps_output() {
    let executor = Executor::new();
    let mut output = String::new();

    let summary = executor
        .sync_execute(
            &format_cmd("printf partial; exit 7"),
            &ExecOptions::default(),
            Some(&mut output),
        )
        .unwrap();

    assert_eq!(summary.code, Some(7));
    assert!(!summary.success());
    assert_eq!(output, "partial");
}

#[test]
fn sync_runs_in_working_dir() {
    let dir = tempdir().unwrap();
    let executor = Executor::new();
    let mut output = String::new();

    executor
        .sync_execute(
            "pwd",
            &ExecOptions::default().working_dir(dir.path()),
            Some(&mut output),
        )
        .unwrap();

    let expected = dir.path().canonicalize().unwrap();
    assert_eq!(output.trim_end(), expected.to_str().unwrap());
}

#[test]
fn launch_failure_is_reported_through_last_error() {
    let executor = Executor::new();
    let mut output = String::from("untouched");

    let err = executor
        .sync_execute(
            "clu-integration-no-such-binary",
            &ExecOptions::default(),
            Some(&mut output),
        )
        .unwrap_err();

    assert!(matches!(err, ExecError::Launch { .. }));
    assert_eq!(output, "untouched");
    assert_eq!(last_error().code(), libc::ENOENT);
    assert!(!last_error().message().is_empty());
}

#[test]
fn async_returns_while_child_runs() {
    let executor = Executor::new();
    let started = Instant::now();

    let pid = executor
        .async_execute("sleep 3", &ExecOptions::default(), None)
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(pid > 0);
    assert!(is_process_alive(pid));
    assert_eq!(executor.reap_detached(), 1);

    force_kill(pid);
}

#[test]
fn low_priority_is_applied() {
    if own_nice() > NICE_LOW {
        eprintln!("skipping: test runner is already nicer than the low class");
        return;
    }

    let executor = Executor::new();
    let options = ExecOptions::default().priority(ProcessPriority::Low);
    let pid = executor.async_execute("sleep 2", &options, None).unwrap();

    assert_eq!(current_priority(pid).unwrap(), ProcessPriority::Low);

    force_kill(pid);
}

/// Unprivileged processes may only lower their priority.
fn attainable(priority: ProcessPriority) -> bool {
    can_raise_priority() || priority.nice() >= own_nice()
}

#[test]
fn every_priority_class_reads_back_after_launch() {
    let executor = Executor::new();

    for priority in ProcessPriority::ALL {
        if !attainable(priority) {
            eprintln!("skipping {priority}: needs privileges to raise priority");
            continue;
        }

        let options = ExecOptions::default().priority(priority);
        let pid = executor.async_execute("sleep 2", &options, None).unwrap();
        assert_eq!(current_priority(pid).unwrap(), priority, "class {priority}");
        force_kill(pid);
    }
}

#[test]
fn out_of_range_priority_launches_at_normal() {
    let priority = ProcessPriority::from_raw(99);
    assert_eq!(priority, ProcessPriority::Normal);
    if !attainable(priority) {
        eprintln!("skipping: test runner is nicer than the normal class");
        return;
    }

    let executor = Executor::new();
    let options = ExecOptions::default().priority(priority);
    let pid = executor.async_execute("sleep 2", &options, None).unwrap();
    assert_eq!(current_priority(pid).unwrap(), ProcessPriority::Normal);
    force_kill(pid);
}

#[test]
fn very_high_priority_needs_privileges() {
    let executor = Executor::new();

    if can_raise_priority() {
        let options = ExecOptions::default().priority(ProcessPriority::VeryHigh);
        let pid = executor.async_execute("sleep 2", &options, None).unwrap();
        assert_eq!(current_priority(pid).unwrap(), ProcessPriority::VeryHigh);
        force_kill(pid);
        return;
    }

    // Without privileges the launch still succeeds unless the priority is strict.
    let lenient = ExecOptions::default().priority(ProcessPriority::VeryHigh);
    let summary = executor.sync_execute("true", &lenient, None).unwrap();
    assert!(summary.success());

    let strict = lenient.strict_priority(true);
    let err = executor.sync_execute("sleep 5", &strict, None).unwrap_err();
    match err {
        ExecError::Priority { pid, .. } => common::wait_for_process_exit(pid),
        other => panic!("expected a priority error, got {other:?}"),
    }
    assert_ne!(last_error().code(), 0);
}
