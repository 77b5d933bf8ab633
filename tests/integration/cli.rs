#[path = "common/mod.rs"]
mod common;

use std::fs;

use assert_cmd::Command;
use common::{force_kill, is_process_alive};
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::tempdir;

fn clu() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("clu"));
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn run_prints_captured_output() {
    let dir = tempdir().unwrap();
    clu()
        .current_dir(dir.path())
        .args(["run", "--", "printf", "%s-%s", "a b", "c"])
        .assert()
        .success()
        .stdout("a b-c");
}

#[test]
fn run_json_reports_output_and_exit_code() {
    let dir = tempdir().unwrap();
    let assert = clu()
        .current_dir(dir.path())
        .args(["run", "--json", "--shell", "echo hi; exit 3"])
        .assert()
        .code(3);

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let report: serde_json::Value = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(report["output"], "hi\n");
    assert_eq!(report["code"], 3);
    assert!(report.get("signal").is_none());
}

#[test]
fn run_propagates_exit_code() {
    let dir = tempdir().unwrap();
    clu()
        .current_dir(dir.path())
        .args(["run", "false"])
        .assert()
        .code(1);
}

#[test]
fn run_reports_missing_program() {
    let dir = tempdir().unwrap();
    clu()
        .current_dir(dir.path())
        .args(["run", "clu-cli-no-such-binary"])
        .assert()
        .failure()
        .stderr(contains("clu-cli-no-such-binary").and(contains("os error")));
}

#[test]
fn errors_without_os_code_omit_os_text() {
    let dir = tempdir().unwrap();
    clu()
        .current_dir(dir.path())
        .args(["run", "--", "echo 'oops"])
        .assert()
        .failure()
        .stderr(contains("Invalid command line").and(contains("os error").not()));
}

#[test]
fn format_wraps_command_for_shell() {
    clu()
        .args(["format", "ls | wc -l"])
        .assert()
        .success()
        .stdout("sh -c 'ls | wc -l'\n");
}

#[test]
fn spawn_prints_pid_and_returns() {
    let dir = tempdir().unwrap();
    let assert = clu()
        .current_dir(dir.path())
        .args(["spawn", "sleep", "5"])
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let pid: u32 = stdout.trim().parse().unwrap();
    assert!(is_process_alive(pid));

    force_kill(pid);
}

#[test]
fn task_runs_configured_command() {
    let dir = tempdir().unwrap();
    fs::create_dir(dir.path().join("work")).unwrap();
    fs::write(dir.path().join("work").join("marker.txt"), "").unwrap();
    fs::write(
        dir.path().join("clu.yaml"),
        r#"
version: "1"
defaults:
  working_dir: work
  priority: low
commands:
  list:
    command: "ls"
  count:
    command: "ls | wc -l"
    shell: true
"#,
    )
    .unwrap();

    clu()
        .current_dir(dir.path())
        .args(["task", "list"])
        .assert()
        .success()
        .stdout(contains("marker.txt"));

    clu()
        .current_dir(dir.path())
        .args(["task", "count"])
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"^\s*1\s*$").unwrap());
}

#[test]
fn task_without_config_fails() {
    let dir = tempdir().unwrap();
    clu()
        .current_dir(dir.path())
        .args(["task", "anything"])
        .assert()
        .failure()
        .stderr(contains("configuration file"));
}

#[test]
fn unknown_task_is_reported() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("clu.yaml"), "version: \"1\"\n").unwrap();
    clu()
        .current_dir(dir.path())
        .args(["task", "missing"])
        .assert()
        .failure()
        .stderr(contains("missing"));
}
