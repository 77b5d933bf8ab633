#[path = "common/mod.rs"]
mod common;

use clu::{ExecError, ExecOptions, Executor, OutputBuffer, format_cmd};

#[test]
fn detached_buffer_cannot_fill() {
    let mut output = OutputBuffer::new();
    assert!(!output.is_attached());
    assert!(matches!(output.fill(), Err(ExecError::Detached)));
    assert_eq!(output.get(), "");
}

#[test]
fn async_output_is_drained_by_caller() {
    let executor = Executor::new();
    let mut output = OutputBuffer::new();

    executor
        .async_execute("printf hello", &ExecOptions::default(), Some(&mut output))
        .unwrap();

    assert_eq!(output.fill().unwrap(), 5);
    assert_eq!(output.get(), "hello");

    output.flush();
    assert_eq!(output.get(), "");
    assert!(output.is_attached());

    output.release().unwrap();
    assert!(!output.is_attached());
}

#[test]
fn large_output_does_not_deadlock() {
    let executor = Executor::new();
    let mut output = String::new();

    let summary = executor
        .sync_execute(
            &format_cmd("yes abcdefghi | head -n 20000"),
            &ExecOptions::default(),
            Some(&mut output),
        )
        .unwrap();

    assert!(summary.success());
    assert_eq!(output.len(), 200_000);
    assert!(output.lines().all(|line| line == "abcdefghi"));
}

#[test]
fn multibyte_output_survives_small_reads() {
    let executor = Executor::new();
    let mut output = String::new();
    let text = "héllo wörld ✓ ".repeat(40);

    executor
        .sync_execute(
            &format!("printf %s {}", shell_quote(&text)),
            &ExecOptions::default(),
            Some(&mut output),
        )
        .unwrap();

    assert_eq!(output, text);
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
