use std::{
    error::Error,
    io::Write,
    path::Path,
    sync::mpsc::{self, RecvTimeoutError},
};

use serde::Serialize;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use clu::{
    ExecOptions, Executor, ExitSummary,
    cli::{Cli, Commands, parse_args},
    config::{Config, ExecMode, load_config},
    constants::{DEFAULT_CONFIG_FILE, PERMANENT_POLL_INTERVAL},
    format_cmd, last_error,
};

/// JSON shape printed by `clu run --json`.
#[derive(Serialize)]
struct RunReport<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<&'a str>,
    #[serde(flatten)]
    exit: ExitSummary,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = parse_args();
    init_logging(&args);

    let config = load_optional_config(args.config.as_deref())?;
    let base = config
        .as_ref()
        .map(Config::default_options)
        .unwrap_or_default();
    let executor = Executor::new();

    match args.command {
        Commands::Run {
            launch,
            no_capture,
            json,
        } => {
            let options = launch.options(base);
            let code = run_sync(&executor, &launch.command_line(), &options, !no_capture, json)?;
            std::process::exit(code);
        }
        Commands::Spawn { launch } => {
            let pid = executor
                .async_execute(&launch.command_line(), &launch.options(base), None)
                .inspect_err(report_os_error)?;
            println!("{pid}");
        }
        Commands::Start { launch } => {
            run_permanent(&executor, &launch.command_line(), &launch.options(base))?;
        }
        Commands::Task { name } => {
            let Some(config) = config else {
                return Err(format!(
                    "task '{name}' needs a configuration file (looked for {DEFAULT_CONFIG_FILE})"
                )
                .into());
            };
            let task = config.command(&name)?;
            let options = config.options_for(task);
            let command = task.command_line();
            info!("Running task '{name}' ({}): `{command}`", task.mode);

            match task.mode {
                ExecMode::Sync => {
                    let code = run_sync(&executor, &command, &options, task.capture, false)?;
                    std::process::exit(code);
                }
                ExecMode::Async => {
                    let pid = executor
                        .async_execute(&command, &options, None)
                        .inspect_err(report_os_error)?;
                    println!("{pid}");
                }
                ExecMode::Permanent => run_permanent(&executor, &command, &options)?,
            }
        }
        Commands::Format { command } => {
            println!("{}", format_cmd(&command.join(" ")));
        }
    }

    Ok(())
}

fn init_logging(args: &Cli) {
    let filter = if let Some(level) = args.log_level {
        EnvFilter::new(level.as_str())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// An explicit `--config` must exist; the default file is optional.
fn load_optional_config(path: Option<&str>) -> Result<Option<Config>, Box<dyn Error>> {
    match path {
        Some(path) => Ok(Some(load_config(Some(path))?)),
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => Ok(Some(load_config(None)?)),
        None => Ok(None),
    }
}

fn report_os_error(err: &clu::ExecError) {
    if err.raw_os_error().is_some() {
        let last = last_error();
        error!("{err} (os error {}: {})", last.code(), last.message());
    } else {
        error!("{err}");
    }
}

/// Runs a command synchronously and returns the exit code to hand back to the shell.
fn run_sync(
    executor: &Executor,
    command: &str,
    options: &ExecOptions,
    capture: bool,
    json: bool,
) -> Result<i32, Box<dyn Error>> {
    let mut output = String::new();
    let summary = executor
        .sync_execute(command, options, capture.then_some(&mut output))
        .inspect_err(report_os_error)?;

    if json {
        let report = RunReport {
            output: capture.then_some(output.as_str()),
            exit: summary,
        };
        println!("{}", serde_json::to_string(&report)?);
    } else if capture {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(output.as_bytes())?;
        stdout.flush()?;
    }

    if !summary.success() {
        warn!("`{command}` exited with {summary:?}");
    }
    Ok(summary
        .code
        .unwrap_or_else(|| 128 + summary.signal.unwrap_or(0)))
}

/// Starts a permanent process and babysits it until it exits on its own or
/// the user interrupts, in which case it is killed.
fn run_permanent(
    executor: &Executor,
    command: &str,
    options: &ExecOptions,
) -> Result<(), Box<dyn Error>> {
    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })?;

    let id = executor
        .permanent_execute(command, options, None)
        .inspect_err(report_os_error)?;
    println!("{}", id.pid());

    loop {
        match rx.recv_timeout(PERMANENT_POLL_INTERVAL) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                info!("Interrupted; terminating PID {}", id.pid());
                executor.kill_permanent(&id).inspect_err(report_os_error)?;
                return Ok(());
            }
            Err(RecvTimeoutError::Timeout) => {
                if !executor.is_running(&id)? {
                    info!("PID {} exited", id.pid());
                    return Ok(());
                }
            }
        }
    }
}
