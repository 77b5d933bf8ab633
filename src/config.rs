//! Configuration management for clu.
use regex::Regex;
use serde::Deserialize;
use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
    sync::OnceLock,
};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::{
    command::format_cmd, constants::DEFAULT_CONFIG_FILE, error::ConfigError,
    executor::ExecOptions, priority::ProcessPriority,
};

/// Represents the structure of the configuration file.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Configuration version.
    pub version: String,
    /// Options applied to every launch unless a command overrides them.
    #[serde(default)]
    pub defaults: Defaults,
    /// Named commands runnable with `clu task <name>`.
    #[serde(default)]
    pub commands: HashMap<String, CommandConfig>,
    /// Directory of the configuration file; relative paths resolve against it.
    #[serde(skip)]
    pub project_dir: Option<PathBuf>,
}

/// Launch defaults.
#[derive(Debug, Default, Deserialize, Clone)]
pub struct Defaults {
    /// Working directory for launched processes.
    pub working_dir: Option<String>,
    /// Priority class (`low`, `normal`, `high`, `very_high`).
    pub priority: Option<ProcessPriority>,
    /// Whether children may write to the terminal.
    pub show_window: Option<bool>,
    /// Whether a priority that cannot be applied aborts the launch.
    pub strict_priority: Option<bool>,
}

/// How a configured command is executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, AsRefStr, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExecMode {
    /// Wait for the process to exit.
    #[default]
    Sync,
    /// Return right after launching.
    Async,
    /// Keep the process registered until it is killed.
    Permanent,
}

/// A named command.
#[derive(Debug, Deserialize, Clone)]
pub struct CommandConfig {
    /// Command line to launch.
    pub command: String,
    /// Execution mode.
    #[serde(default)]
    pub mode: ExecMode,
    /// Run the command through `sh -c`.
    #[serde(default)]
    pub shell: bool,
    /// Capture standard output (sync mode prints it).
    #[serde(default = "default_capture")]
    pub capture: bool,
    /// Overrides `defaults.working_dir`.
    pub working_dir: Option<String>,
    /// Overrides `defaults.priority`.
    pub priority: Option<ProcessPriority>,
    /// Overrides `defaults.show_window`.
    pub show_window: Option<bool>,
    /// Overrides `defaults.strict_priority`.
    pub strict_priority: Option<bool>,
}

fn default_capture() -> bool {
    true
}

impl CommandConfig {
    /// Command line handed to the launcher.
    pub fn command_line(&self) -> String {
        if self.shell {
            format_cmd(&self.command)
        } else {
            self.command.clone()
        }
    }
}

impl Config {
    /// Looks up a named command.
    pub fn command(&self, name: &str) -> Result<&CommandConfig, ConfigError> {
        self.commands
            .get(name)
            .ok_or_else(|| ConfigError::UnknownCommand(name.to_string()))
    }

    /// Options built from `defaults` alone.
    pub fn default_options(&self) -> ExecOptions {
        ExecOptions {
            working_dir: self
                .defaults
                .working_dir
                .as_deref()
                .map(|dir| self.resolve_path(dir)),
            show_window: self.defaults.show_window.unwrap_or(false),
            priority: self.defaults.priority.unwrap_or_default(),
            strict_priority: self.defaults.strict_priority.unwrap_or(false),
        }
    }

    /// Options for a named command, falling back to `defaults` per field.
    pub fn options_for(&self, command: &CommandConfig) -> ExecOptions {
        let mut options = self.default_options();
        if let Some(dir) = &command.working_dir {
            options.working_dir = Some(self.resolve_path(dir));
        }
        if let Some(priority) = command.priority {
            options.priority = priority;
        }
        if let Some(show) = command.show_window {
            options.show_window = show;
        }
        if let Some(strict) = command.strict_priority {
            options.strict_priority = strict;
        }
        options
    }

    fn resolve_path(&self, raw: &str) -> PathBuf {
        let path = Path::new(raw);
        match &self.project_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{?([A-Za-z_][A-Za-z0-9_]*)\}?").expect("env var pattern is valid")
    })
}

/// Expands environment variables within a string.
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut missing = None;
    let result = env_var_pattern().replace_all(input, |caps: &regex::Captures| {
        let var_name = &caps[1];
        match env::var(var_name) {
            Ok(value) => value,
            Err(_) => {
                missing.get_or_insert_with(|| var_name.to_string());
                String::new()
            }
        }
    });

    match missing {
        Some(var_name) => Err(ConfigError::MissingEnvVar(var_name)),
        None => Ok(result.into_owned()),
    }
}

/// Loads and parses the configuration file, expanding environment variables.
pub fn load_config(config_path: Option<&str>) -> Result<Config, ConfigError> {
    let config_path = Path::new(config_path.unwrap_or(DEFAULT_CONFIG_FILE));

    let content = fs::read_to_string(config_path).map_err(|e| {
        ConfigError::ReadError(std::io::Error::new(
            e.kind(),
            format!("{} ({})", e, config_path.display()),
        ))
    })?;

    let expanded_content = expand_env_vars(&content)?;
    let mut config: Config = serde_yaml::from_str(&expanded_content)?;

    let base_path = config_path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    config.project_dir = Some(base_path);
    Ok(config)
}
