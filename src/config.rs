//! Configuration management for hookshell.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Default values

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cli::Args;
use crate::execution::Command;

/// Default directory for debug logs.
pub const DEFAULT_DEBUG_DIR: &str = ".commandlogging";

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Execution defaults.
    pub execution: ExecutionSection,
    /// Debug logging of stream boundaries.
    pub debug: DebugSection,
    /// Logging configuration.
    pub logging: LoggingSection,
}

/// Execution configuration section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionSection {
    /// Timeout in seconds; none means wait forever.
    pub timeout_secs: Option<f64>,
    /// Exit code that counts as success.
    pub success_code: i32,
    /// Additional accepted exit codes.
    pub ignore_codes: Vec<i32>,
    /// Pass the parent's environment to the child.
    pub inherit_env: bool,
}

/// Debug configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugSection {
    /// Write per-boundary logs for every command.
    pub enabled: bool,
    /// Base directory for those logs.
    pub log_dir: PathBuf,
}

impl Default for DebugSection {
    fn default() -> Self {
        Self {
            enabled: false,
            log_dir: PathBuf::from(DEFAULT_DEBUG_DIR),
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace).
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Json)
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(timeout) = std::env::var("HOOKSHELL_TIMEOUT") {
            let secs = parse_timeout(&timeout)
                .ok_or_else(|| ConfigError::InvalidTimeout(timeout.clone()))?;
            self.execution.timeout_secs = Some(secs);
        }

        if let Ok(dir) = std::env::var("HOOKSHELL_DEBUG_DIR") {
            if !dir.is_empty() {
                self.debug.enabled = true;
                self.debug.log_dir = PathBuf::from(dir);
            }
        }

        if let Ok(level) = std::env::var("HOOKSHELL_LOG_LEVEL") {
            self.logging.level = level;
        } else if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }
        Ok(())
    }

    /// Apply CLI argument overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(secs) = args.timeout {
            self.execution.timeout_secs = Some(secs);
        }

        if let Some(code) = args.success_code {
            self.execution.success_code = code;
        }

        for code in &args.ignore_codes {
            if !self.execution.ignore_codes.contains(code) {
                self.execution.ignore_codes.push(*code);
            }
        }

        if args.inherit_env {
            self.execution.inherit_env = true;
        }

        if let Some(ref dir) = args.debug_dir {
            self.debug.enabled = true;
            self.debug.log_dir = dir.clone();
        }

        if let Some(ref level) = args.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Load configuration with full priority chain.
    ///
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(ref path) = args.config {
            config = Config::from_file(path)?;
        }

        config.apply_env()?;
        config.apply_args(args);
        config.validate()?;

        Ok(config)
    }

    /// Reject values no command could run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(secs) = self.execution.timeout_secs {
            if timeout_from_secs(secs).is_none() {
                return Err(ConfigError::InvalidTimeout(secs.to_string()));
            }
        }
        Ok(())
    }

    /// The configured timeout.
    pub fn timeout(&self) -> Option<Duration> {
        self.execution.timeout_secs.and_then(timeout_from_secs)
    }

    /// Apply execution and debug defaults to `command`.
    pub fn apply_to(&self, command: Command) -> Command {
        let command = command
            .maybe_timeout(self.timeout())
            .success_code(self.execution.success_code)
            .ignore_codes(self.execution.ignore_codes.iter().copied())
            .inherit_env(self.execution.inherit_env);

        if self.debug.enabled {
            command.debug_log_dir(&self.debug.log_dir)
        } else {
            command
        }
    }

    /// Get the log level filter string.
    pub fn log_filter(&self) -> &str {
        &self.logging.level
    }
}

/// A positive timeout of `secs` seconds, if it fits in a [`Duration`].
pub(crate) fn timeout_from_secs(secs: f64) -> Option<Duration> {
    if secs > 0.0 {
        Duration::try_from_secs_f64(secs).ok()
    } else {
        None
    }
}

fn parse_timeout(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|s| timeout_from_secs(*s).is_some())
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    Io(std::io::Error),
    /// JSON parsing error.
    Json(serde_json::Error),
    /// Timeout that is not a positive number of seconds.
    InvalidTimeout(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config file: {}", e),
            Self::Json(e) => write!(f, "failed to parse config file: {}", e),
            Self::InvalidTimeout(value) => write!(f, "invalid timeout: {}", value),
        }
    }
}

impl std::error::Error for ConfigError {}
