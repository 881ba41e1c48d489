//! Command-line interface for hookshell.
//!
//! Uses lexopt for minimal binary size overhead (~34KB).

use std::ffi::OsString;
use std::path::PathBuf;

use crate::config::timeout_from_secs;

/// Command-line arguments.
#[derive(Debug, Clone, Default)]
pub struct Args {
    /// Program and arguments to run.
    pub command: Vec<String>,
    /// Working directory for the child.
    pub cwd: Option<PathBuf>,
    /// Extra environment variables.
    pub env: Vec<(String, String)>,
    /// Pass the parent's environment through.
    pub inherit_env: bool,
    /// Timeout in seconds.
    pub timeout: Option<f64>,
    /// Exit code that counts as success.
    pub success_code: Option<i32>,
    /// Additional accepted exit codes.
    pub ignore_codes: Vec<i32>,
    /// Text fed to the child's stdin.
    pub stdin: Option<String>,
    /// Interleave stderr into stdout.
    pub merge_stderr: bool,
    /// Print output line by line with stream prefixes.
    pub log_lines: bool,
    /// Directory for per-boundary debug logs.
    pub debug_dir: Option<PathBuf>,
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
}

/// Parse command-line arguments.
pub fn parse_args() -> Result<Args, ArgsError> {
    parse_args_from(std::env::args_os())
}

/// Parse arguments from an iterator (for testing).
///
/// Options end at the first positional argument; it and everything after
/// it form the command.
pub fn parse_args_from<I>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = OsString>,
{
    use lexopt::prelude::*;

    let mut result = Args::default();
    let mut parser = lexopt::Parser::from_iter(args);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => {
                result.help = true;
            }
            Short('V') | Long("version") => {
                result.version = true;
            }
            Short('C') | Long("cwd") => {
                result.cwd = Some(parser.value()?.parse()?);
            }
            Short('e') | Long("env") => {
                let value: String = parser.value()?.parse()?;
                let (key, val) = value
                    .split_once('=')
                    .filter(|(key, _)| !key.is_empty())
                    .ok_or_else(|| ArgsError::InvalidValue("env", value.clone()))?;
                result.env.push((key.to_string(), val.to_string()));
            }
            Long("inherit-env") => {
                result.inherit_env = true;
            }
            Short('t') | Long("timeout") => {
                let value: String = parser.value()?.parse()?;
                let secs = value
                    .parse::<f64>()
                    .ok()
                    .filter(|s| timeout_from_secs(*s).is_some())
                    .ok_or_else(|| ArgsError::InvalidValue("timeout", value.clone()))?;
                result.timeout = Some(secs);
            }
            Short('s') | Long("success-code") => {
                let value: String = parser.value()?.parse()?;
                result.success_code = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("success-code", value))?,
                );
            }
            Short('i') | Long("ignore-code") => {
                let value: String = parser.value()?.parse()?;
                for part in value.split(',') {
                    let code = part
                        .trim()
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("ignore-code", value.clone()))?;
                    result.ignore_codes.push(code);
                }
            }
            Long("stdin") => {
                result.stdin = Some(parser.value()?.parse()?);
            }
            Long("merge-stderr") => {
                result.merge_stderr = true;
            }
            Long("log-lines") => {
                result.log_lines = true;
            }
            Long("debug-dir") => {
                result.debug_dir = Some(parser.value()?.parse()?);
            }
            Short('c') | Long("config") => {
                result.config = Some(parser.value()?.parse()?);
            }
            Short('l') | Long("log-level") => {
                result.log_level = Some(parser.value()?.parse()?);
            }
            Value(program) => {
                result.command.push(program.string()?);
                for raw in parser.raw_args()? {
                    let arg = raw
                        .into_string()
                        .map_err(|raw| ArgsError::InvalidValue("command", raw.to_string_lossy().into()))?;
                    result.command.push(arg);
                }
                break;
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    Ok(result)
}

/// Print help message.
pub fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        r#"hookshell {version}
Run a command with its streams routed through hooks

USAGE:
    hookshell [OPTIONS] [--] <PROGRAM> [ARGS]...

OPTIONS:
    -C, --cwd <DIR>           Working directory for the command
    -e, --env <KEY=VALUE>     Set an environment variable (repeatable)
        --inherit-env         Pass this process's environment through
    -t, --timeout <SECS>      Terminate the command after SECS seconds
    -s, --success-code <N>    Exit code that counts as success [default: 0]
    -i, --ignore-code <N,..>  Additional exit codes that count as success
        --stdin <TEXT>        Feed TEXT to the command's stdin
        --merge-stderr        Interleave stderr into stdout line by line
        --log-lines           Prefix every output line with its stream
        --debug-dir <DIR>     Log every stream boundary under DIR
    -c, --config <FILE>       Path to configuration file (JSON)
    -l, --log-level <LVL>     Log level (error, warn, info, debug, trace)
    -h, --help                Print help
    -V, --version             Print version

ENVIRONMENT VARIABLES:
    HOOKSHELL_TIMEOUT         Timeout in seconds (overrides config)
    HOOKSHELL_DEBUG_DIR       Debug log directory (overrides config)
    HOOKSHELL_LOG_LEVEL       Log level (overrides config)
    RUST_LOG                  Alternative log level setting

EXIT STATUS:
    The command's own exit code when it is accepted or unexpected,
    128+N when it was killed by signal N, 124 on timeout,
    127 when it could not be started, 2 on usage errors.

EXAMPLES:
    # Run with a clean environment and a 10 second limit
    hookshell -t 10 -- /bin/sh -c 'echo hi'

    # Accept grep's "no match" status
    hookshell -i 1 -- /bin/grep needle haystack.txt

    # Feed stdin and keep debug logs
    hookshell --stdin 'hello' --debug-dir .commandlogging /bin/cat
"#
    );
}

/// Print version.
pub fn print_version() {
    println!("hookshell {}", env!("CARGO_PKG_VERSION"));
}

/// Argument parsing errors.
#[derive(Debug)]
pub enum ArgsError {
    /// Lexopt parsing error.
    Lexopt(lexopt::Error),
    /// Invalid argument value.
    InvalidValue(&'static str, String),
}

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexopt(e) => write!(f, "{}", e),
            Self::InvalidValue(name, value) => {
                write!(f, "invalid value for --{}: '{}'", name, value)
            }
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<lexopt::Error> for ArgsError {
    fn from(e: lexopt::Error) -> Self {
        Self::Lexopt(e)
    }
}
