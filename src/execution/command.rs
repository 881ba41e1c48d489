//! Command building and representation.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::hook::{Hook, OutputHook};
use crate::stream::ReadableStream;
use crate::Result;

use super::process::CommandProcess;

/// A program invocation together with its stream pipeline.
pub struct Command {
    /// Program followed by its arguments.
    pub(crate) argv: Vec<String>,
    /// Working directory override (if any).
    pub(crate) current_dir: Option<PathBuf>,
    /// Environment variables to set.
    pub(crate) env: HashMap<String, String>,
    /// Keep the parent's environment underneath `env`.
    pub(crate) inherit_env: bool,
    /// Maximum run time before the process is terminated.
    pub(crate) timeout: Option<Duration>,
    pub(crate) success_code: i32,
    pub(crate) ignore_codes: Vec<i32>,
    pub(crate) std_input: Option<ReadableStream>,
    pub(crate) input_hooks: Vec<Hook>,
    pub(crate) output_hooks: Vec<OutputHook>,
    pub(crate) debug_log_dir: Option<PathBuf>,
}

impl Command {
    /// Create a command from a program and its arguments.
    ///
    /// The child starts with an empty environment; see
    /// [`inherit_env`](Self::inherit_env).
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            current_dir: None,
            env: HashMap::new(),
            inherit_env: false,
            timeout: None,
            success_code: 0,
            ignore_codes: Vec::new(),
            std_input: None,
            input_hooks: Vec::new(),
            output_hooks: Vec::new(),
            debug_log_dir: None,
        }
    }

    /// Append an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.argv.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.argv.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Add an environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Add multiple environment variables.
    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in vars {
            self.env.insert(k.into(), v.into());
        }
        self
    }

    /// Start from the parent's environment instead of an empty one.
    pub fn inherit_env(mut self, inherit: bool) -> Self {
        self.inherit_env = inherit;
        self
    }

    /// Set the execution timeout.
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Set or clear the execution timeout.
    pub fn maybe_timeout(mut self, duration: Option<Duration>) -> Self {
        self.timeout = duration;
        self
    }

    /// Exit code that counts as success. Defaults to `0`.
    pub fn success_code(mut self, code: i32) -> Self {
        self.success_code = code;
        self
    }

    /// Additional exit codes that count as success.
    pub fn ignore_codes(mut self, codes: impl IntoIterator<Item = i32>) -> Self {
        self.ignore_codes.extend(codes);
        self
    }

    /// Stream fed to the first input hook, or to stdin directly.
    pub fn std_input(mut self, input: ReadableStream) -> Self {
        self.std_input = Some(input);
        self
    }

    /// Append a hook to the input chain.
    pub fn input_hook(mut self, hook: Hook) -> Self {
        self.input_hooks.push(hook);
        self
    }

    /// Append an output hook. Output hooks apply in insertion order.
    pub fn output_hook(mut self, hook: OutputHook) -> Self {
        self.output_hooks.push(hook);
        self
    }

    /// Log every stream boundary under `dir`.
    pub fn debug_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.debug_log_dir = Some(dir.into());
        self
    }

    /// Program and arguments.
    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// The configured timeout, if any.
    pub fn get_timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Exit codes treated as success, the success code first.
    pub fn accepted_codes(&self) -> Vec<i32> {
        let mut codes = vec![self.success_code];
        codes.extend(self.ignore_codes.iter().copied().filter(|c| *c != self.success_code));
        codes
    }

    /// Spawn the process with its pipeline.
    ///
    /// Shorthand for [`execute_command`](super::execute_command).
    pub fn spawn(self) -> Result<CommandProcess> {
        super::execute_command(self)
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("argv", &self.argv)
            .field("current_dir", &self.current_dir)
            .field("env", &self.env)
            .field("inherit_env", &self.inherit_env)
            .field("timeout", &self.timeout)
            .field("accepted_codes", &self.accepted_codes())
            .field("std_input", &self.std_input.is_some())
            .field("input_hooks", &self.input_hooks)
            .field("output_hooks", &self.output_hooks)
            .field("debug_log_dir", &self.debug_log_dir)
            .finish()
    }
}
