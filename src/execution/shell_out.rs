//! Run-and-capture convenience on top of [`execute_command`](super::execute_command).

use std::io::{self, Write};

use tracing::info;

use super::command::Command;
use crate::hook::{logger_line_hook, std_out_result_void_err, void_hook, OutputHook};
use crate::stream::display_bytes;
use crate::Result;

/// Runs a command to completion and returns what it printed.
#[derive(Debug)]
pub struct ShellOut {
    command: Command,
    output_is_log: bool,
    redirect_stderr_to_stdout: bool,
    print_output: bool,
    run_in_background: bool,
}

impl ShellOut {
    /// Wrap `command`. Stderr is merged into the captured output and the
    /// output is printed once the command finishes, unless turned off.
    pub fn new(command: Command) -> Self {
        Self {
            command,
            output_is_log: false,
            redirect_stderr_to_stdout: true,
            print_output: true,
            run_in_background: false,
        }
    }

    /// Echo each output line to stdout as it arrives.
    pub fn output_is_log(mut self, enabled: bool) -> Self {
        self.output_is_log = enabled;
        self
    }

    /// Capture stderr together with stdout.
    pub fn redirect_stderr_to_stdout(mut self, enabled: bool) -> Self {
        self.redirect_stderr_to_stdout = enabled;
        self
    }

    /// Print the captured output once the command has finished.
    pub fn print_output(mut self, enabled: bool) -> Self {
        self.print_output = enabled;
        self
    }

    /// Start the command and return immediately with empty output.
    pub fn run_in_background(mut self, enabled: bool) -> Self {
        self.run_in_background = enabled;
        self
    }

    /// Run the command.
    ///
    /// Fails like [`CommandProcess::get_return_code`](super::CommandProcess::get_return_code)
    /// when the command ends with an unaccepted code or times out.
    ///
    /// # Panics
    ///
    /// Blocks on the captured output, so it panics when called from within
    /// an async runtime. Run it under `spawn_blocking` there.
    pub fn run(self) -> Result<Vec<u8>> {
        let mut command = self.command;
        if self.redirect_stderr_to_stdout {
            command = command.output_hook(OutputHook::merge_err_to_out());
        }
        if self.output_is_log {
            command = command.output_hook(logger_line_hook("{}", "{}"));
        }

        if self.run_in_background {
            let process = command.output_hook(void_hook()).spawn()?;
            info!(pid = process.pid(), "running in background");
            return Ok(Vec::new());
        }

        let (captured, capture) = std_out_result_void_err();
        let mut process = command.output_hook(capture).spawn()?;
        let output = captured.get_result()?;
        process.get_return_code()?;

        if self.print_output && !self.output_is_log {
            let mut out = io::stdout().lock();
            writeln!(out, "{}", display_bytes(&output))?;
        }
        Ok(output)
    }
}
