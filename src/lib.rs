//! # hookshell
//!
//! Child process execution with hookable streams.
//!
//! A command's stdin, stdout and stderr are plain OS pipes. Between the
//! caller and the child sit chains of hooks, each running on its own
//! thread, that can transform the bytes, observe them, or compute a value
//! from them. The child is watched by a background waiter that enforces an
//! optional timeout and classifies the exit code.
//!
//! ## Features
//!
//! - **Streams**: line-buffered readers over pipes, process handles and
//!   in-memory data
//! - **Hooks**: writer, reader and result hooks, chained in order
//! - **Output hooks**: per-side hooks for stdout/stderr, or a line-merge of
//!   stderr into stdout
//! - **Verdicts**: accepted exit codes, timeouts with SIGTERM then SIGKILL,
//!   signal forwarding
//! - **Debug logs**: optional per-boundary line logs for every command
//!
//! ## Quick Start
//!
//! ```no_run
//! use hookshell::{std_out_result_void_err, Command, ReadableStream};
//!
//! fn main() -> hookshell::Result<()> {
//!     hookshell::logging::try_init().ok();
//!
//!     let (stdout, hook) = std_out_result_void_err();
//!     let mut process = Command::new(["/bin/cat"])
//!         .std_input(ReadableStream::from_string("hello\n"))
//!         .output_hook(hook)
//!         .spawn()?;
//!
//!     assert_eq!(stdout.get_result()?, b"hello\n");
//!     assert_eq!(process.get_return_code()?, 0);
//!     Ok(())
//! }
//! ```

#[cfg(not(unix))]
compile_error!("hookshell only supports unix platforms");

pub mod cli;
pub mod config;
pub mod error;
pub mod execution;
pub mod hook;
pub mod logging;
pub mod stream;

// Re-export commonly used types
pub use error::{HookshellError, Result};
pub use execution::{execute_command, Command, CommandProcess, ShellOut, Verdict};
pub use hook::{
    capture_hook, passthrough_hook, std_out_result_void_err, void_hook, Hook, HookKind,
    HookResult, Output, OutputHook,
};
pub use stream::{pipe, ReadableStream, WritableStream};
