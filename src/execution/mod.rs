//! Command execution engine.
//!
//! This module runs child processes with their streams routed through
//! hooks:
//! - [`Command`] describes the program, its environment and pipeline
//! - [`execute_command`] spawns it and starts every hook
//! - [`CommandProcess`] tracks the child and reports its verdict
//! - [`ShellOut`] runs a command to completion and captures its output
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use hookshell::execution::{Command, ShellOut};
//!
//! let out = ShellOut::new(Command::new(["/bin/echo", "hello"]))
//!     .run()
//!     .unwrap();
//! assert_eq!(out, b"hello\n");
//!
//! let mut process = Command::new(["/bin/sleep", "10"])
//!     .timeout(Duration::from_secs(1))
//!     .spawn()
//!     .unwrap();
//! assert!(process.get_return_code().unwrap_err().is_timeout());
//! ```

mod command;
mod executor;
mod process;
mod result;
mod shell_out;

pub use command::Command;
pub use executor::execute_command;
pub use process::{CommandProcess, POLL_INTERVAL, TERMINATE_GRACE};
pub use result::{exit_code, ExitPolicy, Verdict};
pub use shell_out::ShellOut;
