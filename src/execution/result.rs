//! Exit code classification.

use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;
use std::time::Duration;

use crate::error::HookshellError;
use crate::Result;

/// Which exit codes count as success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitPolicy {
    success_code: i32,
    ignored: Vec<i32>,
}

impl ExitPolicy {
    /// Accept `success_code` and every code in `ignored`.
    pub fn new(success_code: i32, ignored: impl IntoIterator<Item = i32>) -> Self {
        Self {
            success_code,
            ignored: ignored.into_iter().collect(),
        }
    }

    /// Check whether `code` counts as success.
    pub fn accepts(&self, code: i32) -> bool {
        code == self.success_code || self.ignored.contains(&code)
    }

    /// Classify a finished process's status.
    pub fn classify(&self, status: ExitStatus) -> Verdict {
        let code = exit_code(status);
        if self.accepts(code) {
            Verdict::Exited(code)
        } else {
            Verdict::Unexpected(code)
        }
    }
}

impl Default for ExitPolicy {
    fn default() -> Self {
        Self::new(0, [])
    }
}

/// How a process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Exited with an accepted code.
    Exited(i32),
    /// Exited with a code outside the accepted set.
    Unexpected(i32),
    /// Was terminated after its deadline.
    TimedOut,
}

impl Verdict {
    /// The exit code; `-1` for a timeout.
    pub fn code(self) -> i32 {
        match self {
            Verdict::Exited(code) | Verdict::Unexpected(code) => code,
            Verdict::TimedOut => -1,
        }
    }

    /// Check whether the process ended with an accepted code.
    pub fn is_success(self) -> bool {
        matches!(self, Verdict::Exited(_))
    }

    /// Turn the verdict into the caller-facing result.
    pub fn into_result(self, argv: &[String], timeout: Option<Duration>) -> Result<i32> {
        match self {
            Verdict::Exited(code) => Ok(code),
            Verdict::Unexpected(code) => Err(HookshellError::ProcessExit {
                code,
                argv: argv.to_vec(),
            }),
            Verdict::TimedOut => Err(HookshellError::Timeout {
                timeout: timeout.unwrap_or_default(),
                argv: argv.to_vec(),
            }),
        }
    }
}

/// The exit code of a finished process; `-N` when killed by signal `N`.
pub fn exit_code(status: ExitStatus) -> i32 {
    match status.code() {
        Some(code) => code,
        None => -status.signal().unwrap_or(0),
    }
}
