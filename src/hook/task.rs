//! Background threads backing started hooks.

use std::fmt;
use std::io;
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use crate::error::HookshellError;
use crate::Result;

/// A pipeline thread that ended without success.
#[derive(Debug)]
pub struct HookFailure {
    /// Name of the hook (or stage) that owned the thread.
    pub hook: String,
    /// Which of the hook's threads failed (`body`, `tee`, `observer`, ...).
    pub role: &'static str,
    /// What went wrong.
    pub reason: FailureReason,
}

/// Why a pipeline thread failed.
#[derive(Debug)]
pub enum FailureReason {
    /// The body returned an error.
    Error(io::Error),
    /// The body panicked.
    Panicked(String),
}

impl fmt::Display for HookFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            FailureReason::Error(e) => write!(f, "{} ({}): {}", self.hook, self.role, e),
            FailureReason::Panicked(msg) => {
                write!(f, "{} ({}) panicked: {}", self.hook, self.role, msg)
            }
        }
    }
}

impl From<HookFailure> for HookshellError {
    fn from(failure: HookFailure) -> Self {
        let reason = match &failure.reason {
            FailureReason::Error(e) => e.to_string(),
            FailureReason::Panicked(msg) => format!("panicked: {msg}"),
        };
        HookshellError::HookFailed {
            hook: failure.hook,
            reason,
        }
    }
}

struct Task {
    hook: String,
    role: &'static str,
    handle: JoinHandle<io::Result<()>>,
}

/// The threads started on behalf of one pipeline.
///
/// Threads run detached until [`join`](Self::join) is called. Joining only
/// returns once every thread has finished, which requires the final streams
/// of the pipeline to have been drained or dropped.
#[derive(Default)]
pub struct TaskGroup {
    tasks: Vec<Task>,
}

impl TaskGroup {
    /// Create an empty group.
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a named OS thread running `body`.
    ///
    /// Failures are logged here, at the thread boundary; they never reach
    /// the process verdict.
    pub fn spawn<F>(&mut self, hook: &str, role: &'static str, body: F) -> Result<()>
    where
        F: FnOnce() -> io::Result<()> + Send + 'static,
    {
        let hook_name = hook.to_string();
        let handle = thread::Builder::new()
            .name(format!("{hook}:{role}"))
            .spawn(move || {
                debug!(hook = %hook_name, role, "hook task started");
                let outcome = body();
                match &outcome {
                    Ok(()) => debug!(hook = %hook_name, role, "hook task finished"),
                    Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                        debug!(hook = %hook_name, role, "downstream closed early");
                    }
                    Err(e) => warn!(hook = %hook_name, role, error = %e, "hook task failed"),
                }
                outcome
            })?;

        self.tasks.push(Task {
            hook: hook.to_string(),
            role,
            handle,
        });
        Ok(())
    }

    /// Number of threads in the group.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Check if no thread was started.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Check whether every thread has finished.
    pub fn is_finished(&self) -> bool {
        self.tasks.iter().all(|t| t.handle.is_finished())
    }

    /// Move all threads of `other` into this group.
    pub fn absorb(&mut self, other: TaskGroup) {
        self.tasks.extend(other.tasks);
    }

    /// Wait for every thread and collect the ones that failed.
    pub fn join(self) -> Vec<HookFailure> {
        let mut failures = Vec::new();
        for task in self.tasks {
            let reason = match task.handle.join() {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => FailureReason::Error(e),
                Err(payload) => FailureReason::Panicked(panic_message(payload.as_ref())),
            };
            failures.push(HookFailure {
                hook: task.hook,
                role: task.role,
                reason,
            });
        }
        failures
    }
}

impl fmt::Debug for TaskGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.tasks.iter().map(|t| format!("{}:{}", t.hook, t.role)))
            .finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
