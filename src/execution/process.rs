//! A running child process and its verdict.

use std::io;
use std::process::{Child, ExitStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use super::result::{ExitPolicy, Verdict};
use crate::error::HookshellError;
use crate::hook::{HookFailure, Output, TaskGroup};
use crate::Result;

/// How often the waiter checks on the child.
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Time a timed-out child gets between SIGTERM and SIGKILL.
pub const TERMINATE_GRACE: Duration = Duration::from_secs(1);

/// How long [`CommandProcess::signal`] waits for the child to react.
const SIGNAL_SETTLE: Duration = Duration::from_millis(500);

struct Shared {
    child: Mutex<Child>,
    exited: AtomicBool,
}

impl Shared {
    // Reaping only happens under this lock, so a pid read while holding it
    // and `exited` is false still names our child.
    fn child(&self) -> MutexGuard<'_, Child> {
        self.child.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// A spawned command with its hooked output.
///
/// A background waiter owns the child and reaps it, so dropping a
/// `CommandProcess` never leaves a zombie behind.
pub struct CommandProcess {
    pid: u32,
    argv: Vec<String>,
    timeout: Option<Duration>,
    output: Output,
    shared: Arc<Shared>,
    waiter: Option<JoinHandle<Verdict>>,
    verdict: Option<Verdict>,
    tasks: TaskGroup,
}

impl CommandProcess {
    pub(crate) fn start(
        child: Child,
        argv: Vec<String>,
        output: Output,
        timeout: Option<Duration>,
        policy: ExitPolicy,
        tasks: TaskGroup,
    ) -> Result<Self> {
        let pid = child.id();
        let shared = Arc::new(Shared {
            child: Mutex::new(child),
            exited: AtomicBool::new(false),
        });

        let waiter_shared = Arc::clone(&shared);
        let spawned = thread::Builder::new()
            .name(format!("wait:{pid}"))
            .spawn(move || wait_for_exit(&waiter_shared, timeout, &policy));

        let waiter = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                let mut child = shared.child();
                let _ = child.kill();
                let _ = child.wait();
                shared.exited.store(true, Ordering::Release);
                return Err(HookshellError::Io(e));
            }
        };

        Ok(Self {
            pid,
            argv,
            timeout,
            output,
            shared,
            waiter: Some(waiter),
            verdict: None,
            tasks,
        })
    }

    /// OS process id.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Program and arguments the process was started with.
    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// The hooked output streams.
    pub fn output_mut(&mut self) -> &mut Output {
        &mut self.output
    }

    /// Take the hooked output, leaving empty streams behind.
    pub fn take_output(&mut self) -> Output {
        std::mem::take(&mut self.output)
    }

    /// Check whether the child is still running.
    pub fn is_running(&self) -> bool {
        !self.shared.exited.load(Ordering::Acquire)
    }

    /// Block until the child finishes and return its exit code.
    ///
    /// Succeeds for accepted codes. Fails with
    /// [`HookshellError::ProcessExit`] for any other code and with
    /// [`HookshellError::Timeout`] if the deadline passed. The outcome is
    /// cached; every later call reports the same thing.
    pub fn get_return_code(&mut self) -> Result<i32> {
        if let Some(verdict) = self.verdict {
            return verdict.into_result(&self.argv, self.timeout);
        }
        let waiter = self
            .waiter
            .take()
            .ok_or_else(|| HookshellError::Io(io::Error::other("process waiter is gone")))?;
        let verdict = waiter
            .join()
            .map_err(|_| HookshellError::Io(io::Error::other("process waiter panicked")))?;
        self.verdict = Some(verdict);
        verdict.into_result(&self.argv, self.timeout)
    }

    /// Send `signal` to the child and give it a moment to react.
    ///
    /// Does nothing if the child has already exited.
    pub fn signal(&self, signal: i32) -> Result<()> {
        {
            let child = self.shared.child();
            if !self.is_running() {
                debug!(pid = self.pid, signal, "not signalling, process already exited");
                return Ok(());
            }
            send_signal(&child, signal)?;
        }
        info!(pid = self.pid, signal, "signal sent");

        let deadline = Instant::now() + SIGNAL_SETTLE;
        while self.is_running() && Instant::now() < deadline {
            thread::sleep(POLL_INTERVAL);
        }
        Ok(())
    }

    /// Wait for every hook thread and report the ones that failed.
    ///
    /// Hook threads only finish once the final output streams have been
    /// drained or dropped; call this after consuming the output.
    pub fn join_hooks(&mut self) -> Vec<HookFailure> {
        std::mem::take(&mut self.tasks).join()
    }

    /// Await the exit code without blocking the async runtime.
    pub async fn wait(mut self) -> Result<i32> {
        tokio::task::spawn_blocking(move || self.get_return_code())
            .await
            .map_err(|e| HookshellError::Io(io::Error::other(e.to_string())))?
    }
}

impl std::fmt::Debug for CommandProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandProcess")
            .field("pid", &self.pid)
            .field("argv", &self.argv)
            .field("running", &self.is_running())
            .field("verdict", &self.verdict)
            .field("hooks", &self.tasks)
            .finish()
    }
}

fn send_signal(child: &Child, signal: i32) -> io::Result<()> {
    // SAFETY: plain syscall; the pid belongs to our unreaped child.
    let rc = unsafe { libc::kill(child.id() as libc::pid_t, signal) };
    if rc == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn wait_for_exit(shared: &Shared, timeout: Option<Duration>, policy: &ExitPolicy) -> Verdict {
    // A deadline past what `Instant` can hold means no deadline.
    let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
    let verdict = loop {
        match poll(shared) {
            Ok(Some(status)) => break policy.classify(status),
            Ok(None) => {}
            Err(e) => {
                error!(error = %e, "failed to wait on process");
                terminate(shared);
                break Verdict::Unexpected(-1);
            }
        }

        if deadline.is_some_and(|d| Instant::now() >= d) {
            warn!(timeout = ?timeout, "process timed out, terminating");
            terminate(shared);
            break Verdict::TimedOut;
        }

        thread::sleep(POLL_INTERVAL);
    };
    shared.exited.store(true, Ordering::Release);
    debug!(?verdict, "process finished");
    verdict
}

fn poll(shared: &Shared) -> io::Result<Option<ExitStatus>> {
    let mut child = shared.child();
    let status = child.try_wait()?;
    if status.is_some() {
        shared.exited.store(true, Ordering::Release);
    }
    Ok(status)
}

fn terminate(shared: &Shared) {
    let mut child = shared.child();
    if let Err(e) = send_signal(&child, libc::SIGTERM) {
        debug!(error = %e, "SIGTERM failed");
    }

    let deadline = Instant::now() + TERMINATE_GRACE;
    while Instant::now() < deadline {
        match child.try_wait() {
            Ok(Some(_)) => return,
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(_) => break,
        }
    }

    warn!(pid = child.id(), "process ignored SIGTERM, killing");
    if let Err(e) = child.kill() {
        debug!(error = %e, "kill failed");
    }
    if let Err(e) = child.wait() {
        error!(error = %e, "failed to reap killed process");
    }
}
