//! Paired stdout/stderr streams and the hooks applied to them.

use std::io;
use std::process::Child;
use std::sync::{Arc, Mutex};
use std::thread;

use tracing::debug;

use super::{Hook, TaskGroup};
use crate::stream::{pipe, PipeWriter, ProcessOutput, ReadableStream, WritableStream};
use crate::Result;

/// A process's standard output and standard error.
#[derive(Debug, Default)]
pub struct Output {
    pub std_out: ReadableStream,
    pub std_err: ReadableStream,
}

impl Output {
    /// Pair two streams; a missing side is an empty stream.
    pub fn new(std_out: Option<ReadableStream>, std_err: Option<ReadableStream>) -> Self {
        Self {
            std_out: std_out.unwrap_or_default(),
            std_err: std_err.unwrap_or_default(),
        }
    }

    /// Take the stdout and stderr handles of a spawned child.
    pub fn from_child(child: &mut Child) -> Self {
        let std_out = child
            .stdout
            .take()
            .map(|h| ReadableStream::new(ProcessOutput::new(h, "stdout")));
        let std_err = child
            .stderr
            .take()
            .map(|h| ReadableStream::new(ProcessOutput::new(h, "stderr")));
        Self::new(std_out, std_err)
    }

    /// Split into `(std_out, std_err)`.
    pub fn into_parts(self) -> (ReadableStream, ReadableStream) {
        (self.std_out, self.std_err)
    }

    /// Drain both sides concurrently and return `(std_out, std_err)`.
    ///
    /// Reading one side to the end before touching the other can deadlock
    /// against a child that fills the other pipe first.
    pub fn read_all(self) -> io::Result<(Vec<u8>, Vec<u8>)> {
        let Output {
            mut std_out,
            mut std_err,
        } = self;
        thread::scope(|scope| {
            let err_reader = scope.spawn(move || std_err.read_to_end());
            let out = std_out.read_to_end();
            let err = err_reader
                .join()
                .map_err(|_| io::Error::other("stderr reader panicked"))?;
            Ok((out?, err?))
        })
    }
}

/// Hooks applied to an [`Output`].
#[derive(Debug)]
pub enum OutputHook {
    /// Independent hooks per side. A missing hook passes the side through.
    Split {
        std_out: Option<Hook>,
        std_err: Option<Hook>,
    },
    /// Interleave stderr into stdout line by line. Stderr becomes empty.
    MergeErrToOut,
}

impl OutputHook {
    /// Hooks for either side.
    pub fn new(std_out: Option<Hook>, std_err: Option<Hook>) -> Self {
        OutputHook::Split { std_out, std_err }
    }

    /// Hook stdout only.
    pub fn std_out(hook: Hook) -> Self {
        Self::new(Some(hook), None)
    }

    /// Hook stderr only.
    pub fn std_err(hook: Hook) -> Self {
        Self::new(None, Some(hook))
    }

    /// Merge stderr into stdout.
    ///
    /// Lines are never split, but their relative order across the two
    /// sides is whatever order they arrive in.
    pub fn merge_err_to_out() -> Self {
        OutputHook::MergeErrToOut
    }

    /// Name of the stdout hook, if any.
    pub fn std_out_name(&self) -> Option<&str> {
        match self {
            OutputHook::Split { std_out, .. } => std_out.as_ref().map(Hook::name),
            OutputHook::MergeErrToOut => Some("merge"),
        }
    }

    /// Name of the stderr hook, if any.
    pub fn std_err_name(&self) -> Option<&str> {
        match self {
            OutputHook::Split { std_err, .. } => std_err.as_ref().map(Hook::name),
            OutputHook::MergeErrToOut => None,
        }
    }

    /// Start the hooks on `output` and return the transformed pair.
    pub fn attach(self, output: Output, tasks: &mut TaskGroup) -> Result<Output> {
        let Output { std_out, std_err } = output;
        match self {
            OutputHook::Split {
                std_out: out_hook,
                std_err: err_hook,
            } => {
                let std_out = match out_hook {
                    Some(hook) => hook.start(std_out, tasks)?,
                    None => std_out,
                };
                let std_err = match err_hook {
                    Some(hook) => hook.start(std_err, tasks)?,
                    None => std_err,
                };
                Ok(Output { std_out, std_err })
            }
            OutputHook::MergeErrToOut => {
                let (merged_reader, merged_writer) = pipe()?;
                let shared = Arc::new(Mutex::new(merged_writer));
                for (role, side) in [("out", std_out), ("err", std_err)] {
                    let writer = Arc::clone(&shared);
                    tasks.spawn("merge", role, move || forward_lines(side, writer))?;
                }
                // The merged pipe closes once both forwarders drop their share.
                drop(shared);
                Ok(Output::new(Some(ReadableStream::new(merged_reader)), None))
            }
        }
    }
}

fn forward_lines(mut incoming: ReadableStream, merged: Arc<Mutex<PipeWriter>>) -> io::Result<()> {
    let mut lines = 0usize;
    loop {
        let line = incoming.read_line()?;
        if line.is_empty() {
            debug!(lines, "merge side finished");
            return Ok(());
        }
        let mut writer = merged
            .lock()
            .map_err(|_| io::Error::other("merged output lock poisoned"))?;
        writer.write(&line)?;
        lines += 1;
    }
}
