//! Hooks: user functions spliced between a child process and its consumer.
//!
//! A [`Hook`] consumes one [`ReadableStream`] and, once started, yields the
//! stream that the next stage reads. Every hook runs on its own OS thread;
//! starting one never blocks.
//!
//! | kind | body receives | next stage reads |
//! |------|---------------|------------------|
//! | writer | incoming stream and an outgoing pipe | whatever the body writes |
//! | reader | a duplicate of the incoming stream | the incoming bytes, unchanged |
//! | result | incoming stream and an outgoing pipe | whatever the body writes |
//!
//! A result hook also hands its return value to a [`HookResult`].

mod basic;
mod debug;
mod output;
mod task;

pub use basic::{
    capture_hook, forward_hook, line_logger_hook, logger_line_hook, passthrough_hook,
    std_out_result_void_err, stream_prepend_hook, tracing_line_hook, void_hook, voiding_hook,
    write_to_file_hook, Console,
};
pub use debug::{command_log_dir, debugger_hook, shell_join, with_debug_hooks};
pub use output::{Output, OutputHook};
pub use task::{FailureReason, HookFailure, TaskGroup};

use std::fmt;
use std::io;

use tokio::sync::oneshot;
use tracing::debug;

use crate::error::HookshellError;
use crate::stream::{pipe, PipeWriter, ReadableStream, WritableStream, COPY_CHUNK_SIZE};
use crate::Result;

type WriterFn = Box<dyn FnOnce(ReadableStream, &mut PipeWriter) -> io::Result<()> + Send>;
type ReaderFn = Box<dyn FnOnce(ReadableStream) -> io::Result<()> + Send>;

enum HookBody {
    Writer(WriterFn),
    Reader(ReaderFn),
    Result(WriterFn),
}

/// The three hook variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    /// Transforms the stream.
    Writer,
    /// Observes the stream without changing it.
    Reader,
    /// Transforms the stream and produces a value.
    Result,
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookKind::Writer => write!(f, "writer"),
            HookKind::Reader => write!(f, "reader"),
            HookKind::Result => write!(f, "result"),
        }
    }
}

/// A named stream transformer or observer.
pub struct Hook {
    name: String,
    body: HookBody,
}

impl Hook {
    /// A hook whose body writes the stream the next stage reads.
    ///
    /// The outgoing pipe is closed when the body returns, panics or errors.
    pub fn writer<F>(name: impl Into<String>, body: F) -> Self
    where
        F: FnOnce(ReadableStream, &mut PipeWriter) -> io::Result<()> + Send + 'static,
    {
        Self {
            name: name.into(),
            body: HookBody::Writer(Box::new(body)),
        }
    }

    /// A hook whose body observes a copy of the stream.
    ///
    /// The next stage receives exactly the incoming bytes, whether or not
    /// the body reads its copy to the end.
    pub fn reader<F>(name: impl Into<String>, body: F) -> Self
    where
        F: FnOnce(ReadableStream) -> io::Result<()> + Send + 'static,
    {
        Self {
            name: name.into(),
            body: HookBody::Reader(Box::new(body)),
        }
    }

    /// A writer hook that also produces a value, delivered through the
    /// returned [`HookResult`] when the body finishes.
    pub fn result<T, F>(name: impl Into<String>, body: F) -> (Self, HookResult<T>)
    where
        T: Send + 'static,
        F: FnOnce(ReadableStream, &mut PipeWriter) -> io::Result<T> + Send + 'static,
    {
        let name = name.into();
        let (tx, rx) = oneshot::channel();
        let wrapped: WriterFn = Box::new(move |incoming: ReadableStream, outgoing: &mut PipeWriter| {
            let value = body(incoming, outgoing)?;
            if tx.send(value).is_err() {
                debug!("hook result dropped before delivery");
            }
            Ok(())
        });

        let hook = Self {
            name: name.clone(),
            body: HookBody::Result(wrapped),
        };
        (hook, HookResult { hook: name, rx })
    }

    /// The hook's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The hook's variant.
    pub fn kind(&self) -> HookKind {
        match self.body {
            HookBody::Writer(_) => HookKind::Writer,
            HookBody::Reader(_) => HookKind::Reader,
            HookBody::Result(_) => HookKind::Result,
        }
    }

    /// Start the hook on `incoming` and return the stream the next stage
    /// reads. The hook's threads are added to `tasks`.
    pub fn start(self, incoming: ReadableStream, tasks: &mut TaskGroup) -> Result<ReadableStream> {
        debug!(hook = %self.name, kind = %self.kind(), "starting hook");
        match self.body {
            HookBody::Writer(body) | HookBody::Result(body) => {
                let (reader, mut writer) = pipe()?;
                tasks.spawn(&self.name, "body", move || {
                    let outcome = body(incoming, &mut writer);
                    writer.end_writing();
                    outcome
                })?;
                Ok(ReadableStream::new(reader))
            }
            HookBody::Reader(body) => {
                let (primary_reader, primary_writer) = pipe()?;
                let (copy_reader, copy_writer) = pipe()?;
                tasks.spawn(&self.name, "tee", move || {
                    tee(incoming, primary_writer, copy_writer)
                })?;
                tasks.spawn(&self.name, "observer", move || {
                    body(ReadableStream::new(copy_reader))
                })?;
                Ok(ReadableStream::new(primary_reader))
            }
        }
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .finish()
    }
}

/// Duplicate `incoming` into two pipes.
///
/// An output whose reader has gone away is dropped and the other keeps
/// receiving. Stops early only once both are gone.
fn tee(mut incoming: ReadableStream, primary: PipeWriter, copy: PipeWriter) -> io::Result<()> {
    let mut primary = Some(primary);
    let mut copy = Some(copy);

    loop {
        let chunk = incoming.read(COPY_CHUNK_SIZE)?;
        if chunk.is_empty() {
            break;
        }
        if let Some(writer) = primary.as_mut() {
            if let Err(e) = writer.write(&chunk) {
                debug!(error = %e, "primary reader gone");
                primary = None;
            }
        }
        if let Some(writer) = copy.as_mut() {
            if let Err(e) = writer.write(&chunk) {
                debug!(error = %e, "observer stopped reading");
                copy = None;
            }
        }
        if primary.is_none() && copy.is_none() {
            break;
        }
    }

    if let Some(writer) = primary {
        writer.end_writing();
    }
    if let Some(writer) = copy {
        writer.end_writing();
    }
    Ok(())
}

/// The value produced by a result hook.
pub struct HookResult<T> {
    hook: String,
    rx: oneshot::Receiver<T>,
}

impl<T> HookResult<T> {
    /// Name of the hook that produces the value.
    pub fn hook_name(&self) -> &str {
        &self.hook
    }

    /// Block until the hook's body has finished and return its value.
    ///
    /// Fails with [`HookshellError::ResultUnavailable`] if the body errored,
    /// panicked, or the hook was never started.
    ///
    /// # Panics
    ///
    /// Panics when called from within an async runtime; use
    /// [`recv`](Self::recv) there.
    pub fn get_result(self) -> Result<T> {
        let hook = self.hook;
        self.rx
            .blocking_recv()
            .map_err(|_| HookshellError::ResultUnavailable { hook })
    }

    /// Await the hook's value.
    pub async fn recv(self) -> Result<T> {
        let hook = self.hook;
        self.rx
            .await
            .map_err(|_| HookshellError::ResultUnavailable { hook })
    }
}

impl<T> fmt::Debug for HookResult<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookResult").field("hook", &self.hook).finish()
    }
}
