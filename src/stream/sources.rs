//! Stream adapters over child process handles and in-memory data.

use std::io::{self, Read, Write};
use std::process::ChildStdin;

use tracing::{debug, trace};

use super::{read_chunk, ByteSource, WritableStream};

/// Reads a child's stdout or stderr handle.
///
/// Once the child closes its end the handle is dropped, and every later
/// read returns empty without touching the OS again.
#[derive(Debug)]
pub struct ProcessOutput<R: Read + Send> {
    handle: Option<R>,
    label: &'static str,
}

impl<R: Read + Send> ProcessOutput<R> {
    /// Wrap a process handle. `label` names the stream in logs.
    pub fn new(handle: R, label: &'static str) -> Self {
        Self {
            handle: Some(handle),
            label,
        }
    }

    /// Check whether the underlying handle has been closed.
    pub fn is_closed(&self) -> bool {
        self.handle.is_none()
    }
}

impl<R: Read + Send> ByteSource for ProcessOutput<R> {
    fn read_bytes(&mut self, max: usize) -> io::Result<Vec<u8>> {
        let Some(handle) = self.handle.as_mut() else {
            return Ok(Vec::new());
        };
        let chunk = read_chunk(handle, max)?;
        if chunk.is_empty() {
            debug!(stream = self.label, "process stream closed");
            self.handle = None;
        } else {
            trace!(stream = self.label, "read {} bytes", chunk.len());
        }
        Ok(chunk)
    }
}

/// Writes to a child's stdin handle.
#[derive(Debug)]
pub struct ProcessInput {
    stdin: ChildStdin,
}

impl ProcessInput {
    /// Wrap a child's stdin.
    pub fn new(stdin: ChildStdin) -> Self {
        Self { stdin }
    }
}

impl WritableStream for ProcessInput {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stdin.write_all(bytes)?;
        self.stdin.flush()
    }

    fn end_writing(self) {
        debug!("closing process stdin");
        drop(self.stdin);
    }
}

/// Fixed content consumed left to right.
#[derive(Debug, Clone)]
pub struct StringSource {
    bytes: Vec<u8>,
    index: usize,
}

impl StringSource {
    /// Create a source over `bytes`.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes, index: 0 }
    }

    /// Number of bytes not yet read.
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.index
    }
}

impl ByteSource for StringSource {
    fn read_bytes(&mut self, max: usize) -> io::Result<Vec<u8>> {
        let end = self.bytes.len().min(self.index + max);
        let slice = self.bytes[self.index..end].to_vec();
        self.index = end;
        Ok(slice)
    }
}

/// A source with nothing in it.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptySource;

impl ByteSource for EmptySource {
    fn read_bytes(&mut self, _max: usize) -> io::Result<Vec<u8>> {
        Ok(Vec::new())
    }
}
