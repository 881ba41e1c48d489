//! Byte streams connecting pipeline stages.
//!
//! Everything that flows between a child process and its hooks is a
//! [`ReadableStream`] on the consuming side and a [`WritableStream`] on the
//! producing side:
//!
//! - [`pipe()`] creates an OS pipe split into an owned [`PipeReader`] and
//!   [`PipeWriter`]
//! - [`ProcessOutput`] reads a child's stdout or stderr handle
//! - [`StringSource`] and [`EmptySource`] feed canned input
//!
//! End of stream is always an empty read, never an error. A writer signals
//! end of writing by consuming itself with [`WritableStream::end_writing`]
//! or by being dropped; either way the descriptor is closed exactly once.

mod pipe;
mod sources;

pub use pipe::{pipe, PipeReader, PipeWriter};
pub use sources::{EmptySource, ProcessInput, ProcessOutput, StringSource};

use std::borrow::Cow;
use std::fmt;
use std::io::{self, Read};

/// Chunk size used by [`ReadableStream::read_line`].
pub const LINE_CHUNK_SIZE: usize = 10;

/// Chunk size used when copying a stream wholesale.
pub const COPY_CHUNK_SIZE: usize = 4096;

/// A raw producer of bytes behind a [`ReadableStream`].
pub trait ByteSource: Send {
    /// Read at most `max` bytes.
    ///
    /// Returns an empty vector once the source is exhausted, and keeps
    /// doing so on every later call.
    fn read_bytes(&mut self, max: usize) -> io::Result<Vec<u8>>;
}

/// The producing half of a stream.
pub trait WritableStream: Send {
    /// Write all of `bytes` to the stream.
    fn write(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Signal end of writing, closing the stream for its reader.
    fn end_writing(self)
    where
        Self: Sized;
}

/// A readable byte stream with line buffering.
///
/// Bytes read past a newline by [`read_line`](Self::read_line) are kept and
/// handed out first by the next `read` or `read_line`.
pub struct ReadableStream {
    source: Box<dyn ByteSource>,
    pending: Vec<u8>,
}

impl ReadableStream {
    /// Wrap a byte source.
    pub fn new<S: ByteSource + 'static>(source: S) -> Self {
        Self {
            source: Box::new(source),
            pending: Vec::new(),
        }
    }

    /// A stream that is exhausted from the start.
    pub fn empty() -> Self {
        Self::new(EmptySource)
    }

    /// A stream yielding the UTF-8 bytes of `content`.
    pub fn from_string(content: impl Into<String>) -> Self {
        Self::new(StringSource::new(content.into().into_bytes()))
    }

    /// A stream yielding `content`.
    pub fn from_bytes(content: impl Into<Vec<u8>>) -> Self {
        Self::new(StringSource::new(content.into()))
    }

    /// Read at most `max` bytes, returning an empty vector once exhausted.
    ///
    /// A request for zero bytes is treated as a request for one so that an
    /// empty result always means end of stream.
    pub fn read(&mut self, max: usize) -> io::Result<Vec<u8>> {
        let max = max.max(1);
        if !self.pending.is_empty() {
            if self.pending.len() <= max {
                return Ok(std::mem::take(&mut self.pending));
            }
            let rest = self.pending.split_off(max);
            return Ok(std::mem::replace(&mut self.pending, rest));
        }
        self.source.read_bytes(max)
    }

    /// Read up to and including the next `\n`.
    ///
    /// The final line of a stream is returned without a newline if the
    /// stream does not end with one; an empty result means end of stream.
    pub fn read_line(&mut self) -> io::Result<Vec<u8>> {
        let mut line = Vec::new();
        loop {
            let chunk = self.read(LINE_CHUNK_SIZE)?;
            if chunk.is_empty() {
                return Ok(line);
            }
            if let Some(pos) = chunk.iter().position(|&b| b == b'\n') {
                line.extend_from_slice(&chunk[..=pos]);
                let rest = &chunk[pos + 1..];
                if !rest.is_empty() {
                    let mut pending = rest.to_vec();
                    pending.append(&mut self.pending);
                    self.pending = pending;
                }
                return Ok(line);
            }
            line.extend_from_slice(&chunk);
        }
    }

    /// Drain the stream into memory.
    pub fn read_to_end(&mut self) -> io::Result<Vec<u8>> {
        let mut all = Vec::new();
        loop {
            let chunk = self.read(COPY_CHUNK_SIZE)?;
            if chunk.is_empty() {
                return Ok(all);
            }
            all.extend_from_slice(&chunk);
        }
    }

    /// Read and discard everything, returning the number of bytes dropped.
    pub fn drain(&mut self) -> io::Result<u64> {
        let mut total = 0u64;
        loop {
            let chunk = self.read(COPY_CHUNK_SIZE)?;
            if chunk.is_empty() {
                return Ok(total);
            }
            total += chunk.len() as u64;
        }
    }
}

impl Read for ReadableStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let chunk = ReadableStream::read(self, buf.len())?;
        buf[..chunk.len()].copy_from_slice(&chunk);
        Ok(chunk.len())
    }
}

impl fmt::Debug for ReadableStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadableStream")
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

impl Default for ReadableStream {
    fn default() -> Self {
        Self::empty()
    }
}

/// Copy everything from `from` into `to`, returning the number of bytes.
///
/// Does not end writing; the caller still owns `to`.
pub fn copy<W: WritableStream + ?Sized>(from: &mut ReadableStream, to: &mut W) -> io::Result<u64> {
    let mut total = 0u64;
    loop {
        let chunk = from.read(COPY_CHUNK_SIZE)?;
        if chunk.is_empty() {
            return Ok(total);
        }
        to.write(&chunk)?;
        total += chunk.len() as u64;
    }
}

/// Render bytes for display, decoding UTF-8 where possible.
pub fn display_bytes(bytes: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(bytes)
}

/// Read at most `max` bytes from a blocking reader, retrying on `EINTR`.
pub(crate) fn read_chunk<R: Read + ?Sized>(reader: &mut R, max: usize) -> io::Result<Vec<u8>> {
    let mut buf = vec![0u8; max];
    loop {
        match reader.read(&mut buf) {
            Ok(n) => {
                buf.truncate(n);
                return Ok(buf);
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}
