//! OS pipes split into owned halves.

use std::fs::File;
use std::io::{self, Write};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

use tracing::trace;

use super::{read_chunk, ByteSource, WritableStream};

/// Create an OS pipe.
///
/// Both descriptors are close-on-exec so that children spawned while the
/// pipe is open never hold a stray write end that would delay EOF.
pub fn pipe() -> io::Result<(PipeReader, PipeWriter)> {
    let mut fds: [libc::c_int; 2] = [-1, -1];

    #[cfg(any(
        target_os = "linux",
        target_os = "android",
        target_os = "freebsd",
        target_os = "netbsd",
        target_os = "openbsd",
        target_os = "dragonfly"
    ))]
    // SAFETY: `fds` is a valid two-element buffer for pipe2 to fill.
    let rc = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) };

    #[cfg(not(any(
        target_os = "linux",
        target_os = "android",
        target_os = "freebsd",
        target_os = "netbsd",
        target_os = "openbsd",
        target_os = "dragonfly"
    )))]
    // SAFETY: `fds` is a valid two-element buffer for pipe to fill.
    let rc = unsafe { libc::pipe(fds.as_mut_ptr()) };

    if rc == -1 {
        return Err(io::Error::last_os_error());
    }

    // SAFETY: the call succeeded, so both descriptors are open and owned by
    // nothing else in this process.
    let (read_fd, write_fd) = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };

    #[cfg(not(any(
        target_os = "linux",
        target_os = "android",
        target_os = "freebsd",
        target_os = "netbsd",
        target_os = "openbsd",
        target_os = "dragonfly"
    )))]
    {
        set_cloexec(&read_fd)?;
        set_cloexec(&write_fd)?;
    }

    trace!(read = read_fd.as_raw_fd(), write = write_fd.as_raw_fd(), "pipe created");

    Ok((
        PipeReader {
            file: File::from(read_fd),
        },
        PipeWriter {
            file: File::from(write_fd),
        },
    ))
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly"
)))]
fn set_cloexec(fd: &OwnedFd) -> io::Result<()> {
    // SAFETY: `fd` is an open descriptor for the duration of the call.
    let rc = unsafe { libc::fcntl(fd.as_raw_fd(), libc::F_SETFD, libc::FD_CLOEXEC) };
    if rc == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Read end of a pipe. The descriptor closes when this is dropped.
#[derive(Debug)]
pub struct PipeReader {
    file: File,
}

impl ByteSource for PipeReader {
    fn read_bytes(&mut self, max: usize) -> io::Result<Vec<u8>> {
        read_chunk(&mut self.file, max)
    }
}

/// Write end of a pipe.
///
/// There is exactly one `PipeWriter` per pipe. Consuming it with
/// [`end_writing`](WritableStream::end_writing), or dropping it, closes the
/// descriptor and lets the reader see end of stream.
#[derive(Debug)]
pub struct PipeWriter {
    file: File,
}

impl WritableStream for PipeWriter {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.file.write_all(bytes)
    }

    fn end_writing(self) {
        trace!(fd = self.file.as_raw_fd(), "end of writing");
        drop(self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::ReadableStream;

    #[test]
    fn test_pipe_roundtrip() {
        let (reader, mut writer) = pipe().unwrap();
        WritableStream::write(&mut writer, b"through the pipe\n").unwrap();
        writer.end_writing();

        let mut stream = ReadableStream::new(reader);
        assert_eq!(stream.read_line().unwrap(), b"through the pipe\n");
        assert!(stream.read(8).unwrap().is_empty());
        assert!(stream.read(8).unwrap().is_empty());
    }

    #[test]
    fn test_drop_signals_eof() {
        let (reader, writer) = pipe().unwrap();
        drop(writer);

        let mut stream = ReadableStream::new(reader);
        assert!(stream.read(1).unwrap().is_empty());
    }

    #[test]
    fn test_descriptors_are_cloexec() {
        let (reader, writer) = pipe().unwrap();
        for fd in [reader.file.as_raw_fd(), writer.file.as_raw_fd()] {
            // SAFETY: the descriptor is open for the whole test.
            let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
            assert!(flags & libc::FD_CLOEXEC != 0);
        }
    }

    #[test]
    fn test_writer_thread_reader_thread() {
        let (reader, mut writer) = pipe().unwrap();
        // More than a pipe buffer, so the writer must block on the reader.
        let payload = vec![b'x'; 256 * 1024];
        let expected = payload.len();

        let producer = std::thread::spawn(move || {
            WritableStream::write(&mut writer, &payload).unwrap();
            writer.end_writing();
        });

        let mut stream = ReadableStream::new(reader);
        let received = stream.read_to_end().unwrap();
        producer.join().unwrap();
        assert_eq!(received.len(), expected);
    }

    #[test]
    fn test_write_to_closed_reader_is_broken_pipe() {
        let (reader, mut writer) = pipe().unwrap();
        drop(reader);
        let err = WritableStream::write(&mut writer, b"nobody listens").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
