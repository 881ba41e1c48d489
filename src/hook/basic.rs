//! Ready-made hooks.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;

use tracing::info;

use super::{Hook, HookResult, OutputHook};
use crate::stream::{copy, display_bytes, ReadableStream, COPY_CHUNK_SIZE};

/// Where [`forward_hook`] sends what it observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Console {
    Stdout,
    Stderr,
}

impl Console {
    fn write_all(self, bytes: &[u8]) -> io::Result<()> {
        match self {
            Console::Stdout => {
                let mut out = io::stdout().lock();
                out.write_all(bytes)?;
                out.flush()
            }
            Console::Stderr => {
                let mut err = io::stderr().lock();
                err.write_all(bytes)?;
                err.flush()
            }
        }
    }
}

/// Writer hook that copies its input unchanged.
pub fn passthrough_hook() -> Hook {
    Hook::writer("passthrough", |mut incoming, outgoing| {
        copy(&mut incoming, outgoing).map(|_| ())
    })
}

/// Writer hook that consumes its input and writes nothing.
pub fn voiding_hook() -> Hook {
    Hook::writer("void", |mut incoming, _outgoing| incoming.drain().map(|_| ()))
}

/// Discard both stdout and stderr.
pub fn void_hook() -> OutputHook {
    OutputHook::new(Some(voiding_hook()), Some(voiding_hook()))
}

/// Result hook that collects its whole input and writes nothing.
pub fn capture_hook() -> (Hook, HookResult<Vec<u8>>) {
    Hook::result("capture", |mut incoming, _outgoing| incoming.read_to_end())
}

/// Capture stdout and discard stderr.
pub fn std_out_result_void_err() -> (HookResult<Vec<u8>>, OutputHook) {
    let (hook, result) = capture_hook();
    (result, OutputHook::new(Some(hook), Some(voiding_hook())))
}

/// Reader hook printing each line to stdout.
///
/// `{}` in `format` is replaced by the line, trailing newline included.
pub fn line_logger_hook(format: &str) -> Hook {
    let format = format.to_string();
    Hook::reader("line-logger", move |mut observed| loop {
        let line = observed.read_line()?;
        if line.is_empty() {
            return Ok(());
        }
        let rendered = format.replace("{}", &display_bytes(&line));
        Console::Stdout.write_all(rendered.as_bytes())?;
    })
}

/// Print both sides line by line with their own formats.
pub fn logger_line_hook(std_out_format: &str, std_err_format: &str) -> OutputHook {
    OutputHook::new(
        Some(line_logger_hook(std_out_format)),
        Some(line_logger_hook(std_err_format)),
    )
}

/// Reader hook emitting each line as a tracing event.
pub fn tracing_line_hook(label: &'static str) -> Hook {
    Hook::reader(format!("trace-{label}"), move |mut observed| loop {
        let line = observed.read_line()?;
        if line.is_empty() {
            return Ok(());
        }
        let text = display_bytes(&line);
        info!(target: "hookshell::output", stream = label, "{}", text.trim_end_matches(['\r', '\n']));
    })
}

/// Reader hook copying the raw stream to the console as it arrives.
pub fn forward_hook(console: Console) -> Hook {
    let name = match console {
        Console::Stdout => "forward-stdout",
        Console::Stderr => "forward-stderr",
    };
    Hook::reader(name, move |mut observed| loop {
        let chunk = observed.read(COPY_CHUNK_SIZE)?;
        if chunk.is_empty() {
            return Ok(());
        }
        console.write_all(&chunk)?;
    })
}

/// Reader hook writing the stream to a file.
///
/// The file is created if missing, and truncated unless `append` is set.
pub fn write_to_file_hook(path: impl Into<PathBuf>, append: bool) -> Hook {
    let path = path.into();
    let name = format!("file:{}", path.display());
    Hook::reader(name, move |mut observed| {
        let mut options = OpenOptions::new();
        options.create(true);
        if append {
            options.append(true);
        } else {
            options.write(true).truncate(true);
        }
        let mut file = options.open(&path)?;
        loop {
            let chunk = observed.read(COPY_CHUNK_SIZE)?;
            if chunk.is_empty() {
                return file.flush();
            }
            file.write_all(&chunk)?;
        }
    })
}

/// Writer hook emitting all of `prefix` before its own input.
pub fn stream_prepend_hook(prefix: ReadableStream) -> Hook {
    let mut prefix = prefix;
    Hook::writer("prepend", move |mut incoming, outgoing| {
        copy(&mut prefix, &mut *outgoing)?;
        copy(&mut incoming, outgoing).map(|_| ())
    })
}
