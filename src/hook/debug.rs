//! Per-command debug logs of every stream boundary.
//!
//! A debugger hook is a passthrough writer that also records each line it
//! forwards into `<base>/<secs><hash>/<location>`:
//!
//! ```text
//! hookstart,command,location
//! 1700000000.123,echo hi,after_command-0-out
//! 1700000000.125,hi
//! hookend
//! 0.002
//! ```

use std::collections::hash_map::DefaultHasher;
use std::fs::{self, File};
use std::hash::{Hash, Hasher};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use tracing::warn;

use super::{Hook, OutputHook};
use crate::stream::WritableStream;

fn unix_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

/// Render argv as a single shell-quoted command line.
pub fn shell_join(argv: &[String]) -> String {
    argv.iter()
        .map(|arg| {
            let plain = !arg.is_empty()
                && arg
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c));
            if plain {
                arg.clone()
            } else {
                format!("'{}'", arg.replace('\'', r"'\''"))
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Directory holding the logs of one command run.
pub fn command_log_dir(base_dir: &Path, argv: &[String]) -> PathBuf {
    let mut hasher = DefaultHasher::new();
    shell_join(argv).hash(&mut hasher);
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    base_dir.join(format!("{secs}{}", hasher.finish()))
}

fn file_name(location: &str) -> String {
    location
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | '\0') { '_' } else { c })
        .collect()
}

fn open_log(path: &Path, command: &str, location: &str) -> io::Result<BufWriter<File>> {
    fs::create_dir_all(path.parent().unwrap_or(Path::new(".")))?;
    let mut log = BufWriter::new(File::create(path)?);
    writeln!(log, "hookstart,command,location")?;
    writeln!(log, "{},{},{}", unix_seconds(), command, location)?;
    Ok(log)
}

fn log_line(log: &mut BufWriter<File>, line: &[u8]) -> io::Result<()> {
    write!(log, "{},", unix_seconds())?;
    log.write_all(line)
}

fn close_log(log: &mut BufWriter<File>, started: Instant) -> io::Result<()> {
    writeln!(log, "hookend")?;
    write!(log, "{}", started.elapsed().as_secs_f64())?;
    log.flush()
}

/// Passthrough hook logging each line to `<dir>/<location>`.
///
/// Log failures only stop the logging; every line is still forwarded.
pub fn debugger_hook(command: &str, dir: &Path, location: &str) -> Hook {
    let command = command.to_string();
    let location = location.to_string();
    let path = dir.join(file_name(&location));
    Hook::writer(format!("debug:{location}"), move |mut incoming, outgoing| {
        let started = Instant::now();
        let mut log = match open_log(&path, &command, &location) {
            Ok(log) => Some(log),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "debug log unavailable");
                None
            }
        };

        loop {
            let line = incoming.read_line()?;
            if line.is_empty() {
                break;
            }
            outgoing.write(&line)?;
            let failed = match log.as_mut() {
                Some(log) => log_line(log, &line).err(),
                None => None,
            };
            if let Some(e) = failed {
                warn!(path = %path.display(), error = %e, "debug log write failed");
                log = None;
            }
        }

        if let Some(mut log) = log {
            if let Err(e) = close_log(&mut log, started) {
                warn!(path = %path.display(), error = %e, "debug log write failed");
            }
        }
        Ok(())
    })
}

/// Interleave debugger hooks around every input and output hook.
///
/// Input side: one debugger before each hook and one after the last, so
/// the stream is logged at every boundary. Output side: a pair right after
/// the command, then a pair after each output hook for the sides it
/// touches. With no output hooks nothing is added on the output side.
pub fn with_debug_hooks(
    input_hooks: Vec<Hook>,
    output_hooks: Vec<OutputHook>,
    argv: &[String],
    base_dir: &Path,
) -> (Vec<Hook>, Vec<OutputHook>) {
    let command = shell_join(argv);
    let dir = command_log_dir(base_dir, argv);

    let mut inputs = Vec::with_capacity(input_hooks.len() * 2 + 1);
    let mut location = "after_initial_input".to_string();
    for (index, hook) in input_hooks.into_iter().enumerate() {
        inputs.push(debugger_hook(&command, &dir, &format!("{location}-{index}-in")));
        location = hook.name().to_string();
        inputs.push(hook);
    }
    inputs.push(debugger_hook(&command, &dir, &location));

    let mut outputs = Vec::new();
    if !output_hooks.is_empty() {
        outputs.push(OutputHook::new(
            Some(debugger_hook(&command, &dir, "after_command-0-out")),
            Some(debugger_hook(&command, &dir, "after_command-0-err")),
        ));
        for (index, hook) in output_hooks.into_iter().enumerate() {
            let out_log = hook
                .std_out_name()
                .map(|name| debugger_hook(&command, &dir, &format!("{name}-{index}-out")));
            let err_log = hook
                .std_err_name()
                .map(|name| debugger_hook(&command, &dir, &format!("{name}-{index}-err")));
            outputs.push(hook);
            outputs.push(OutputHook::new(out_log, err_log));
        }
    }

    (inputs, outputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hook::{passthrough_hook, TaskGroup};
    use crate::stream::ReadableStream;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_shell_join_quotes() {
        assert_eq!(shell_join(&argv(&["echo", "hi"])), "echo hi");
        assert_eq!(shell_join(&argv(&["echo", "two words"])), "echo 'two words'");
        assert_eq!(shell_join(&argv(&["echo", "it's"])), r"echo 'it'\''s'");
        assert_eq!(shell_join(&argv(&["printf", ""])), "printf ''");
    }

    #[test]
    fn test_debugger_writes_log() {
        let base = tempfile::tempdir().unwrap();
        let dir = base.path().join("run");
        let hook = debugger_hook("cat", &dir, "after_command-0-out");

        let mut tasks = TaskGroup::new();
        let mut out = hook
            .start(ReadableStream::from_string("alpha\nbeta\n"), &mut tasks)
            .unwrap();
        assert_eq!(out.read_to_end().unwrap(), b"alpha\nbeta\n");
        assert!(tasks.join().is_empty());

        let log = fs::read_to_string(dir.join("after_command-0-out")).unwrap();
        let lines: Vec<&str> = log.lines().collect();
        assert_eq!(lines[0], "hookstart,command,location");
        assert!(lines[1].ends_with(",cat,after_command-0-out"));
        assert!(lines[2].ends_with(",alpha"));
        assert!(lines[3].ends_with(",beta"));
        assert_eq!(lines[4], "hookend");
        assert!(lines[5].parse::<f64>().is_ok());
    }

    #[test]
    fn test_debugger_forwards_when_log_unwritable() {
        let blocker = tempfile::NamedTempFile::new().unwrap();
        let dir = blocker.path().join("run");
        let hook = debugger_hook("cat", &dir, "after_command-0-out");

        let mut tasks = TaskGroup::new();
        let mut out = hook
            .start(ReadableStream::from_string("alpha\nbeta\n"), &mut tasks)
            .unwrap();
        assert_eq!(out.read_to_end().unwrap(), b"alpha\nbeta\n");
        assert!(tasks.join().is_empty());
        assert!(!dir.exists());
    }

    #[test]
    fn test_interleaving_layout() {
        let base = tempfile::tempdir().unwrap();
        let (inputs, outputs) = with_debug_hooks(
            vec![passthrough_hook(), passthrough_hook()],
            vec![OutputHook::std_out(passthrough_hook())],
            &argv(&["cat"]),
            base.path(),
        );

        let names: Vec<&str> = inputs.iter().map(Hook::name).collect();
        assert_eq!(
            names,
            [
                "debug:after_initial_input-0-in",
                "passthrough",
                "debug:passthrough-1-in",
                "passthrough",
                "debug:passthrough",
            ]
        );

        assert_eq!(outputs.len(), 3);
        assert_eq!(outputs[0].std_out_name(), Some("debug:after_command-0-out"));
        assert_eq!(outputs[0].std_err_name(), Some("debug:after_command-0-err"));
        assert_eq!(outputs[2].std_out_name(), Some("debug:passthrough-0-out"));
        assert_eq!(outputs[2].std_err_name(), None);
    }

    #[test]
    fn test_no_output_hooks_no_output_debuggers() {
        let base = tempfile::tempdir().unwrap();
        let (inputs, outputs) = with_debug_hooks(Vec::new(), Vec::new(), &argv(&["true"]), base.path());
        assert_eq!(inputs.len(), 1);
        assert!(outputs.is_empty());
    }
}
