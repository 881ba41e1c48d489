//! Spawning a command and wiring its pipeline.

use std::fs;
use std::io;
use std::path::Path;
use std::process::{Child, ChildStdin, Stdio};

use tracing::{debug, info, warn};

use super::command::Command;
use super::process::CommandProcess;
use super::result::ExitPolicy;
use crate::error::HookshellError;
use crate::hook::{with_debug_hooks, Hook, Output, OutputHook, TaskGroup};
use crate::stream::{copy, ProcessInput, ReadableStream, WritableStream};
use crate::Result;

/// Spawn `command` and start its hooks.
///
/// Returns as soon as the child is running and every hook has been
/// started; nothing here waits for the child. The pipeline is:
///
/// ```text
/// std_input -> input hooks -> child stdin
/// child stdout/stderr -> output hooks -> CommandProcess output
/// ```
///
/// Without `std_input` and input hooks the child's stdin is closed at once.
pub fn execute_command(command: Command) -> Result<CommandProcess> {
    let Command {
        argv,
        current_dir,
        env,
        inherit_env,
        timeout,
        success_code,
        ignore_codes,
        std_input,
        input_hooks,
        output_hooks,
        debug_log_dir,
    } = command;

    let (program, args) = argv.split_first().ok_or(HookshellError::EmptyCommand)?;
    if let Some(dir) = &current_dir {
        validate_dir(dir)?;
    }

    let (input_hooks, output_hooks) = match &debug_log_dir {
        Some(base) => with_debug_hooks(input_hooks, output_hooks, &argv, base),
        None => (input_hooks, output_hooks),
    };

    let mut os_command = std::process::Command::new(program);
    os_command
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if !inherit_env {
        os_command.env_clear();
    }
    os_command.envs(&env);
    if let Some(dir) = &current_dir {
        os_command.current_dir(dir);
    }

    let mut child = os_command.spawn().map_err(|source| HookshellError::Spawn {
        program: program.clone(),
        source,
    })?;
    info!(pid = child.id(), command = %argv.join(" "), "process spawned");

    let mut tasks = TaskGroup::new();
    let output = match wire(&mut child, std_input, input_hooks, output_hooks, &mut tasks) {
        Ok(output) => output,
        Err(e) => {
            warn!(error = %e, "failed to wire pipeline, killing process");
            let _ = child.kill();
            let _ = child.wait();
            return Err(e);
        }
    };
    debug!(threads = tasks.len(), "pipeline started");

    let policy = ExitPolicy::new(success_code, ignore_codes);
    CommandProcess::start(child, argv, output, timeout, policy, tasks)
}

fn validate_dir(dir: &Path) -> Result<()> {
    let invalid = |reason: String| HookshellError::InvalidWorkingDir {
        path: dir.to_path_buf(),
        reason,
    };
    match fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(invalid("not a directory".to_string())),
        Err(e) => Err(invalid(e.to_string())),
    }
}

fn wire(
    child: &mut Child,
    std_input: Option<ReadableStream>,
    input_hooks: Vec<Hook>,
    output_hooks: Vec<OutputHook>,
    tasks: &mut TaskGroup,
) -> Result<Output> {
    let stdin = child.stdin.take();
    if std_input.is_none() && input_hooks.is_empty() {
        drop(stdin);
    } else {
        let mut input = std_input.unwrap_or_default();
        for hook in input_hooks {
            input = hook.start(input, tasks)?;
        }
        if let Some(stdin) = stdin {
            tasks.spawn("stdin", "relay", move || relay(input, stdin))?;
        }
    }

    let mut output = Output::from_child(child);
    for hook in output_hooks {
        output = hook.attach(output, tasks)?;
    }
    Ok(output)
}

fn relay(mut input: ReadableStream, stdin: ChildStdin) -> io::Result<()> {
    let mut stdin = ProcessInput::new(stdin);
    match copy(&mut input, &mut stdin) {
        Ok(bytes) => {
            debug!(bytes, "stdin relay finished");
            stdin.end_writing();
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
            debug!("process closed stdin early");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_command_rejected() {
        let err = execute_command(Command::new(Vec::<String>::new())).unwrap_err();
        assert!(matches!(err, HookshellError::EmptyCommand));
    }

    #[test]
    fn test_missing_dir_rejected() {
        let err = execute_command(Command::new(["/bin/true"]).current_dir("/no/such/dir/here"))
            .unwrap_err();
        assert!(matches!(err, HookshellError::InvalidWorkingDir { .. }));
    }

    #[test]
    fn test_file_as_dir_rejected() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = validate_dir(file.path()).unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }

    #[test]
    fn test_missing_program() {
        let err = execute_command(Command::new(["/definitely/not/a/program"])).unwrap_err();
        assert!(matches!(err, HookshellError::Spawn { .. }));
    }

    #[test]
    fn test_stdin_closed_without_input() {
        let mut process = execute_command(Command::new(["/bin/cat"])).unwrap();
        let (out, err) = process.take_output().read_all().unwrap();
        assert!(out.is_empty());
        assert!(err.is_empty());
        assert_eq!(process.get_return_code().unwrap(), 0);
    }

    #[test]
    fn test_std_input_reaches_child() {
        let mut process = Command::new(["/bin/cat"])
            .std_input(ReadableStream::from_string("fed through stdin\n"))
            .spawn()
            .unwrap();
        let (out, _) = process.take_output().read_all().unwrap();
        assert_eq!(out, b"fed through stdin\n");
        assert_eq!(process.get_return_code().unwrap(), 0);
        assert!(process.join_hooks().is_empty());
    }
}
