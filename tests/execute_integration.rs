//! Execution integration tests.
//!
//! These run real child processes through the full pipeline: spawning,
//! input and output hooks, verdicts, timeouts and signals.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use hookshell::hook::{line_logger_hook, passthrough_hook, Hook};
use hookshell::{
    capture_hook, std_out_result_void_err, void_hook, Command, CommandProcess, HookshellError,
    OutputHook, ReadableStream,
};

fn sh(script: &str) -> Command {
    Command::new(["/bin/sh", "-c", script]).env("PATH", "/usr/bin:/bin")
}

/// Run `command` capturing stdout; stderr is discarded.
fn capture(command: Command) -> (Vec<u8>, CommandProcess) {
    let (stdout, hook) = std_out_result_void_err();
    let process = command.output_hook(hook).spawn().unwrap();
    (stdout.get_result().unwrap(), process)
}

// ============================================================================
// Output
// ============================================================================

#[test]
fn test_echo_roundtrip() {
    for text in ["hello", "two words", "ünïcödé", ""] {
        let (out, mut process) = capture(Command::new(["/bin/echo", text]));
        assert_eq!(out, format!("{text}\n").into_bytes());
        assert_eq!(process.get_return_code().unwrap(), 0);
    }
}

#[test]
fn test_output_without_hooks() {
    let mut process = sh("echo plain; echo oops >&2").spawn().unwrap();
    let (out, err) = process.take_output().read_all().unwrap();
    assert_eq!(out, b"plain\n");
    assert_eq!(err, b"oops\n");
    assert_eq!(process.get_return_code().unwrap(), 0);
}

#[test]
fn test_large_output_both_streams_no_deadlock() {
    // Far more than a pipe buffer on each side.
    let script = "i=0; while [ $i -lt 20000 ]; do echo out-$i; echo err-$i >&2; i=$((i+1)); done";
    let mut process = sh(script)
        .timeout(Duration::from_secs(60))
        .spawn()
        .unwrap();
    let (out, err) = process.take_output().read_all().unwrap();
    assert_eq!(String::from_utf8(out).unwrap().lines().count(), 20000);
    assert_eq!(String::from_utf8(err).unwrap().lines().count(), 20000);
    assert_eq!(process.get_return_code().unwrap(), 0);
}

#[test]
fn test_void_hook_lets_process_finish() {
    let mut process = sh("head -c 1000000 /dev/zero; head -c 1000000 /dev/zero >&2")
        .output_hook(void_hook())
        .timeout(Duration::from_secs(30))
        .spawn()
        .unwrap();
    assert_eq!(process.get_return_code().unwrap(), 0);
}

#[test]
fn test_merge_err_to_out() {
    let (out, mut process) = capture(
        sh("echo one; echo two >&2; echo three").output_hook(OutputHook::merge_err_to_out()),
    );
    let mut lines: Vec<_> = String::from_utf8(out)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect();
    lines.sort();
    assert_eq!(lines, ["one", "three", "two"]);
    assert_eq!(process.get_return_code().unwrap(), 0);
}

#[test]
fn test_stderr_capture_through_split_hook() {
    let (hook, stderr) = capture_hook();
    let mut process = sh("echo visible; echo hidden >&2")
        .output_hook(OutputHook::std_err(hook))
        .spawn()
        .unwrap();
    let (out, err) = process.take_output().read_all().unwrap();
    assert_eq!(out, b"visible\n");
    assert!(err.is_empty());
    assert_eq!(stderr.get_result().unwrap(), b"hidden\n");
}

// ============================================================================
// Input
// ============================================================================

fn input_chain(variant: usize) -> Vec<Hook> {
    match variant {
        0 => Vec::new(),
        1 => vec![passthrough_hook()],
        2 => vec![line_logger_hook("[in] {}")],
        _ => vec![passthrough_hook(), line_logger_hook("[in] {}"), passthrough_hook()],
    }
}

fn output_chain(variant: usize) -> Vec<OutputHook> {
    match variant {
        0 => Vec::new(),
        1 => vec![OutputHook::new(Some(passthrough_hook()), Some(passthrough_hook()))],
        2 => vec![OutputHook::std_out(line_logger_hook("[out] {}"))],
        _ => vec![
            OutputHook::merge_err_to_out(),
            OutputHook::std_out(passthrough_hook()),
        ],
    }
}

#[test]
fn test_stdin_roundtrip_across_hook_combinations() {
    for input_variant in 0..4 {
        for output_variant in 0..4 {
            let mut command = Command::new(["/bin/cat"])
                .std_input(ReadableStream::from_string("hello\n"))
                .timeout(Duration::from_secs(30));
            for hook in input_chain(input_variant) {
                command = command.input_hook(hook);
            }
            for hook in output_chain(output_variant) {
                command = command.output_hook(hook);
            }

            let (out, mut process) = capture(command);
            assert_eq!(out, b"hello\n", "input {input_variant}, output {output_variant}");
            assert_eq!(process.get_return_code().unwrap(), 0);
        }
    }
}

#[test]
fn test_input_hook_without_std_input() {
    let prefix = Hook::writer("greeting", |_incoming, outgoing| {
        use hookshell::WritableStream;
        outgoing.write(b"generated\n")
    });
    let (out, mut process) = capture(Command::new(["/bin/cat"]).input_hook(prefix));
    assert_eq!(out, b"generated\n");
    assert_eq!(process.get_return_code().unwrap(), 0);
}

#[test]
fn test_child_closing_stdin_early() {
    let big = "x".repeat(1024 * 1024);
    let (out, mut process) = capture(
        sh("head -c 5")
            .std_input(ReadableStream::from_string(big))
            .timeout(Duration::from_secs(30)),
    );
    assert_eq!(out, b"xxxxx");
    assert_eq!(process.get_return_code().unwrap(), 0);
}

// ============================================================================
// Verdicts
// ============================================================================

#[test]
fn test_ignore_codes() {
    for code in [0, 1, 2, 42] {
        let mut process = sh(&format!("exit {code}"))
            .ignore_codes([1, 2, 42])
            .spawn()
            .unwrap();
        assert_eq!(process.get_return_code().unwrap(), code);
    }

    let mut process = sh("exit 3").ignore_codes([1, 2]).spawn().unwrap();
    match process.get_return_code() {
        Err(HookshellError::ProcessExit { code, argv }) => {
            assert_eq!(code, 3);
            assert_eq!(argv[0], "/bin/sh");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_custom_success_code() {
    let mut process = sh("exit 5").success_code(5).spawn().unwrap();
    assert_eq!(process.get_return_code().unwrap(), 5);

    let mut process = sh("exit 0").success_code(5).spawn().unwrap();
    assert!(process.get_return_code().is_err());
}

#[test]
fn test_verdict_is_cached() {
    let mut process = sh("exit 9").spawn().unwrap();
    for _ in 0..3 {
        let err = process.get_return_code().unwrap_err();
        assert_eq!(err.exit_code(), Some(9));
    }
}

#[test]
fn test_timeout_terminates() {
    let started = Instant::now();
    let mut process = Command::new(["/bin/sleep", "30"])
        .timeout(Duration::from_secs(1))
        .spawn()
        .unwrap();
    assert!(process.is_running());

    let err = process.get_return_code().unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(err.exit_code(), Some(-1));
    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(!process.is_running());
}

#[test]
fn test_timeout_escalates_to_kill() {
    let started = Instant::now();
    let mut process = sh("trap '' TERM; while true; do sleep 0.1; done")
        .timeout(Duration::from_millis(300))
        .spawn()
        .unwrap();
    let err = process.get_return_code().unwrap_err();
    assert!(err.is_timeout());
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[test]
fn test_unbounded_timeout_waits_normally() {
    let mut process = Command::new(["/bin/true"])
        .timeout(Duration::MAX)
        .spawn()
        .unwrap();
    assert_eq!(process.get_return_code().unwrap(), 0);
    assert!(!process.is_running());
}

#[test]
fn test_signal_reports_negative_code() {
    let mut process = Command::new(["/bin/sleep", "30"]).spawn().unwrap();
    process.signal(libc::SIGTERM).unwrap();
    let err = process.get_return_code().unwrap_err();
    assert_eq!(err.exit_code(), Some(-libc::SIGTERM));
    assert!(!process.is_running());

    // Signalling a finished process is a no-op.
    process.signal(libc::SIGTERM).unwrap();
}

// ============================================================================
// Environment
// ============================================================================

#[test]
fn test_env_is_isolated() {
    let (out, _) = capture(Command::new(["/usr/bin/env"]));
    assert!(out.is_empty());

    let (out, _) = capture(Command::new(["/usr/bin/env"]).env("HOOKSHELL_TEST", "42"));
    assert_eq!(out, b"HOOKSHELL_TEST=42\n");
}

#[test]
fn test_inherit_env() {
    std::env::set_var("HOOKSHELL_INHERITED_MARKER", "yes");
    let (out, _) = capture(Command::new(["/usr/bin/env"]).inherit_env(true));
    let text = String::from_utf8(out).unwrap();
    assert!(text.lines().any(|l| l == "HOOKSHELL_INHERITED_MARKER=yes"));
}

#[test]
fn test_current_dir() {
    let dir = tempfile::tempdir().unwrap();
    let (out, mut process) = capture(Command::new(["/bin/pwd", "-P"]).current_dir(dir.path()));
    let expected = dir.path().canonicalize().unwrap();
    assert_eq!(String::from_utf8(out).unwrap().trim_end(), expected.to_str().unwrap());
    assert_eq!(process.get_return_code().unwrap(), 0);
}

// ============================================================================
// Hooks and processes
// ============================================================================

#[test]
fn test_reader_hook_on_output() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let spy = Hook::reader("spy", move |mut copy| {
        sink.lock().unwrap().extend(copy.read_to_end()?);
        Ok(())
    });

    let (out, mut process) = capture(sh("echo observed").output_hook(OutputHook::std_out(spy)));
    assert_eq!(out, b"observed\n");
    assert_eq!(process.get_return_code().unwrap(), 0);
    assert!(process.join_hooks().is_empty());
    assert_eq!(*seen.lock().unwrap(), b"observed\n");
}

#[test]
fn test_failing_hook_does_not_change_verdict() {
    let broken = Hook::writer("broken", |mut incoming, _outgoing| {
        incoming.drain()?;
        Err(std::io::Error::other("hook gave up"))
    });
    let mut process = sh("echo ignored")
        .output_hook(OutputHook::std_out(broken))
        .spawn()
        .unwrap();
    let (out, _) = process.take_output().read_all().unwrap();
    assert!(out.is_empty());
    assert_eq!(process.get_return_code().unwrap(), 0);

    let failures = process.join_hooks();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].hook, "broken");
}

#[test]
fn test_unwritable_debug_dir_keeps_pipeline() {
    let blocker = tempfile::NamedTempFile::new().unwrap();
    let (out, mut process) = capture(
        Command::new(["/bin/echo", "payload"]).debug_log_dir(blocker.path()),
    );
    assert_eq!(out, b"payload\n");
    assert_eq!(process.get_return_code().unwrap(), 0);
    process.take_output().read_all().unwrap();
    assert!(process.join_hooks().is_empty());
}

#[test]
fn test_debug_logs_written() {
    let base = tempfile::tempdir().unwrap();
    let (out, mut process) = capture(
        Command::new(["/bin/cat"])
            .std_input(ReadableStream::from_string("logged line\n"))
            .input_hook(passthrough_hook())
            .debug_log_dir(base.path()),
    );
    assert_eq!(out, b"logged line\n");
    assert_eq!(process.get_return_code().unwrap(), 0);
    process.take_output().read_all().unwrap();
    assert!(process.join_hooks().is_empty());

    let runs: Vec<_> = std::fs::read_dir(base.path()).unwrap().collect();
    assert_eq!(runs.len(), 1);
    let run_dir = runs[0].as_ref().unwrap().path();
    for name in ["after_initial_input-0-in", "passthrough", "after_command-0-out"] {
        let log = std::fs::read_to_string(run_dir.join(name)).unwrap();
        assert!(log.starts_with("hookstart,command,location\n"), "{name}");
        assert!(log.contains(",logged line\n"), "{name}");
        assert!(log.contains("hookend\n"), "{name}");
    }
}

#[test]
fn test_pid_and_argv() {
    let mut process = Command::new(["/bin/echo", "hi"])
        .output_hook(void_hook())
        .spawn()
        .unwrap();
    assert!(process.pid() > 0);
    assert_eq!(process.argv(), ["/bin/echo", "hi"]);
    process.get_return_code().unwrap();
}

#[tokio::test]
async fn test_async_wait() {
    let process = sh("exit 0").spawn().unwrap();
    assert_eq!(process.wait().await.unwrap(), 0);

    let process = sh("exit 6").spawn().unwrap();
    assert_eq!(process.wait().await.unwrap_err().exit_code(), Some(6));
}

#[test]
fn test_async_wait_with_tokio_test() {
    let process = Command::new(["/bin/true"]).spawn().unwrap();
    assert_eq!(tokio_test::block_on(process.wait()).unwrap(), 0);
}
