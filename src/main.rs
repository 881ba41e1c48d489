//! hookshell binary entry point.

use std::process::ExitCode;

use hookshell::cli::{self, Args};
use hookshell::config::Config;
use hookshell::hook::{forward_hook, logger_line_hook, void_hook, Console};
use hookshell::{logging, Command, HookshellError, OutputHook, ReadableStream};
use tracing::{error, info, warn};

const EXIT_USAGE: u8 = 2;
const EXIT_TIMEOUT: u8 = 124;
const EXIT_NOT_STARTED: u8 = 127;

fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {e}");
            eprintln!("Try 'hookshell --help' for more information.");
            return ExitCode::from(EXIT_USAGE);
        }
    };

    if args.help {
        cli::print_help();
        return ExitCode::SUCCESS;
    }
    if args.version {
        cli::print_version();
        return ExitCode::SUCCESS;
    }

    let config = match Config::load(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(EXIT_USAGE);
        }
    };

    // A subscriber may already be installed when embedded.
    let _ = logging::init_with_filter(config.log_filter());

    if args.command.is_empty() {
        eprintln!("error: no command given");
        eprintln!("Try 'hookshell --help' for more information.");
        return ExitCode::from(EXIT_USAGE);
    }

    match run(&args, &config) {
        Ok(code) => ExitCode::from(status_byte(code)),
        Err(e) => {
            let status = match &e {
                HookshellError::ProcessExit { code, .. } => status_byte(*code),
                HookshellError::Timeout { .. } => EXIT_TIMEOUT,
                HookshellError::Spawn { .. } => EXIT_NOT_STARTED,
                HookshellError::EmptyCommand | HookshellError::InvalidWorkingDir { .. } => EXIT_USAGE,
                _ => 1,
            };
            error!("{e}");
            ExitCode::from(status)
        }
    }
}

fn run(args: &Args, config: &Config) -> hookshell::Result<i32> {
    let mut command = config
        .apply_to(Command::new(args.command.iter().cloned()))
        .envs(args.env.iter().cloned());
    if let Some(dir) = &args.cwd {
        command = command.current_dir(dir);
    }
    if let Some(text) = &args.stdin {
        command = command.std_input(ReadableStream::from_string(text.as_str()));
    }
    if args.merge_stderr {
        command = command.output_hook(OutputHook::merge_err_to_out());
    }
    let echo = if args.log_lines {
        logger_line_hook("[OUT] {}", "[ERR] {}")
    } else {
        OutputHook::new(
            Some(forward_hook(Console::Stdout)),
            Some(forward_hook(Console::Stderr)),
        )
    };
    command = command.output_hook(echo).output_hook(void_hook());

    let mut process = command.spawn()?;
    info!(pid = process.pid(), "started {}", args.command.join(" "));

    let result = process.get_return_code();
    for failure in process.join_hooks() {
        warn!("{failure}");
    }
    result
}

/// Map an exit code to a shell status byte; signal `N` becomes `128 + N`.
fn status_byte(code: i32) -> u8 {
    if code < 0 {
        (128 + code.unsigned_abs().min(127)) as u8
    } else {
        (code & 0xff) as u8
    }
}
