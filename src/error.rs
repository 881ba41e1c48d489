//! Error types for hookshell.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Main error type for hookshell operations.
#[derive(Error, Debug)]
pub enum HookshellError {
    /// The command has no program to run.
    #[error("cannot execute an empty command")]
    EmptyCommand,

    /// The working directory cannot be used for the child.
    #[error("invalid working directory {path:?}: {reason}")]
    InvalidWorkingDir { path: PathBuf, reason: String },

    /// The child process could not be started.
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The process exited with a code outside the ignored set.
    #[error("process {argv:?} exited with unexpected code {code}")]
    ProcessExit { code: i32, argv: Vec<String> },

    /// The process outlived its deadline and was terminated.
    #[error("process {argv:?} timed out after {timeout:?}")]
    Timeout { timeout: Duration, argv: Vec<String> },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A hook body did not complete.
    #[error("hook '{hook}' failed: {reason}")]
    HookFailed { hook: String, reason: String },

    /// A result hook finished without producing its value.
    #[error("hook '{hook}' did not produce a result")]
    ResultUnavailable { hook: String },
}

impl HookshellError {
    /// Exit code carried by the error, if it describes a finished process.
    ///
    /// Timeouts report `-1`.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::ProcessExit { code, .. } => Some(*code),
            Self::Timeout { .. } => Some(-1),
            _ => None,
        }
    }

    /// Check if this error is a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Convenience Result type for hookshell operations.
pub type Result<T> = std::result::Result<T, HookshellError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_exit_display() {
        let err = HookshellError::ProcessExit {
            code: 3,
            argv: vec!["false".into()],
        };
        assert!(err.to_string().contains("unexpected code 3"));
        assert!(err.to_string().contains("false"));
        assert_eq!(err.exit_code(), Some(3));
    }

    #[test]
    fn test_timeout_display() {
        let err = HookshellError::Timeout {
            timeout: Duration::from_secs(2),
            argv: vec!["sleep".into(), "10".into()],
        };
        assert!(err.to_string().contains("timed out"));
        assert!(err.is_timeout());
        assert_eq!(err.exit_code(), Some(-1));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: HookshellError = io_err.into();
        assert!(matches!(err, HookshellError::Io(_)));
        assert!(err.to_string().contains("I/O error"));
        assert_eq!(err.exit_code(), None);
    }

    #[test]
    fn test_spawn_error_keeps_source() {
        use std::error::Error as _;

        let err = HookshellError::Spawn {
            program: "missing-binary".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        };
        assert!(err.to_string().contains("missing-binary"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_invalid_dir_display() {
        let err = HookshellError::InvalidWorkingDir {
            path: PathBuf::from("/does/not/exist"),
            reason: "not a directory".into(),
        };
        assert!(err.to_string().contains("/does/not/exist"));
    }
}
