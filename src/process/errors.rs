//! # Process Errors

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for process invocations
pub type ProcessResult<T> = Result<T, ProcessError>;

/// Failures of a single external process invocation.
///
/// `Spawn` and `Input` mean the process never produced output. `Timeout` and
/// `Exit` are derived from a captured [`ProcessOutput`](super::ProcessOutput).
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to open input file {}: {source}", path.display())]
    Input {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("exited with {}", describe_code(*code))]
    Exit { code: Option<i32> },

    #[error("process i/o failed: {0}")]
    Io(#[from] io::Error),
}

impl ProcessError {
    /// Exit code, when the process ran to completion
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ProcessError::Exit { code } => *code,
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ProcessError::Timeout { .. })
    }
}

fn describe_code(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_display() {
        let err = ProcessError::Exit { code: Some(2) };
        assert_eq!(err.to_string(), "exited with exit code 2");
        assert_eq!(err.exit_code(), Some(2));

        let err = ProcessError::Exit { code: None };
        assert!(err.to_string().contains("signal"));
    }

    #[test]
    fn test_timeout_display() {
        let err = ProcessError::Timeout { seconds: 300 };
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "timed out after 300s");
        assert_eq!(err.exit_code(), None);
    }
}
