//! Per-attempt diagnostics.
//!
//! A failed transport attempt is recorded as an [`AttemptRecord`] and the
//! engine moves on to the next candidate. The records end up in the
//! aggregated error handed to the operator.

use std::fmt;
use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::process::{ProcessError, ProcessOutput};

/// Why a single attempt failed.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error(transparent)]
    Process(#[from] ProcessError),

    /// The process reported success but the dump file is missing or empty.
    #[error("verification failed: {0}")]
    Verification(String),

    #[error("storage error: {0}")]
    Storage(#[from] io::Error),
}

/// Diagnostics of one failed attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// Transport label, e.g. `tcp ::1:3306` or `pipe MySQL (import)`.
    pub label: String,
    pub argv: Vec<String>,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub reason: String,
    pub stdout: String,
    pub stderr: String,
}

impl AttemptRecord {
    pub fn new(
        label: impl Into<String>,
        argv: Vec<String>,
        output: Option<&ProcessOutput>,
        error: &AttemptError,
    ) -> Self {
        let (exit_code, timed_out) = match error {
            AttemptError::Process(e) => (e.exit_code(), e.is_timeout()),
            _ => (output.and_then(|o| o.exit_code()), false),
        };
        Self {
            label: label.into(),
            argv,
            exit_code,
            timed_out,
            reason: error.to_string(),
            stdout: output.map(|o| o.stdout.clone()).unwrap_or_default(),
            stderr: output.map(|o| o.stderr.clone()).unwrap_or_default(),
        }
    }

    /// Combined captured output, stderr first.
    pub fn captured(&self) -> String {
        match (self.stderr.trim(), self.stdout.trim()) {
            ("", "") => String::new(),
            (err, "") => err.to_string(),
            ("", out) => out.to_string(),
            (err, out) => format!("{}\n{}", err, out),
        }
    }
}

impl fmt::Display for AttemptRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "- [{}] {}", self.label, self.reason)?;
        let captured = self.captured();
        if !captured.is_empty() {
            for line in captured.lines() {
                write!(f, "\n    {}", line)?;
            }
        }
        Ok(())
    }
}
