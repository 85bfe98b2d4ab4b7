//! # Process Module
//!
//! Invocation of external client binaries behind the [`ProcessRunner`] trait.
//!
//! A [`ProcessSpec`] carries the argument vector, working directory,
//! environment overrides, an optional file streamed as standard input and a
//! hard timeout. Runners never retry; classification of the outcome is left
//! to [`ProcessOutput::check`].

pub mod errors;
pub mod runner;

#[cfg(test)]
pub(crate) mod scripted;

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

pub use errors::{ProcessError, ProcessResult};
pub use runner::TokioProcessRunner;

/// Executes one external process to completion or timeout.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run the process described by `spec`.
    ///
    /// Returns `Err` only when the process could not be started at all.
    /// Non-zero exits and timeouts come back as a [`ProcessOutput`] so that
    /// both captured streams survive.
    async fn run(&self, spec: &ProcessSpec) -> ProcessResult<ProcessOutput>;
}

/// Description of a single process invocation.
#[derive(Clone)]
pub struct ProcessSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
    pub input: Option<PathBuf>,
    pub timeout: Duration,
}

impl ProcessSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
            input: None,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Stream the given file to the process as standard input.
    pub fn input(mut self, path: impl Into<PathBuf>) -> Self {
        self.input = Some(path.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Program followed by its arguments.
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }

    /// Value of a `--name=value` argument, if present.
    pub fn option_value(&self, name: &str) -> Option<&str> {
        let prefix = format!("--{}=", name);
        self.args.iter().find_map(|a| a.strip_prefix(prefix.as_str()))
    }
}

// Environment values may carry the database secret; only keys are printed.
impl fmt::Debug for ProcessSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let env_keys: Vec<&str> = self.env.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("ProcessSpec")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("cwd", &self.cwd)
            .field("env", &env_keys)
            .field("input", &self.input)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// How a process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitClass {
    Success,
    Failed { code: Option<i32> },
    TimedOut { after: Duration },
}

/// Captured result of a process that was started.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub exit: ExitClass,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit == ExitClass::Success
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self.exit {
            ExitClass::Success => Some(0),
            ExitClass::Failed { code } => code,
            ExitClass::TimedOut { .. } => None,
        }
    }

    /// Map the exit classification to a [`ProcessError`] on failure.
    pub fn check(&self) -> ProcessResult<()> {
        match self.exit {
            ExitClass::Success => Ok(()),
            ExitClass::Failed { code } => Err(ProcessError::Exit { code }),
            ExitClass::TimedOut { after } => Err(ProcessError::Timeout {
                seconds: after.as_secs(),
            }),
        }
    }
}
