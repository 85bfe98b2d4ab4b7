//! Tokio-backed [`ProcessRunner`].

use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{ChildStdin, Command};
use tracing::{debug, warn};

use super::{ExitClass, ProcessError, ProcessOutput, ProcessResult, ProcessRunner, ProcessSpec};

/// Runs processes with `tokio::process`, killing them once the timeout elapses.
#[derive(Debug, Clone, Default)]
pub struct TokioProcessRunner;

impl TokioProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, spec: &ProcessSpec) -> ProcessResult<ProcessOutput> {
        let input = match &spec.input {
            Some(path) => Some(tokio::fs::File::open(path).await.map_err(|source| {
                ProcessError::Input {
                    path: path.clone(),
                    source,
                }
            })?),
            None => None,
        };

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &spec.cwd {
            cmd.current_dir(cwd);
        }
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }

        let started = Instant::now();
        let mut child = cmd.spawn().map_err(|source| ProcessError::Spawn {
            program: spec.program.clone(),
            source,
        })?;
        debug!(program = %spec.program, pid = ?child.id(), "process started");

        let stdout_task = tokio::spawn(read_stream(child.stdout.take()));
        let stderr_task = tokio::spawn(read_stream(child.stderr.take()));
        let stdin_task = tokio::spawn(feed_input(input, child.stdin.take()));

        let mut exit = match tokio::time::timeout(spec.timeout, child.wait()).await {
            Ok(status) => {
                let status = status?;
                if status.success() {
                    ExitClass::Success
                } else {
                    ExitClass::Failed {
                        code: status.code(),
                    }
                }
            }
            Err(_) => {
                warn!(program = %spec.program, timeout_secs = spec.timeout.as_secs(), "process timed out, killing");
                if let Err(e) = child.kill().await {
                    warn!(program = %spec.program, error = %e, "failed to kill timed out process");
                }
                ExitClass::TimedOut {
                    after: spec.timeout,
                }
            }
        };

        let stdout = stdout_task.await.unwrap_or_default();
        let mut stderr = stderr_task.await.unwrap_or_default();

        // A "successful" exit that did not consume the whole input is not a success.
        if let Ok(Err(e)) = stdin_task.await {
            stderr.push_str(&format!("\ninput stream error: {}", e));
            if exit == ExitClass::Success {
                exit = ExitClass::Failed { code: None };
            }
        }

        Ok(ProcessOutput {
            exit,
            stdout,
            stderr,
            elapsed: started.elapsed(),
        })
    }
}

async fn read_stream<R: AsyncRead + Unpin>(stream: Option<R>) -> String {
    let mut buf = Vec::new();
    if let Some(mut stream) = stream {
        let _ = stream.read_to_end(&mut buf).await;
    }
    String::from_utf8_lossy(&buf).into_owned()
}

async fn feed_input(
    input: Option<tokio::fs::File>,
    stdin: Option<ChildStdin>,
) -> std::io::Result<()> {
    if let (Some(mut file), Some(mut stdin)) = (input, stdin) {
        tokio::io::copy(&mut file, &mut stdin).await?;
        // Dropping stdin closes the pipe so the client sees EOF.
        drop(stdin);
    }
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    fn sh(script: &str) -> ProcessSpec {
        ProcessSpec::new("sh")
            .arg("-c")
            .arg(script)
            .timeout(Duration::from_secs(10))
    }

    #[tokio::test]
    async fn test_captures_both_streams_on_success() {
        let output = TokioProcessRunner::new()
            .run(&sh("echo out; echo err 1>&2"))
            .await
            .unwrap();

        assert!(output.success());
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
    }

    #[tokio::test]
    async fn test_non_zero_exit_keeps_output() {
        let output = TokioProcessRunner::new()
            .run(&sh("echo boom 1>&2; exit 3"))
            .await
            .unwrap();

        assert_eq!(output.exit, ExitClass::Failed { code: Some(3) });
        assert_eq!(output.stderr.trim(), "boom");
        assert!(output.check().is_err());
    }

    #[tokio::test]
    async fn test_timeout_is_a_failure() {
        let spec = sh("sleep 5").timeout(Duration::from_millis(200));
        let output = TokioProcessRunner::new().run(&spec).await.unwrap();

        assert!(matches!(output.exit, ExitClass::TimedOut { .. }));
        assert!(output.check().unwrap_err().is_timeout());
    }

    #[tokio::test]
    async fn test_streams_input_file_to_stdin() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "CREATE TABLE t (id INT);\n").unwrap();

        let spec = ProcessSpec::new("cat")
            .input(file.path())
            .timeout(Duration::from_secs(10));
        let output = TokioProcessRunner::new().run(&spec).await.unwrap();

        assert!(output.success());
        assert_eq!(output.stdout, "CREATE TABLE t (id INT);\n");
    }

    #[tokio::test]
    async fn test_env_and_cwd_are_applied() {
        let dir = tempfile::TempDir::new().unwrap();
        let spec = sh("printf '%s' \"$MYSQL_PWD\"; pwd 1>&2")
            .env("MYSQL_PWD", "s3cret")
            .current_dir(dir.path());
        let output = TokioProcessRunner::new().run(&spec).await.unwrap();

        assert_eq!(output.stdout, "s3cret");
        let reported = std::fs::canonicalize(output.stderr.trim()).unwrap();
        assert_eq!(reported, std::fs::canonicalize(dir.path()).unwrap());
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let spec = ProcessSpec::new("dumpvault-definitely-not-a-binary");
        let err = TokioProcessRunner::new().run(&spec).await.unwrap_err();
        assert!(matches!(err, ProcessError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_missing_input_file_is_input_error() {
        let spec = ProcessSpec::new("cat").input("/nonexistent/dump.sql");
        let err = TokioProcessRunner::new().run(&spec).await.unwrap_err();
        assert!(matches!(err, ProcessError::Input { .. }));
    }
}
