//! Scripted [`ProcessRunner`] used by engine tests.
//!
//! Every invocation is recorded. The response for each call is produced by a
//! closure over the [`ProcessSpec`], so tests can fail particular hosts or
//! phases and have "successful" dumps write a result file.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::{ExitClass, ProcessOutput, ProcessResult, ProcessRunner, ProcessSpec};

/// One recorded invocation.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub spec: ProcessSpec,
    /// Contents of the input file at the time of the call.
    pub stdin: Option<String>,
}

impl Invocation {
    pub fn host(&self) -> Option<&str> {
        self.spec.option_value("host")
    }

    pub fn protocol(&self) -> Option<&str> {
        self.spec.option_value("protocol")
    }

    pub fn statement(&self) -> Option<&str> {
        self.spec.option_value("execute")
    }

    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.spec
            .env
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Scripted reply for one invocation.
#[derive(Debug, Clone)]
pub struct Reply {
    pub exit: ExitClass,
    pub stdout: String,
    pub stderr: String,
    /// Bytes written to the `--result-file` destination, if any.
    pub result_file: Option<Vec<u8>>,
}

impl Reply {
    pub fn ok() -> Self {
        Self {
            exit: ExitClass::Success,
            stdout: String::new(),
            stderr: String::new(),
            result_file: None,
        }
    }

    /// Successful dump that writes `contents` to the result file.
    pub fn dump(contents: &str) -> Self {
        Self {
            result_file: Some(contents.as_bytes().to_vec()),
            ..Self::ok()
        }
    }

    pub fn fail(code: i32, stderr: &str) -> Self {
        Self {
            exit: ExitClass::Failed { code: Some(code) },
            stderr: stderr.to_string(),
            ..Self::ok()
        }
    }

    pub fn timeout() -> Self {
        Self {
            exit: ExitClass::TimedOut {
                after: Duration::from_secs(1),
            },
            ..Self::ok()
        }
    }

    pub fn writing(mut self, contents: &[u8]) -> Self {
        self.result_file = Some(contents.to_vec());
        self
    }
}

type Script = dyn Fn(&Invocation) -> Reply + Send + Sync;

pub struct ScriptedRunner {
    script: Box<Script>,
    calls: Arc<Mutex<Vec<Invocation>>>,
}

impl ScriptedRunner {
    pub fn new(script: impl Fn(&Invocation) -> Reply + Send + Sync + 'static) -> Self {
        Self {
            script: Box::new(script),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(&self, spec: &ProcessSpec) -> ProcessResult<ProcessOutput> {
        let stdin = match &spec.input {
            Some(path) => Some(std::fs::read_to_string(path)?),
            None => None,
        };
        let invocation = Invocation {
            spec: spec.clone(),
            stdin,
        };
        let reply = (self.script)(&invocation);
        self.calls.lock().unwrap().push(invocation);

        if let (Some(bytes), Some(path)) = (&reply.result_file, spec.option_value("result-file")) {
            std::fs::write(path, bytes)?;
        }

        Ok(ProcessOutput {
            exit: reply.exit,
            stdout: reply.stdout,
            stderr: reply.stderr,
            elapsed: Duration::from_millis(1),
        })
    }
}
