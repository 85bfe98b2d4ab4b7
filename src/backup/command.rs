//! Argument vectors for the MySQL client tools.
//!
//! The secret is delivered through [`PASSWORD_ENV`] on every invocation and
//! never appears in an argument.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::backup::DumpSettings;
use crate::connection::ConnectionProfile;
use crate::process::ProcessSpec;

/// Environment variable the client tools read the password from.
pub const PASSWORD_ENV: &str = "MYSQL_PWD";

const CHARSET_ARG: &str = "--default-character-set=utf8mb4";

/// How the client reaches the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    Tcp { host: String, port: u16 },
    Pipe { name: String },
}

impl Transport {
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Transport::Tcp {
            host: host.into(),
            port,
        }
    }

    pub fn pipe(name: impl Into<String>) -> Self {
        Transport::Pipe { name: name.into() }
    }

    fn connection_args(&self, username: &str) -> Vec<String> {
        match self {
            Transport::Tcp { host, port } => vec![
                "--protocol=TCP".to_string(),
                format!("--host={}", host),
                format!("--port={}", port),
                format!("--user={}", username),
            ],
            Transport::Pipe { name } => vec![
                "--protocol=PIPE".to_string(),
                format!("--socket={}", name),
                format!("--user={}", username),
            ],
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Tcp { host, port } => write!(f, "tcp {}:{}", host, port),
            Transport::Pipe { name } => write!(f, "pipe {}", name),
        }
    }
}

/// Builds process specs for one resolved connection.
pub struct ClientCommands<'a> {
    settings: &'a DumpSettings,
    profile: &'a ConnectionProfile,
    workdir: PathBuf,
}

impl<'a> ClientCommands<'a> {
    pub fn new(
        settings: &'a DumpSettings,
        profile: &'a ConnectionProfile,
        workdir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            settings,
            profile,
            workdir: workdir.into(),
        }
    }

    fn base(&self, program: &str, timeout_secs: u64) -> ProcessSpec {
        ProcessSpec::new(program)
            .current_dir(&self.workdir)
            .env(PASSWORD_ENV, &self.profile.password)
            .timeout(Duration::from_secs(timeout_secs))
    }

    /// Consistent-snapshot dump with routines and triggers into `result_file`.
    pub fn dump(&self, transport: &Transport, result_file: &Path) -> ProcessSpec {
        self.base(&self.settings.dump_binary, self.settings.dump_timeout_secs)
            .args([
                "--single-transaction",
                "--routines",
                "--triggers",
                CHARSET_ARG,
            ])
            .args(transport.connection_args(&self.profile.username))
            .arg(format!("--result-file={}", result_file.display()))
            .arg(self.profile.database.as_str())
    }

    /// Import of `dump_file`, streamed on standard input.
    pub fn import(&self, transport: &Transport, dump_file: &Path) -> ProcessSpec {
        self.base(&self.settings.client_binary, self.settings.import_timeout_secs)
            .arg(CHARSET_ARG)
            .args(transport.connection_args(&self.profile.username))
            .arg(self.profile.database.as_str())
            .input(dump_file)
    }

    /// Server-wide toggle of foreign key checking.
    ///
    /// Each phase runs in its own client session, so a session-scoped
    /// `SET FOREIGN_KEY_CHECKS` would not outlive the invocation.
    pub fn foreign_key_checks(&self, transport: &Transport, enabled: bool) -> ProcessSpec {
        let statement = format!("SET GLOBAL FOREIGN_KEY_CHECKS={}", u8::from(enabled));
        self.base(&self.settings.client_binary, self.settings.admin_timeout_secs)
            .args(transport.connection_args(&self.profile.username))
            .arg(format!("--execute={}", statement))
            .arg(self.profile.database.as_str())
    }
}
