//! CLI errors and exit codes

use std::io;

use thiserror::Error;

use crate::backup::errors::BackupError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Backup(#[from] BackupError),

    #[error("restore overwrites the current database contents; re-run with --yes to confirm")]
    ConfirmationRequired,

    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),

    #[error("failed to encode output: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("HTTP server failed: {0}")]
    Server(#[source] io::Error),
}

impl CliError {
    /// Process exit code: 2 for rejected input, 1 for everything else.
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::ConfirmationRequired => 2,
            CliError::Backup(e) if (400..500).contains(&e.code().status_code()) => 2,
            _ => 1,
        }
    }

    /// Message for stderr, with the attempt transcript when there is one.
    pub fn report(&self) -> String {
        match self {
            CliError::Backup(e) => e.report(),
            other => other.to_string(),
        }
    }
}

pub type CliResult<T> = Result<T, CliError>;
