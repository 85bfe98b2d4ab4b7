//! Backup error types for dumpvault.
//!
//! Errors follow the DUMPVAULT_CATEGORY_NAME format. Attempt-level failures
//! never surface on their own: they are collected into the transcript carried
//! by the aggregated `AllAttemptsFailed` / `RestoreFailed` errors.

use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::backup::attempt::AttemptRecord;

/// Backup error code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupErrorCode {
    /// Untrusted file name rejected before any I/O
    InvalidName,
    /// Configured engine is not the supported MySQL family
    UnsupportedDriver,
    /// Connection has no database name
    MissingDatabase,
    /// Dump file does not exist
    NotFound,
    /// Dump file exists but is empty
    EmptySource,
    /// Every dump transport failed
    AllAttemptsFailed,
    /// Every restore transport failed
    RestoreFailed,
    /// Schedule request failed validation
    InvalidSchedule,
    /// Schedule id is unknown
    ScheduleNotFound,
    /// I/O error on the dump disk or schedule store
    IoError,
    /// Invalid configuration
    InvalidConfig,
    /// Dump directory not accessible
    DirNotAccessible,
}

impl BackupErrorCode {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            BackupErrorCode::InvalidName => "DUMPVAULT_BACKUP_INVALID_NAME",
            BackupErrorCode::UnsupportedDriver => "DUMPVAULT_CONFIG_UNSUPPORTED_DRIVER",
            BackupErrorCode::MissingDatabase => "DUMPVAULT_CONFIG_MISSING_DATABASE",
            BackupErrorCode::NotFound => "DUMPVAULT_BACKUP_NOT_FOUND",
            BackupErrorCode::EmptySource => "DUMPVAULT_BACKUP_EMPTY_SOURCE",
            BackupErrorCode::AllAttemptsFailed => "DUMPVAULT_BACKUP_ALL_ATTEMPTS_FAILED",
            BackupErrorCode::RestoreFailed => "DUMPVAULT_RESTORE_FAILED",
            BackupErrorCode::InvalidSchedule => "DUMPVAULT_SCHEDULE_INVALID",
            BackupErrorCode::ScheduleNotFound => "DUMPVAULT_SCHEDULE_NOT_FOUND",
            BackupErrorCode::IoError => "DUMPVAULT_BACKUP_IO_ERROR",
            BackupErrorCode::InvalidConfig => "DUMPVAULT_CONFIG_INVALID",
            BackupErrorCode::DirNotAccessible => "DUMPVAULT_BACKUP_DIR_NOT_ACCESSIBLE",
        }
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        match self {
            BackupErrorCode::InvalidName
            | BackupErrorCode::NotFound
            | BackupErrorCode::EmptySource
            | BackupErrorCode::InvalidSchedule
            | BackupErrorCode::ScheduleNotFound => Severity::Warning,
            BackupErrorCode::UnsupportedDriver
            | BackupErrorCode::MissingDatabase
            | BackupErrorCode::InvalidConfig => Severity::Fatal,
            _ => Severity::Error,
        }
    }

    /// HTTP status for the request layer
    pub fn status_code(&self) -> u16 {
        match self {
            BackupErrorCode::InvalidName | BackupErrorCode::InvalidSchedule => 400,
            BackupErrorCode::NotFound | BackupErrorCode::ScheduleNotFound => 404,
            BackupErrorCode::EmptySource => 422,
            BackupErrorCode::AllAttemptsFailed | BackupErrorCode::RestoreFailed => 502,
            _ => 500,
        }
    }
}

impl fmt::Display for BackupErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Severity level for backup errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "WARNING"),
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Backup error with context
#[derive(Debug)]
pub struct BackupError {
    code: BackupErrorCode,
    message: String,
    path: Option<PathBuf>,
    attempts: Vec<AttemptRecord>,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl BackupError {
    /// Create a new backup error
    pub fn new(code: BackupErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            path: None,
            attempts: Vec::new(),
            source: None,
        }
    }

    /// Attach path context
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Attach source error
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn invalid_name(name: &str) -> Self {
        Self::new(
            BackupErrorCode::InvalidName,
            format!("Invalid dump file name: {:?}", name),
        )
    }

    pub fn unsupported_driver(driver: &str) -> Self {
        Self::new(
            BackupErrorCode::UnsupportedDriver,
            format!(
                "Unsupported database driver '{}': only mysql and mariadb connections can be dumped",
                driver
            ),
        )
    }

    pub fn missing_database() -> Self {
        Self::new(
            BackupErrorCode::MissingDatabase,
            "The active connection has no database name configured",
        )
    }

    pub fn not_found(name: impl Into<String>) -> Self {
        Self::new(
            BackupErrorCode::NotFound,
            format!("Dump file not found: {}", name.into()),
        )
    }

    pub fn empty_source(name: impl Into<String>) -> Self {
        Self::new(
            BackupErrorCode::EmptySource,
            format!("Dump file is empty and cannot be restored: {}", name.into()),
        )
    }

    /// Every dump attempt failed. `attempts` is the full transcript.
    pub fn all_attempts_failed(attempts: Vec<AttemptRecord>) -> Self {
        let mut err = Self::new(
            BackupErrorCode::AllAttemptsFailed,
            format!("Dump failed on all {} transport attempt(s)", attempts.len()),
        );
        err.attempts = attempts;
        err
    }

    /// Every restore attempt failed. `attempts` is the full transcript.
    pub fn restore_failed(attempts: Vec<AttemptRecord>) -> Self {
        let mut err = Self::new(
            BackupErrorCode::RestoreFailed,
            format!("Restore failed on all {} transport attempt(s)", attempts.len()),
        );
        err.attempts = attempts;
        err
    }

    pub fn invalid_schedule(message: impl Into<String>) -> Self {
        Self::new(BackupErrorCode::InvalidSchedule, message)
    }

    pub fn schedule_not_found(id: impl fmt::Display) -> Self {
        Self::new(
            BackupErrorCode::ScheduleNotFound,
            format!("Schedule not found: {}", id),
        )
    }

    /// I/O error
    pub fn io_error(err: io::Error, context: impl Into<String>) -> Self {
        Self::new(BackupErrorCode::IoError, context).with_source(err)
    }

    /// Invalid configuration
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::new(BackupErrorCode::InvalidConfig, message)
    }

    /// Directory not accessible
    pub fn dir_not_accessible(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self::new(
            BackupErrorCode::DirNotAccessible,
            format!("Dump directory not accessible: {}", path.display()),
        )
        .with_path(path)
    }

    /// Get the error code
    pub fn code(&self) -> BackupErrorCode {
        self.code
    }

    /// Get the message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the path if present
    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }

    /// Per-attempt diagnostics, in the order the attempts were made
    pub fn attempts(&self) -> &[AttemptRecord] {
        &self.attempts
    }

    /// Check if error is fatal
    pub fn is_fatal(&self) -> bool {
        matches!(self.code.severity(), Severity::Fatal)
    }

    /// Human-readable report including every attempt's diagnostics
    pub fn report(&self) -> String {
        let mut out = self.to_string();
        for attempt in &self.attempts {
            out.push('\n');
            out.push_str(&attempt.to_string());
        }
        out
    }
}

impl fmt::Display for BackupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code.severity(), self.code, self.message)?;
        if let Some(ref path) = self.path {
            write!(f, " (path: {})", path.display())?;
        }
        if let Some(ref source) = self.source {
            write!(f, " (caused by: {})", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for BackupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl From<io::Error> for BackupError {
    fn from(err: io::Error) -> Self {
        Self::io_error(err, "I/O operation failed")
    }
}

/// Result type for backup operations
pub type BackupResult<T> = Result<T, BackupError>;
