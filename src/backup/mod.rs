//! # Backup Module
//!
//! Logical SQL dumps of the panel database and restores from them.
//!
//! - [`engine::BackupEngine`] produces verified dump files
//! - [`restore::RestoreEngine`] replays a dump in three ordered phases
//! - [`catalog::DumpCatalog`] lists, opens and deletes dump files
//! - [`scheduler::ScheduleStore`] records the desired backup cadence
//! - [`service::BackupService`] ties them together for the CLI and HTTP layer

pub mod attempt;
pub mod catalog;
pub mod classifier;
pub mod command;
pub mod engine;
pub mod errors;
pub mod filename;
pub mod hosts;
pub mod restore;
pub mod scheduler;
pub mod service;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::file_storage::Disk;

pub use classifier::FallbackMode;
pub use errors::{BackupError, BackupErrorCode, BackupResult};

/// Directory on the storage disk that holds dump files.
pub const DEFAULT_DUMP_DIRECTORY: &str = "backups";

/// Content type used when serving dump files.
pub const SQL_CONTENT_TYPE: &str = "application/sql";

/// Client tool and transport settings for dump and restore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DumpSettings {
    /// Dump binary (`mysqldump`)
    pub dump_binary: String,
    /// Interactive client binary (`mysql`) used for import and admin statements
    pub client_binary: String,
    /// Ceiling for one dump attempt
    pub dump_timeout_secs: u64,
    /// Ceiling for the import phase of a restore
    pub import_timeout_secs: u64,
    /// Ceiling for the foreign key toggles around an import
    pub admin_timeout_secs: u64,
    /// Named pipe used by the fallback transport
    pub pipe_name: String,
    pub pipe_fallback: FallbackMode,
    /// Lower-cased substrings that mark a TCP failure as "transport unavailable"
    pub failure_signatures: Vec<String>,
}

impl Default for DumpSettings {
    fn default() -> Self {
        Self {
            dump_binary: "mysqldump".to_string(),
            client_binary: "mysql".to_string(),
            dump_timeout_secs: 300,
            import_timeout_secs: 1800,
            admin_timeout_secs: 60,
            pipe_name: "MySQL".to_string(),
            pipe_fallback: FallbackMode::Auto,
            failure_signatures: classifier::DEFAULT_SIGNATURES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// A dump file as exposed to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DumpFile {
    /// File name, always valid under [`filename::validate`]
    pub name: String,
    /// Path relative to the storage disk root
    pub path: String,
    pub size_bytes: u64,
    pub modified_at: DateTime<Utc>,
    pub url: String,
}

impl DumpFile {
    /// Read metadata of `directory/name` from `disk`.
    pub fn describe(disk: &dyn Disk, directory: &str, name: &str) -> BackupResult<Self> {
        let path = relative_path(directory, name);
        let size_bytes = disk
            .size(&path)
            .map_err(|e| BackupError::io_error(e, format!("Failed to stat dump file: {}", name)))?;
        let modified_at = disk
            .last_modified(&path)
            .map_err(|e| BackupError::io_error(e, format!("Failed to stat dump file: {}", name)))?;

        Ok(Self {
            name: name.to_string(),
            url: disk.url(&path),
            path,
            size_bytes,
            modified_at,
        })
    }
}

/// Dump catalog summary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogStatus {
    pub dump_count: u32,
    pub total_size_bytes: u64,
    pub latest: Option<DumpFile>,
}

pub(crate) fn relative_path(directory: &str, name: &str) -> String {
    let directory = directory.trim_matches('/');
    if directory.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", directory, name)
    }
}
