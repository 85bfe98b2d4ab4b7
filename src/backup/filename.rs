//! Dump file name policy.
//!
//! Every path that turns an untrusted name into a file on disk goes through
//! [`validate`]: download, delete, bulk delete and restore.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::backup::errors::{BackupError, BackupResult};

/// Allow-list for dump file names.
pub const DUMP_NAME_PATTERN: &str = r"^[A-Za-z0-9._-]+\.sql$";

fn dump_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(DUMP_NAME_PATTERN).expect("dump name pattern is valid"))
}

/// Returns `name` unchanged if it is an acceptable dump file name.
pub fn validate(name: &str) -> BackupResult<&str> {
    if dump_name_regex().is_match(name) {
        Ok(name)
    } else {
        Err(BackupError::invalid_name(name))
    }
}

pub fn is_valid(name: &str) -> bool {
    validate(name).is_ok()
}

/// Destination name for a dump taken at `at`.
///
/// Second resolution: two dumps started within the same second share a name.
pub fn dump_file_name(at: DateTime<Utc>) -> String {
    format!("backup_{}.sql", at.format("%Y-%m-%d_%H-%M-%S"))
}

/// Name a dump is written under until it has been verified.
///
/// Never matches [`DUMP_NAME_PATTERN`], so the catalog cannot list, open or
/// delete an in-flight file.
pub fn staging_name(name: &str) -> String {
    format!(".{}.partial", name)
}
