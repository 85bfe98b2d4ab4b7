//! Dump file catalog.
//!
//! Listing, download and deletion of dump files. Every operation that takes
//! a file name runs it through [`filename::validate`] before touching disk.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::backup::errors::{BackupError, BackupResult};
use crate::backup::{filename, relative_path, CatalogStatus, DumpFile};
use crate::file_storage::Disk;

/// Result of a bulk delete
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkDeleteReport {
    pub deleted_count: u32,
    /// Requested names that did not exist
    pub missing: Vec<String>,
}

/// A dump file resolved for download.
#[derive(Debug, Clone)]
pub struct OpenDump {
    pub file: DumpFile,
    /// Absolute on-disk path
    pub path: PathBuf,
}

pub struct DumpCatalog {
    disk: Arc<dyn Disk>,
    directory: String,
}

impl DumpCatalog {
    pub fn new(disk: Arc<dyn Disk>, directory: impl Into<String>) -> Self {
        Self {
            disk,
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &str {
        &self.directory
    }

    /// Dump files, newest first.
    ///
    /// Files whose names fail validation and zero-byte files are skipped.
    pub fn list(&self) -> BackupResult<Vec<DumpFile>> {
        let names = self.disk.files(&self.directory).map_err(|e| {
            BackupError::io_error(e, format!("Failed to read dump directory: {}", self.directory))
        })?;

        let mut files = Vec::new();
        for name in names.iter().filter(|n| filename::is_valid(n)) {
            let file = DumpFile::describe(self.disk.as_ref(), &self.directory, name)?;
            if file.size_bytes == 0 {
                debug!(file = %name, "skipping zero-byte dump file");
                continue;
            }
            files.push(file);
        }

        files.sort_by(|a, b| {
            b.modified_at
                .cmp(&a.modified_at)
                .then_with(|| b.name.cmp(&a.name))
        });
        Ok(files)
    }

    /// Delete one dump file.
    pub fn delete(&self, name: &str) -> BackupResult<()> {
        let name = filename::validate(name)?;
        let path = relative_path(&self.directory, name);
        if !self.disk.exists(&path) {
            return Err(BackupError::not_found(name));
        }

        self.disk
            .delete(&path)
            .map_err(|e| BackupError::io_error(e, format!("Failed to delete dump file: {}", name)))?;
        info!(file = %name, "dump file deleted");
        Ok(())
    }

    /// Delete several dump files.
    ///
    /// All names are validated before anything is deleted; one invalid name
    /// rejects the whole request. Names that do not exist are reported in
    /// [`BulkDeleteReport::missing`].
    pub fn bulk_delete(&self, names: &[String]) -> BackupResult<BulkDeleteReport> {
        for name in names {
            filename::validate(name)?;
        }

        let mut report = BulkDeleteReport::default();
        for name in names {
            let path = relative_path(&self.directory, name);
            if !self.disk.exists(&path) {
                if !report.missing.contains(name) {
                    report.missing.push(name.clone());
                }
                continue;
            }
            self.disk
                .delete(&path)
                .map_err(|e| BackupError::io_error(e, format!("Failed to delete dump file: {}", name)))?;
            report.deleted_count += 1;
        }

        info!(
            deleted = report.deleted_count,
            missing = report.missing.len(),
            "bulk delete of dump files"
        );
        Ok(report)
    }

    /// Resolve a dump file for download.
    pub fn open(&self, name: &str) -> BackupResult<OpenDump> {
        let name = filename::validate(name)?;
        let relative = relative_path(&self.directory, name);
        if !self.disk.exists(&relative) {
            return Err(BackupError::not_found(name));
        }

        Ok(OpenDump {
            file: DumpFile::describe(self.disk.as_ref(), &self.directory, name)?,
            path: self.disk.path(&relative),
        })
    }

    /// Count, total size and newest dump.
    pub fn status(&self) -> BackupResult<CatalogStatus> {
        let files = self.list()?;
        Ok(CatalogStatus {
            dump_count: files.len() as u32,
            total_size_bytes: files.iter().map(|f| f.size_bytes).sum(),
            latest: files.into_iter().next(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::errors::BackupErrorCode;
    use crate::file_storage::LocalDisk;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn setup() -> (TempDir, Arc<LocalDisk>, DumpCatalog) {
        let temp = TempDir::new().unwrap();
        let disk = Arc::new(LocalDisk::new(temp.path(), "https://panel.test/storage/"));
        disk.make_directory("backups").unwrap();
        let catalog = DumpCatalog::new(disk.clone(), "backups");
        (temp, disk, catalog)
    }

    fn write(disk: &LocalDisk, name: &str, contents: &str, age_secs: u64) {
        let path = disk.path(&format!("backups/{}", name));
        std::fs::write(&path, contents).unwrap();
        let modified = SystemTime::now() - Duration::from_secs(age_secs);
        std::fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(modified)
            .unwrap();
    }

    #[test]
    fn test_list_newest_first() {
        let (_temp, disk, catalog) = setup();
        write(&disk, "backup_2026-01-01_00-00-00.sql", "old", 3600);
        write(&disk, "backup_2026-01-02_00-00-00.sql", "newer", 60);
        write(&disk, "notes.txt", "not a dump", 0);
        write(&disk, "leftover.sql", "", 0);

        let files = catalog.list().unwrap();
        let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["backup_2026-01-02_00-00-00.sql", "backup_2026-01-01_00-00-00.sql"]
        );
        assert_eq!(files[0].size_bytes, 5);
        assert_eq!(
            files[0].url,
            "https://panel.test/storage/backups/backup_2026-01-02_00-00-00.sql"
        );
    }

    #[test]
    fn test_list_missing_directory_is_empty() {
        let temp = TempDir::new().unwrap();
        let catalog = DumpCatalog::new(Arc::new(LocalDisk::new(temp.path(), "/storage")), "backups");
        assert!(catalog.list().unwrap().is_empty());
        assert_eq!(catalog.status().unwrap().dump_count, 0);
    }

    #[test]
    fn test_delete() {
        let (_temp, disk, catalog) = setup();
        write(&disk, "a.sql", "dump", 0);

        catalog.delete("a.sql").unwrap();
        assert!(!disk.exists("backups/a.sql"));

        let err = catalog.delete("a.sql").unwrap_err();
        assert_eq!(err.code(), BackupErrorCode::NotFound);
    }

    #[test]
    fn test_delete_rejects_traversal() {
        let (temp, _disk, catalog) = setup();
        std::fs::write(temp.path().join("victim.sql"), "keep").unwrap();

        let err = catalog.delete("../victim.sql").unwrap_err();
        assert_eq!(err.code(), BackupErrorCode::InvalidName);
        assert!(temp.path().join("victim.sql").exists());
    }

    #[test]
    fn test_bulk_delete_reports_missing() {
        let (_temp, disk, catalog) = setup();
        write(&disk, "a.sql", "dump", 0);

        let report = catalog
            .bulk_delete(&["a.sql".to_string(), "missing.sql".to_string()])
            .unwrap();
        assert_eq!(
            report,
            BulkDeleteReport {
                deleted_count: 1,
                missing: vec!["missing.sql".to_string()],
            }
        );
        assert!(catalog.list().unwrap().iter().all(|f| f.name != "a.sql"));
    }

    #[test]
    fn test_bulk_delete_invalid_name_deletes_nothing() {
        let (_temp, disk, catalog) = setup();
        write(&disk, "a.sql", "dump", 0);

        let err = catalog
            .bulk_delete(&["a.sql".to_string(), "../etc/passwd.sql".to_string()])
            .unwrap_err();
        assert_eq!(err.code(), BackupErrorCode::InvalidName);
        assert!(disk.exists("backups/a.sql"));
    }

    #[test]
    fn test_open() {
        let (_temp, disk, catalog) = setup();
        write(&disk, "a.sql", "SELECT 1;", 0);

        let opened = catalog.open("a.sql").unwrap();
        assert_eq!(opened.file.size_bytes, 9);
        assert_eq!(std::fs::read_to_string(&opened.path).unwrap(), "SELECT 1;");

        assert_eq!(catalog.open("b.sql").unwrap_err().code(), BackupErrorCode::NotFound);
        assert_eq!(catalog.open("a.sql.gz").unwrap_err().code(), BackupErrorCode::InvalidName);
    }

    #[test]
    fn test_status() {
        let (_temp, disk, catalog) = setup();
        write(&disk, "a.sql", "1234", 120);
        write(&disk, "b.sql", "123456", 10);

        let status = catalog.status().unwrap();
        assert_eq!(status.dump_count, 2);
        assert_eq!(status.total_size_bytes, 10);
        assert_eq!(status.latest.unwrap().name, "b.sql");
    }
}
