//! # File Storage
//!
//! One logical disk holding the dump directory. Paths handed to a [`Disk`]
//! are relative to its root and use `/` separators; callers are expected to
//! have validated any user-supplied segment before building one.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

/// Storage operations the dump engines and catalog rely on.
pub trait Disk: Send + Sync {
    /// Create a directory (and parents) if it does not exist.
    fn make_directory(&self, relative: &str) -> io::Result<()>;

    fn exists(&self, relative: &str) -> bool;

    /// Size in bytes.
    fn size(&self, relative: &str) -> io::Result<u64>;

    fn last_modified(&self, relative: &str) -> io::Result<DateTime<Utc>>;

    fn delete(&self, relative: &str) -> io::Result<()>;

    /// Move `from` to `to`, replacing any file already at `to`.
    fn rename(&self, from: &str, to: &str) -> io::Result<()>;

    /// Names of the regular files directly inside `relative`.
    fn files(&self, relative: &str) -> io::Result<Vec<String>>;

    /// Absolute on-disk path.
    fn path(&self, relative: &str) -> PathBuf;

    /// Public URL under which the file is served.
    fn url(&self, relative: &str) -> String;
}

/// Local filesystem disk rooted at a directory.
#[derive(Debug, Clone)]
pub struct LocalDisk {
    root: PathBuf,
    public_url: String,
}

impl LocalDisk {
    /// A relative `root` is anchored at the current directory, so paths
    /// handed to child processes with their own working directory stay valid.
    pub fn new(root: impl Into<PathBuf>, public_url: impl Into<String>) -> Self {
        let root = root.into();
        Self {
            root: std::path::absolute(&root).unwrap_or(root),
            public_url: public_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Disk for LocalDisk {
    fn make_directory(&self, relative: &str) -> io::Result<()> {
        fs::create_dir_all(self.path(relative))
    }

    fn exists(&self, relative: &str) -> bool {
        self.path(relative).exists()
    }

    fn size(&self, relative: &str) -> io::Result<u64> {
        Ok(fs::metadata(self.path(relative))?.len())
    }

    fn last_modified(&self, relative: &str) -> io::Result<DateTime<Utc>> {
        let modified = fs::metadata(self.path(relative))?.modified()?;
        Ok(DateTime::<Utc>::from(modified))
    }

    fn delete(&self, relative: &str) -> io::Result<()> {
        fs::remove_file(self.path(relative))
    }

    fn rename(&self, from: &str, to: &str) -> io::Result<()> {
        fs::rename(self.path(from), self.path(to))
    }

    fn files(&self, relative: &str) -> io::Result<Vec<String>> {
        let dir = self.path(relative);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        Ok(names)
    }

    fn path(&self, relative: &str) -> PathBuf {
        relative
            .split('/')
            .filter(|segment| !segment.is_empty())
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }

    fn url(&self, relative: &str) -> String {
        format!("{}/{}", self.public_url, relative.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_make_directory_and_files() {
        let temp = TempDir::new().unwrap();
        let disk = LocalDisk::new(temp.path(), "/storage");

        assert!(disk.files("backups").unwrap().is_empty());

        disk.make_directory("backups").unwrap();
        fs::write(disk.path("backups/a.sql"), b"SELECT 1;").unwrap();
        fs::create_dir(disk.path("backups/nested")).unwrap();

        assert_eq!(disk.files("backups").unwrap(), vec!["a.sql".to_string()]);
        assert!(disk.exists("backups/a.sql"));
        assert_eq!(disk.size("backups/a.sql").unwrap(), 9);
        assert!(disk.last_modified("backups/a.sql").is_ok());
    }

    #[test]
    fn test_delete() {
        let temp = TempDir::new().unwrap();
        let disk = LocalDisk::new(temp.path(), "/storage");
        disk.make_directory("backups").unwrap();
        fs::write(disk.path("backups/a.sql"), b"x").unwrap();

        disk.delete("backups/a.sql").unwrap();
        assert!(!disk.exists("backups/a.sql"));
        assert!(disk.delete("backups/a.sql").is_err());
    }

    #[test]
    fn test_rename_replaces_target() {
        let temp = TempDir::new().unwrap();
        let disk = LocalDisk::new(temp.path(), "/storage");
        disk.make_directory("backups").unwrap();
        fs::write(disk.path("backups/.a.sql.partial"), b"new").unwrap();
        fs::write(disk.path("backups/a.sql"), b"old").unwrap();

        disk.rename("backups/.a.sql.partial", "backups/a.sql").unwrap();
        assert!(!disk.exists("backups/.a.sql.partial"));
        assert_eq!(fs::read_to_string(disk.path("backups/a.sql")).unwrap(), "new");
    }

    #[test]
    fn test_relative_root_is_anchored() {
        let disk = LocalDisk::new("storage/app", "/storage");
        assert!(disk.root().is_absolute());
        assert_eq!(
            disk.path("backups/a.sql"),
            std::env::current_dir()
                .unwrap()
                .join("storage/app/backups/a.sql")
        );
    }

    #[test]
    fn test_path_and_url() {
        let disk = LocalDisk::new("/var/app/storage", "https://panel.example/storage/");
        assert_eq!(
            disk.path("backups/a.sql"),
            PathBuf::from("/var/app/storage/backups/a.sql")
        );
        assert_eq!(
            disk.url("backups/a.sql"),
            "https://panel.example/storage/backups/a.sql"
        );
    }
}
