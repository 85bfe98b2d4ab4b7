//! Application configuration
//!
//! Loaded from a TOML file. Every field has a default, so an empty file (or
//! no file at all) yields a working configuration that reads the connection
//! from the `DB_*` environment.
//!
//! ```toml
//! [storage]
//! root = "storage/app"
//! directory = "backups"
//! public_url = "/storage"
//!
//! [connection]
//! DB_HOST = "db.local"
//! DB_DATABASE = "panel"
//!
//! [dump]
//! pipe_fallback = "auto"
//!
//! [schedules]
//! path = "storage/app/schedules.json"
//!
//! [server]
//! bind = "127.0.0.1"
//! port = 8088
//! ```

use std::collections::HashMap;
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::backup::errors::{BackupError, BackupResult};
use crate::backup::{DumpSettings, DEFAULT_DUMP_DIRECTORY};
use crate::config_validator::{format_validation_errors, ConfigValidator};

const MAX_TIMEOUT_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub storage: StorageConfig,
    /// `DB_*` connection settings; the process environment takes precedence.
    pub connection: HashMap<String, String>,
    pub dump: DumpSettings,
    pub schedules: SchedulesConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root of the storage disk
    pub root: PathBuf,
    /// Dump directory relative to `root`
    pub directory: String,
    /// Public URL prefix of `root`
    pub public_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("storage/app"),
            directory: DEFAULT_DUMP_DIRECTORY.to_string(),
            public_url: "/storage".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulesConfig {
    pub path: PathBuf,
}

impl Default for SchedulesConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("storage/app/schedules.json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: IpAddr,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::from([127, 0, 0, 1]),
            port: 8088,
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

impl AppConfig {
    /// Load and validate configuration from `path`.
    pub fn load(path: &Path) -> BackupResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            BackupError::invalid_config(format!("Failed to read config: {}", e)).with_path(path)
        })?;
        let config = Self::from_toml(&content).map_err(|e| e.with_path(path))?;
        Ok(config)
    }

    /// Load `path` if given, otherwise use defaults. Validated either way.
    pub fn load_or_default(path: Option<&Path>) -> BackupResult<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    pub fn from_toml(content: &str) -> BackupResult<Self> {
        let config: AppConfig = toml::from_str(content)
            .map_err(|e| BackupError::invalid_config(format!("Invalid config TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Collect every violation and fail with all of them.
    pub fn validate(&self) -> BackupResult<()> {
        let mut v = ConfigValidator::new();
        v.validate_is_directory("storage.root", &self.storage.root)
            .validate_writable("storage.root", &self.storage.root)
            .validate_relative_dir("storage.directory", &self.storage.directory)
            .validate_public_url("storage.public_url", &self.storage.public_url)
            .validate_non_empty("dump.dump_binary", &self.dump.dump_binary)
            .validate_non_empty("dump.client_binary", &self.dump.client_binary)
            .validate_non_empty("dump.pipe_name", &self.dump.pipe_name)
            .validate_timeout_secs("dump.dump_timeout_secs", self.dump.dump_timeout_secs, MAX_TIMEOUT_SECS)
            .validate_timeout_secs("dump.import_timeout_secs", self.dump.import_timeout_secs, MAX_TIMEOUT_SECS)
            .validate_timeout_secs("dump.admin_timeout_secs", self.dump.admin_timeout_secs, MAX_TIMEOUT_SECS)
            .validate_non_empty("schedules.path", &self.schedules.path.to_string_lossy())
            .validate_port("server.port", self.server.port);

        v.finish().map_err(|errors| {
            BackupError::invalid_config(format!(
                "Configuration has {} error(s):\n{}",
                errors.len(),
                format_validation_errors(&errors)
            ))
        })
    }
}
