//! # Connection Profiles
//!
//! Resolves the active database connection from a key-value settings
//! provider. Resolution happens per operation and fails before any client
//! process is spawned when the connection cannot be dumped.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::backup::errors::{BackupError, BackupResult};

pub const KEY_DRIVER: &str = "DB_CONNECTION";
pub const KEY_HOST: &str = "DB_HOST";
pub const KEY_PORT: &str = "DB_PORT";
pub const KEY_DATABASE: &str = "DB_DATABASE";
pub const KEY_USERNAME: &str = "DB_USERNAME";
pub const KEY_PASSWORD: &str = "DB_PASSWORD";

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 3306;
const DEFAULT_USERNAME: &str = "root";

/// Supported engine family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Driver {
    Mysql,
    Mariadb,
}

impl Driver {
    pub fn as_str(&self) -> &'static str {
        match self {
            Driver::Mysql => "mysql",
            Driver::Mariadb => "mariadb",
        }
    }
}

impl FromStr for Driver {
    type Err = BackupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mysql" => Ok(Driver::Mysql),
            "mariadb" => Ok(Driver::Mariadb),
            other => Err(BackupError::unsupported_driver(other)),
        }
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized snapshot of the active connection.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionProfile {
    pub driver: Driver,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
}

impl ConnectionProfile {
    /// Check the invariants a dumpable profile must hold.
    pub fn validate(&self) -> BackupResult<()> {
        let database = self.database.trim();
        if database.is_empty() {
            return Err(BackupError::missing_database());
        }
        // The name is passed as a positional argument to the client tools.
        if database.starts_with('-') {
            return Err(BackupError::invalid_config(format!(
                "Database name may not start with '-': {}",
                database
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for ConnectionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionProfile")
            .field("driver", &self.driver)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Source of the active connection profile.
pub trait ProfileSource: Send + Sync {
    fn resolve(&self) -> BackupResult<ConnectionProfile>;
}

/// A fixed profile resolves to itself once validated.
impl ProfileSource for ConnectionProfile {
    fn resolve(&self) -> BackupResult<ConnectionProfile> {
        self.validate()?;
        Ok(self.clone())
    }
}

/// Key-value configuration lookup.
pub trait SettingsProvider: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

impl SettingsProvider for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

/// Process environment, after loading `.env` if present.
#[derive(Debug, Clone, Default)]
pub struct EnvSettings;

impl EnvSettings {
    pub fn load() -> Self {
        dotenvy::dotenv().ok();
        Self
    }
}

impl SettingsProvider for EnvSettings {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Looks up `primary` first and falls back to `fallback`.
pub struct LayeredSettings<A, B> {
    primary: A,
    fallback: B,
}

impl<A: SettingsProvider, B: SettingsProvider> LayeredSettings<A, B> {
    pub fn new(primary: A, fallback: B) -> Self {
        Self { primary, fallback }
    }
}

impl<A: SettingsProvider, B: SettingsProvider> SettingsProvider for LayeredSettings<A, B> {
    fn get(&self, key: &str) -> Option<String> {
        self.primary.get(key).or_else(|| self.fallback.get(key))
    }
}

/// Resolves a [`ConnectionProfile`] from `DB_*` settings on every call.
pub struct SettingsProfileSource<P> {
    settings: P,
}

impl<P: SettingsProvider> SettingsProfileSource<P> {
    pub fn new(settings: P) -> Self {
        Self { settings }
    }

    fn value(&self, key: &str) -> Option<String> {
        self.settings
            .get(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

impl<P: SettingsProvider> ProfileSource for SettingsProfileSource<P> {
    fn resolve(&self) -> BackupResult<ConnectionProfile> {
        let driver = match self.value(KEY_DRIVER) {
            Some(driver) => driver.parse::<Driver>()?,
            None => Driver::Mysql,
        };

        let port = match self.value(KEY_PORT) {
            Some(port) => port.parse::<u16>().map_err(|_| {
                BackupError::invalid_config(format!("{} is not a valid port: {}", KEY_PORT, port))
            })?,
            None => DEFAULT_PORT,
        };

        let profile = ConnectionProfile {
            driver,
            host: self
                .value(KEY_HOST)
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            database: self.value(KEY_DATABASE).unwrap_or_default(),
            username: self
                .value(KEY_USERNAME)
                .unwrap_or_else(|| DEFAULT_USERNAME.to_string()),
            // Secrets may legitimately contain surrounding whitespace.
            password: self.settings.get(KEY_PASSWORD).unwrap_or_default(),
        };

        profile.validate()?;
        Ok(profile)
    }
}
