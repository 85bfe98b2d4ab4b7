//! Backup service facade.
//!
//! The single entry point used by the CLI and the HTTP layer. It owns one
//! instance of each engine over a shared disk, connection source and process
//! runner, and exposes the operator-facing operations.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::backup::catalog::{BulkDeleteReport, DumpCatalog, OpenDump};
use crate::backup::engine::BackupEngine;
use crate::backup::errors::BackupResult;
use crate::backup::restore::{RestoreEngine, RestoreOutcome};
use crate::backup::scheduler::{BulkScheduleDeleteReport, NewSchedule, ScheduleRecord, ScheduleStore};
use crate::backup::{CatalogStatus, DumpFile, DumpSettings};
use crate::config::AppConfig;
use crate::connection::{EnvSettings, LayeredSettings, ProfileSource, SettingsProfileSource};
use crate::file_storage::{Disk, LocalDisk};
use crate::process::{ProcessRunner, TokioProcessRunner};

/// Outcome of a conditional dump.
#[derive(Debug, Clone)]
pub enum DueDump {
    /// No scheduled record is due.
    NotDue,
    Completed {
        file: DumpFile,
        /// Schedules that made the dump due
        due: Vec<ScheduleRecord>,
    },
}

pub struct BackupService {
    engine: BackupEngine,
    restore: RestoreEngine,
    catalog: DumpCatalog,
    schedules: ScheduleStore,
}

impl BackupService {
    pub fn new(
        profiles: Arc<dyn ProfileSource>,
        runner: Arc<dyn ProcessRunner>,
        disk: Arc<dyn Disk>,
        directory: &str,
        settings: DumpSettings,
        schedules: ScheduleStore,
    ) -> Self {
        Self {
            engine: BackupEngine::new(
                profiles.clone(),
                runner.clone(),
                disk.clone(),
                directory,
                settings.clone(),
            ),
            restore: RestoreEngine::new(profiles, runner, disk.clone(), directory, settings),
            catalog: DumpCatalog::new(disk, directory),
            schedules,
        }
    }

    /// Production wiring: local disk, `DB_*` environment over the config
    /// file's connection table, and real client processes.
    pub fn from_config(config: &AppConfig) -> BackupResult<Self> {
        let settings = LayeredSettings::new(EnvSettings::load(), config.connection.clone());
        let disk = LocalDisk::new(&config.storage.root, &config.storage.public_url);
        let schedules = ScheduleStore::open(&config.schedules.path)?;

        info!(
            root = %config.storage.root.display(),
            directory = %config.storage.directory,
            "backup service configured"
        );

        Ok(Self::new(
            Arc::new(SettingsProfileSource::new(settings)),
            Arc::new(TokioProcessRunner::new()),
            Arc::new(disk),
            &config.storage.directory,
            config.dump.clone(),
            schedules,
        ))
    }

    pub async fn run_dump(&self) -> BackupResult<DumpFile> {
        self.engine.run_dump().await
    }

    /// Dump only when a scheduled record is due at `now`.
    pub async fn run_dump_if_due(&self, now: DateTime<Utc>) -> BackupResult<DueDump> {
        let last_dump = self.catalog.status()?.latest.map(|f| f.modified_at);
        let due = self.schedules.due_schedules(last_dump, now)?;
        if due.is_empty() {
            info!(last_dump = ?last_dump, "no schedule is due");
            return Ok(DueDump::NotDue);
        }

        let file = self.engine.run_dump().await?;
        Ok(DueDump::Completed { file, due })
    }

    pub async fn run_restore(&self, name: &str) -> BackupResult<RestoreOutcome> {
        self.restore.run_restore(name).await
    }

    pub fn list_dump_files(&self) -> BackupResult<Vec<DumpFile>> {
        self.catalog.list()
    }

    pub fn delete_dump_file(&self, name: &str) -> BackupResult<()> {
        self.catalog.delete(name)
    }

    pub fn bulk_delete_dump_files(&self, names: &[String]) -> BackupResult<BulkDeleteReport> {
        self.catalog.bulk_delete(names)
    }

    pub fn open_dump_file(&self, name: &str) -> BackupResult<OpenDump> {
        self.catalog.open(name)
    }

    pub fn status(&self) -> BackupResult<CatalogStatus> {
        self.catalog.status()
    }

    pub fn create_schedule(&self, request: &NewSchedule) -> BackupResult<ScheduleRecord> {
        self.schedules.create(request)
    }

    pub fn list_schedules(&self) -> BackupResult<Vec<ScheduleRecord>> {
        self.schedules.list()
    }

    pub fn delete_schedule(&self, id: Uuid) -> BackupResult<()> {
        self.schedules.delete(id)
    }

    pub fn bulk_delete_schedules(&self, ids: &[Uuid]) -> BackupResult<BulkScheduleDeleteReport> {
        self.schedules.bulk_delete(ids)
    }
}
