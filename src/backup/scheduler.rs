//! Backup schedules for dumpvault.
//!
//! Records the desired backup cadence. The store does not run backups
//! itself; an external trigger asks [`ScheduleStore::due_schedules`] whether
//! a dump is due and invokes the engine.
//!
//! Records live in a single JSON file, rewritten through a temporary file
//! and rename on every change.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::backup::errors::{BackupError, BackupResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleType {
    /// One-off intent; never due on its own
    Quick,
    /// Recurring every `frequency_days`
    Scheduled,
}

impl std::str::FromStr for ScheduleType {
    type Err = BackupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "quick" => Ok(ScheduleType::Quick),
            "scheduled" => Ok(ScheduleType::Scheduled),
            other => Err(BackupError::invalid_schedule(format!(
                "Unknown schedule type '{}', expected 'quick' or 'scheduled'",
                other
            ))),
        }
    }
}

/// A persisted schedule. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRecord {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub schedule_type: ScheduleType,
    pub frequency_days: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl ScheduleRecord {
    /// Next time a dump is due after `last_dump`.
    ///
    /// Quick records have no cadence and return `None`.
    pub fn next_due(&self, last_dump: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
        let days = match (self.schedule_type, self.frequency_days) {
            (ScheduleType::Scheduled, Some(days)) => days,
            _ => return None,
        };
        match last_dump {
            None => Some(self.created_at),
            Some(last) => Some(last + Duration::days(i64::from(days))),
        }
    }

    pub fn is_due(&self, last_dump: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        self.next_due(last_dump).map_or(false, |due| now >= due)
    }
}

/// Request to create a schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSchedule {
    #[serde(rename = "type")]
    pub schedule_type: ScheduleType,
    #[serde(default)]
    pub frequency_days: Option<u32>,
}

impl NewSchedule {
    pub fn quick() -> Self {
        Self {
            schedule_type: ScheduleType::Quick,
            frequency_days: None,
        }
    }

    pub fn every(days: u32) -> Self {
        Self {
            schedule_type: ScheduleType::Scheduled,
            frequency_days: Some(days),
        }
    }

    /// Check the request and return the frequency to store.
    pub fn validate(&self) -> BackupResult<Option<u32>> {
        match self.schedule_type {
            ScheduleType::Quick => Ok(None),
            ScheduleType::Scheduled => match self.frequency_days {
                Some(days) if days >= 1 => Ok(Some(days)),
                Some(days) => Err(BackupError::invalid_schedule(format!(
                    "frequency_days must be at least 1, got {}",
                    days
                ))),
                None => Err(BackupError::invalid_schedule(
                    "frequency_days is required for scheduled backups",
                )),
            },
        }
    }
}

/// Result of a bulk schedule delete
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkScheduleDeleteReport {
    pub deleted_count: u32,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ScheduleFile {
    schedules: Vec<ScheduleRecord>,
}

/// JSON-file backed schedule store.
pub struct ScheduleStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ScheduleStore {
    /// Open the store at `path`. The file is created on first write.
    pub fn open(path: impl Into<PathBuf>) -> BackupResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                BackupError::io_error(e, "Failed to create schedule store directory").with_path(parent)
            })?;
        }
        let store = Self {
            path,
            lock: Mutex::new(()),
        };
        // Surface a corrupt file at startup rather than on first use.
        store.load()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn create(&self, request: &NewSchedule) -> BackupResult<ScheduleRecord> {
        self.create_at(request, Utc::now())
    }

    pub(crate) fn create_at(
        &self,
        request: &NewSchedule,
        now: DateTime<Utc>,
    ) -> BackupResult<ScheduleRecord> {
        let frequency_days = request.validate()?;
        let record = ScheduleRecord {
            id: Uuid::new_v4(),
            schedule_type: request.schedule_type,
            frequency_days,
            created_at: now,
        };

        let _guard = self.guard();
        let mut file = self.load()?;
        file.schedules.push(record.clone());
        self.save(&file)?;

        info!(id = %record.id, schedule_type = ?record.schedule_type, frequency_days = ?record.frequency_days, "schedule created");
        Ok(record)
    }

    /// All schedules, most recent first.
    pub fn list(&self) -> BackupResult<Vec<ScheduleRecord>> {
        let _guard = self.guard();
        let mut records = self.load()?.schedules;
        // Later insertions win ties on created_at.
        records.reverse();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    pub fn delete(&self, id: Uuid) -> BackupResult<()> {
        let _guard = self.guard();
        let mut file = self.load()?;
        let before = file.schedules.len();
        file.schedules.retain(|r| r.id != id);
        if file.schedules.len() == before {
            return Err(BackupError::schedule_not_found(id));
        }
        self.save(&file)?;
        info!(id = %id, "schedule deleted");
        Ok(())
    }

    /// Delete every schedule whose id is in `ids`. Unknown ids are ignored.
    pub fn bulk_delete(&self, ids: &[Uuid]) -> BackupResult<BulkScheduleDeleteReport> {
        let _guard = self.guard();
        let mut file = self.load()?;
        let before = file.schedules.len();
        file.schedules.retain(|r| !ids.contains(&r.id));
        let deleted_count = (before - file.schedules.len()) as u32;
        if deleted_count > 0 {
            self.save(&file)?;
        }
        info!(deleted = deleted_count, requested = ids.len(), "bulk delete of schedules");
        Ok(BulkScheduleDeleteReport { deleted_count })
    }

    /// Scheduled records due at `now` given the most recent dump time.
    pub fn due_schedules(
        &self,
        last_dump: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> BackupResult<Vec<ScheduleRecord>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|r| r.is_due(last_dump, now))
            .collect())
    }

    fn guard(&self) -> std::sync::MutexGuard<'_, ()> {
        // The guarded data is (), so a poisoned lock carries no broken state.
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn load(&self) -> BackupResult<ScheduleFile> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(ScheduleFile::default()),
            Err(e) => {
                return Err(BackupError::io_error(e, "Failed to read schedule store").with_path(&self.path))
            }
        };
        if contents.trim().is_empty() {
            return Ok(ScheduleFile::default());
        }
        serde_json::from_str(&contents).map_err(|e| {
            BackupError::invalid_config(format!("Schedule store is not valid JSON: {}", e))
                .with_path(&self.path)
        })
    }

    fn save(&self, file: &ScheduleFile) -> BackupResult<()> {
        let json = serde_json::to_string_pretty(file).map_err(|e| {
            BackupError::io_error(io::Error::new(io::ErrorKind::InvalidData, e), "Failed to encode schedules")
        })?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)
            .and_then(|_| fs::rename(&tmp, &self.path))
            .map_err(|e| BackupError::io_error(e, "Failed to write schedule store").with_path(&self.path))
    }
}
