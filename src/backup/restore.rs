//! Restore Engine for dumpvault.
//!
//! Replays a dump file against the active connection in three phases that
//! must all succeed on the same transport:
//!
//! - disable foreign key checks
//! - import the dump, streamed on standard input
//! - re-enable foreign key checks
//!
//! A failing phase abandons the transport and the next candidate starts over
//! from the first phase. The phases are separate client sessions, so a failure
//! after the first phase can leave checks disabled on the server. This is
//! best-effort sequencing, not a transaction.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::backup::attempt::{AttemptError, AttemptRecord};
use crate::backup::classifier::{FallbackClassifier, Platform};
use crate::backup::command::{ClientCommands, Transport};
use crate::backup::errors::{BackupError, BackupResult};
use crate::backup::{filename, hosts, relative_path, DumpSettings};
use crate::connection::ProfileSource;
use crate::file_storage::Disk;
use crate::process::ProcessRunner;

/// Restore phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestorePhase {
    DisableChecks,
    Import,
    EnableChecks,
}

impl RestorePhase {
    pub const ALL: [RestorePhase; 3] = [
        RestorePhase::DisableChecks,
        RestorePhase::Import,
        RestorePhase::EnableChecks,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RestorePhase::DisableChecks => "disable-checks",
            RestorePhase::Import => "import",
            RestorePhase::EnableChecks => "enable-checks",
        }
    }
}

impl fmt::Display for RestorePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Successful restore
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestoreOutcome {
    pub file: String,
    pub size_bytes: u64,
    /// Transport that completed all three phases
    pub transport: String,
    /// Foreign key checks were re-enabled on that transport
    pub checks_restored: bool,
    /// Transports abandoned before the successful one
    pub failed_attempts: usize,
}

pub struct RestoreEngine {
    profiles: Arc<dyn ProfileSource>,
    runner: Arc<dyn ProcessRunner>,
    disk: Arc<dyn Disk>,
    directory: String,
    settings: DumpSettings,
    classifier: FallbackClassifier,
}

impl RestoreEngine {
    pub fn new(
        profiles: Arc<dyn ProfileSource>,
        runner: Arc<dyn ProcessRunner>,
        disk: Arc<dyn Disk>,
        directory: impl Into<String>,
        settings: DumpSettings,
    ) -> Self {
        let classifier = FallbackClassifier::new(
            settings.pipe_fallback,
            Platform::current(),
            &settings.failure_signatures,
        );
        Self {
            profiles,
            runner,
            disk,
            directory: directory.into(),
            settings,
            classifier,
        }
    }

    /// Replace the fallback classifier.
    pub fn with_classifier(mut self, classifier: FallbackClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Restore the database from the dump file `name`.
    pub async fn run_restore(&self, name: &str) -> BackupResult<RestoreOutcome> {
        let name = filename::validate(name)?;
        let source = relative_path(&self.directory, name);

        if !self.disk.exists(&source) {
            return Err(BackupError::not_found(name));
        }
        let size_bytes = self
            .disk
            .size(&source)
            .map_err(|e| BackupError::io_error(e, format!("Failed to stat dump file: {}", name)))?;
        if size_bytes == 0 {
            return Err(BackupError::empty_source(name));
        }

        let profile = self.profiles.resolve()?;
        let commands = ClientCommands::new(&self.settings, &profile, self.disk.path(&self.directory));
        let input = self.disk.path(&source);
        let mut attempts = Vec::new();

        info!(file = %name, size_bytes, database = %profile.database, "starting restore");

        let outcome = |transport: &Transport, failed_attempts: usize| {
            info!(file = %name, transport = %transport, "restore complete, foreign key checks restored");
            RestoreOutcome {
                file: name.to_string(),
                size_bytes,
                transport: transport.to_string(),
                checks_restored: true,
                failed_attempts,
            }
        };

        for host in hosts::build_candidates(&profile.host) {
            let transport = Transport::tcp(host, profile.port);
            match self.attempt(&commands, &transport, &input).await {
                Ok(()) => return Ok(outcome(&transport, attempts.len())),
                Err(record) => attempts.push(record),
            }
        }

        if self.classifier.should_fall_back(&attempts) {
            let transport = Transport::pipe(&self.settings.pipe_name);
            info!(transport = %transport, "TCP transports unavailable, trying named pipe");
            match self.attempt(&commands, &transport, &input).await {
                Ok(()) => return Ok(outcome(&transport, attempts.len())),
                Err(record) => attempts.push(record),
            }
        }

        warn!(file = %name, attempts = attempts.len(), "restore failed on every transport");
        Err(BackupError::restore_failed(attempts))
    }

    /// Run all three phases against `transport`, stopping at the first failure.
    async fn attempt(
        &self,
        commands: &ClientCommands<'_>,
        transport: &Transport,
        input: &Path,
    ) -> Result<(), AttemptRecord> {
        for phase in RestorePhase::ALL {
            let spec = match phase {
                RestorePhase::DisableChecks => commands.foreign_key_checks(transport, false),
                RestorePhase::Import => commands.import(transport, input),
                RestorePhase::EnableChecks => commands.foreign_key_checks(transport, true),
            };
            let label = format!("{} ({})", transport, phase);
            debug!(transport = %transport, phase = %phase, "running restore phase");

            let result = match self.runner.run(&spec).await {
                Ok(output) => match output.check() {
                    Ok(()) => Ok(()),
                    Err(e) => Err(AttemptRecord::new(&label, spec.argv(), Some(&output), &AttemptError::from(e))),
                },
                Err(e) => Err(AttemptRecord::new(&label, spec.argv(), None, &AttemptError::from(e))),
            };

            if let Err(record) = result {
                warn!(transport = %transport, phase = %phase, reason = %record.reason, "restore attempt failed");
                if phase != RestorePhase::DisableChecks {
                    warn!(transport = %transport, "foreign key checks may remain disabled on the server");
                }
                return Err(record);
            }
        }
        Ok(())
    }
}
