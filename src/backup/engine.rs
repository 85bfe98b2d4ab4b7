//! Backup Engine for dumpvault.
//!
//! Produces one verified dump file per run.
//!
//! # Algorithm
//! 1. Resolve the connection profile (fail fast, nothing spawned)
//! 2. Derive the destination name from the current time
//! 3. Build the host candidates
//! 4. Per candidate: run the dump into a staging file, verify it exists and
//!    is non-empty, then rename it onto the destination; the first verified
//!    file wins
//! 5. If every TCP candidate failed and the classifier allows it, make one
//!    attempt over the named pipe with the same verification
//! 6. Otherwise fail with the transcript of every attempt
//!
//! The destination name only ever holds a verified dump. A failed attempt
//! removes its staging file and leaves an existing dump of the same name
//! untouched.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::backup::attempt::{AttemptError, AttemptRecord};
use crate::backup::classifier::{FallbackClassifier, Platform};
use crate::backup::command::{ClientCommands, Transport};
use crate::backup::errors::{BackupError, BackupResult};
use crate::backup::{filename, hosts, relative_path, DumpFile, DumpSettings};
use crate::connection::ProfileSource;
use crate::file_storage::Disk;
use crate::process::{ProcessOutput, ProcessRunner};

pub struct BackupEngine {
    profiles: Arc<dyn ProfileSource>,
    runner: Arc<dyn ProcessRunner>,
    disk: Arc<dyn Disk>,
    directory: String,
    settings: DumpSettings,
    classifier: FallbackClassifier,
}

impl BackupEngine {
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

    /// Dump the database to a timestamp-named file.
    pub async fn run_dump(&self) -> BackupResult<DumpFile> {
        self.run_dump_as(&filename::dump_file_name(Utc::now())).await
    }

    /// Dump the database to `name` inside the dump directory.
    pub async fn run_dump_as(&self, name: &str) -> BackupResult<DumpFile> {
        let name = filename::validate(name)?;
        let profile = self.profiles.resolve()?;

        self.disk.make_directory(&self.directory).map_err(|e| {
            BackupError::io_error(e, format!("Failed to create dump directory: {}", self.directory))
        })?;
        let workdir = self.disk.path(&self.directory);
        if !workdir.is_dir() {
            return Err(BackupError::dir_not_accessible(workdir));
        }

        let commands = ClientCommands::new(&self.settings, &profile, workdir);
        let target = Target {
            name,
            destination: relative_path(&self.directory, name),
            staging: relative_path(&self.directory, &filename::staging_name(name)),
        };
        self.discard_empty_leftover(&target.destination)
            .map_err(|e| BackupError::io_error(e, format!("Failed to remove empty dump: {}", name)))?;
        let mut attempts = Vec::new();

        info!(file = %name, database = %profile.database, "starting dump");

        for host in hosts::build_candidates(&profile.host) {
            let transport = Transport::tcp(host, profile.port);
            match self.attempt(&commands, &transport, &target).await {
                Ok(file) => return Ok(file),
                Err(record) => attempts.push(record),
            }
        }

        if self.classifier.should_fall_back(&attempts) {
            let transport = Transport::pipe(&self.settings.pipe_name);
            info!(transport = %transport, "TCP transports unavailable, trying named pipe");
            match self.attempt(&commands, &transport, &target).await {
                Ok(file) => return Ok(file),
                Err(record) => attempts.push(record),
            }
        }

        warn!(file = %name, attempts = attempts.len(), "dump failed on every transport");
        Err(BackupError::all_attempts_failed(attempts))
    }

    async fn attempt(
        &self,
        commands: &ClientCommands<'_>,
        transport: &Transport,
        target: &Target<'_>,
    ) -> Result<DumpFile, AttemptRecord> {
        let label = transport.to_string();
        let spec = commands.dump(transport, &self.disk.path(&target.staging));
        let fail = |output: Option<&ProcessOutput>, error: AttemptError| {
            warn!(transport = %label, error = %error, "dump attempt failed");
            self.discard_staging(&target.staging);
            AttemptRecord::new(label.clone(), spec.argv(), output, &error)
        };

        if self.disk.exists(&target.staging) {
            if let Err(e) = self.disk.delete(&target.staging) {
                return Err(fail(None, e.into()));
            }
        }

        debug!(transport = %label, "running dump");
        let output = match self.runner.run(&spec).await {
            Ok(output) => output,
            Err(e) => return Err(fail(None, e.into())),
        };

        if let Err(e) = output.check() {
            return Err(fail(Some(&output), e.into()));
        }

        if let Err(e) = self.verify(&target.staging) {
            return Err(fail(Some(&output), e));
        }

        if let Err(e) = self.disk.rename(&target.staging, &target.destination) {
            return Err(fail(Some(&output), e.into()));
        }

        let file = DumpFile::describe(self.disk.as_ref(), &self.directory, target.name)
            .map_err(|e| fail(Some(&output), AttemptError::Verification(e.to_string())))?;
        info!(transport = %label, file = %file.name, size_bytes = file.size_bytes, "dump complete");
        Ok(file)
    }

    /// Remove a zero-byte file left at `destination` by an earlier run.
    fn discard_empty_leftover(&self, destination: &str) -> std::io::Result<()> {
        if self.disk.exists(destination) && self.disk.size(destination)? == 0 {
            debug!(path = %destination, "removing zero-byte leftover");
            self.disk.delete(destination)?;
        }
        Ok(())
    }

    /// Drop whatever a failed attempt managed to write.
    fn discard_staging(&self, staging: &str) {
        if self.disk.exists(staging) {
            if let Err(e) = self.disk.delete(staging) {
                warn!(path = %staging, error = %e, "failed to remove partial dump");
            }
        }
    }

    fn verify(&self, staging: &str) -> Result<(), AttemptError> {
        if !self.disk.exists(staging) {
            return Err(AttemptError::Verification(format!(
                "dump file {} was not created",
                staging
            )));
        }
        if self.disk.size(staging)? == 0 {
            return Err(AttemptError::Verification(format!(
                "dump file {} is empty",
                staging
            )));
        }
        Ok(())
    }
}

/// Where one dump run writes.
struct Target<'a> {
    name: &'a str,
    destination: String,
    staging: String,
}
