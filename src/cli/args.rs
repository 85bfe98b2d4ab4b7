//! CLI argument definitions using clap
//!
//! Commands:
//! - dumpvault dump [--if-due]
//! - dumpvault restore <file> --yes
//! - dumpvault list | status
//! - dumpvault delete <file>
//! - dumpvault bulk-delete <file>...
//! - dumpvault schedule <create|list|delete|bulk-delete>
//! - dumpvault serve [--port <port>]

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

use crate::backup::scheduler::ScheduleType;

/// dumpvault - logical SQL backups of the panel database
#[derive(Parser, Debug)]
#[command(name = "dumpvault")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to TOML configuration file (defaults apply when omitted)
    #[arg(long, global = true, env = "DUMPVAULT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Dump the database to a new timestamped file
    Dump {
        /// Only dump when a recorded schedule is due
        #[arg(long)]
        if_due: bool,
    },

    /// Restore the database from a dump file
    ///
    /// Overwrites the current database contents.
    Restore {
        /// Dump file name inside the dump directory
        file: String,

        /// Confirm the restore
        #[arg(long)]
        yes: bool,
    },

    /// List dump files, newest first
    List,

    /// Show dump count, total size and latest dump
    Status,

    /// Delete one dump file
    Delete {
        file: String,
    },

    /// Delete several dump files
    BulkDelete {
        #[arg(required = true)]
        files: Vec<String>,
    },

    /// Manage backup schedules
    Schedule {
        #[command(subcommand)]
        action: ScheduleAction,
    },

    /// Start the HTTP server
    Serve {
        /// Port to bind to (overrides [server] port)
        #[arg(long)]
        port: Option<u16>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ScheduleAction {
    /// Record a schedule
    Create {
        /// quick | scheduled
        #[arg(long = "type")]
        schedule_type: ScheduleType,

        /// Days between dumps (required for scheduled)
        #[arg(long)]
        frequency_days: Option<u32>,
    },

    /// List schedules, most recent first
    List,

    /// Delete one schedule
    Delete {
        id: Uuid,
    },

    /// Delete several schedules
    BulkDelete {
        #[arg(required = true)]
        ids: Vec<Uuid>,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
