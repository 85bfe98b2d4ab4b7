//! CLI command implementations
//!
//! Every command except `serve` prints one pretty-printed JSON document on
//! stdout. Errors go to stderr via [`CliError::report`].

use std::io::{self, Write};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tracing::info;

use crate::backup::scheduler::NewSchedule;
use crate::backup::service::{BackupService, DueDump};
use crate::config::AppConfig;
use crate::http_server::HttpServer;

use super::args::{Cli, Command, ScheduleAction};
use super::errors::{CliError, CliResult};

/// Main CLI entry point
///
/// Parses arguments, loads configuration and dispatches the command.
pub async fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    let config = AppConfig::load_or_default(cli.config.as_deref())?;
    run_command(cli.command, &config).await
}

/// Run `command` against a service built from `config`.
pub async fn run_command(command: Command, config: &AppConfig) -> CliResult<()> {
    let service = BackupService::from_config(config)?;

    if let Command::Serve { port } = command {
        let mut addr = config.server.addr();
        if let Some(port) = port {
            addr.set_port(port);
        }
        return serve(Arc::new(service), addr).await;
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    execute(&service, command, &mut out).await
}

/// Execute a non-server command and write its JSON result to `out`.
pub async fn execute(service: &BackupService, command: Command, out: &mut dyn Write) -> CliResult<()> {
    match command {
        Command::Dump { if_due: false } => write_json(out, &service.run_dump().await?),
        Command::Dump { if_due: true } => match service.run_dump_if_due(Utc::now()).await? {
            DueDump::NotDue => write_json(out, &json!({ "status": "not_due" })),
            DueDump::Completed { file, due } => write_json(
                out,
                &json!({ "status": "completed", "file": file, "due_schedules": due }),
            ),
        },
        Command::Restore { file, yes } => {
            if !yes {
                return Err(CliError::ConfirmationRequired);
            }
            write_json(out, &service.run_restore(&file).await?)
        }
        Command::List => write_json(out, &service.list_dump_files()?),
        Command::Status => write_json(out, &service.status()?),
        Command::Delete { file } => {
            service.delete_dump_file(&file)?;
            write_json(out, &json!({ "deleted": file }))
        }
        Command::BulkDelete { files } => write_json(out, &service.bulk_delete_dump_files(&files)?),
        Command::Schedule { action } => schedule(service, action, out),
        Command::Serve { .. } => Err(CliError::Server(io::Error::new(
            io::ErrorKind::Unsupported,
            "serve is started by run_command",
        ))),
    }
}

fn schedule(service: &BackupService, action: ScheduleAction, out: &mut dyn Write) -> CliResult<()> {
    match action {
        ScheduleAction::Create {
            schedule_type,
            frequency_days,
        } => {
            let request = NewSchedule {
                schedule_type,
                frequency_days,
            };
            write_json(out, &service.create_schedule(&request)?)
        }
        ScheduleAction::List => write_json(out, &service.list_schedules()?),
        ScheduleAction::Delete { id } => {
            service.delete_schedule(id)?;
            write_json(out, &json!({ "deleted": id }))
        }
        ScheduleAction::BulkDelete { ids } => write_json(out, &service.bulk_delete_schedules(&ids)?),
    }
}

async fn serve(service: Arc<BackupService>, addr: std::net::SocketAddr) -> CliResult<()> {
    info!(%addr, "starting HTTP server");
    HttpServer::new(service, addr)
        .start()
        .await
        .map_err(CliError::Server)
}

fn write_json<T: Serialize + ?Sized>(out: &mut dyn Write, value: &T) -> CliResult<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}
