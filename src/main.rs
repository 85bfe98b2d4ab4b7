use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    dumpvault::observability::init_tracing();

    match dumpvault::cli::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.report());
            ExitCode::from(e.exit_code())
        }
    }
}
