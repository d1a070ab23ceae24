//! twitloc - client for the Twitter localization backend.

use clap::Parser;
use std::process::ExitCode;
use twitloc::cli::{self, Cli};
use twitloc::logging;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = logging::init(&cli.log_level) {
        eprintln!("error: {}", err);
        return ExitCode::FAILURE;
    }

    match cli::run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::debug!(error = ?err, "command failed");
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}
