mod cli;
mod commands;
mod logging;

use clap::Parser;
use cli::{Cli, Command};
use std::process::ExitCode;
use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init();

    let result = match cli.command {
        Command::Engine(args) => commands::engine::execute(args).await,
        Command::Supervise(args) => commands::supervise::execute(args).await,
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "exiting");
            eprintln!("faas: {e}");
            ExitCode::FAILURE
        }
    }
}
