//! Tidemark CLI entry point
//!
//! Parses arguments, initializes logging, and dispatches to a command handler.
//! Command errors are printed to stderr and mapped to exit codes via
//! [`CliError::exit_code`](error::CliError::exit_code).

mod cli;
mod commands;
mod error;
mod logging;
mod output;

use clap::Parser;

use tidemark_core::config::GeneralConfig;

use crate::cli::{Cli, Commands};
use crate::error::CliError;
use crate::output::OutputWriter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let logging = GeneralConfig {
        log_level: cli.log_level.clone().unwrap_or_else(|| "warn".to_owned()),
        log_format: "pretty".to_owned(),
    };
    logging::init_tracing(&logging)?;

    if let Err(e) = run(cli).await {
        eprintln!("error: {e}");
        std::process::exit(e.exit_code());
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let writer = OutputWriter::new(cli.output);
    match cli.command {
        Commands::Cookie(args) => commands::cookie::execute(args, &cli.config, &writer).await,
        Commands::Hash(args) => commands::hash::execute(args, &writer),
        Commands::Errors(args) => commands::errors::execute(args, &writer),
        Commands::Config(args) => commands::config::execute(args, &cli.config, &writer).await,
    }
}
