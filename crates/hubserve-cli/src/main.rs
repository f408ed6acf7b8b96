//! hubserve - local host runtime for the offline inference worker

mod cli;
mod commands;
mod error;
mod worker;

pub use error::CliError;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.log_json);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_command_async(cli))
}

/// Logs go to stderr; stdout carries only command output
fn init_logging(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run_command_async(cli: Cli) -> anyhow::Result<()> {
    let config = worker::load_config(&cli)?;

    match cli.command {
        Commands::Resolve => {
            commands::resolve::run(&config)?;
        }

        Commands::Run { input } => {
            let handler = worker::start(&config)?;
            commands::run::run(&handler, &input).await?;
        }

        Commands::Serve {
            concurrency,
            timeout_secs,
        } => {
            let handler = worker::start(&config)?;
            let timeout = timeout_secs.map(std::time::Duration::from_secs);
            commands::serve::run(handler, concurrency, timeout).await?;
        }
    }

    Ok(())
}
