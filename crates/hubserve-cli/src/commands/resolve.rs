//! `hubserve resolve` command implementation

use crate::CliError;
use crate::worker;
use hubserve_core::WorkerConfig;

/// Print the resolved snapshot directory on stdout
pub fn run(config: &WorkerConfig) -> Result<(), CliError> {
    let snapshot = worker::resolve(config)?;
    tracing::info!(source = %snapshot.source(), revision = %snapshot.revision(), "snapshot resolved");
    println!("{}", snapshot.path().display());
    Ok(())
}
