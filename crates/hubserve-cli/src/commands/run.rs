//! `hubserve run` command implementation

use crate::CliError;
use hubserve_core::{Job, RequestHandler};
use std::path::Path;

/// Handle the job document in `input` and print its envelope
pub async fn run(handler: &RequestHandler, input: &Path) -> Result<(), CliError> {
    let content = std::fs::read_to_string(input).map_err(|e| {
        CliError::Other(format!("Failed to read job file {}: {}", input.display(), e))
    })?;
    let document: serde_json::Value = serde_json::from_str(&content)?;

    let job = Job::from_document(document);
    let envelope = handler.handle(&job).await;

    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(())
}
