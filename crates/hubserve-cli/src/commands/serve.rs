//! `hubserve serve` command implementation
//!
//! A minimal host runtime: job documents arrive one per stdin line, responses
//! leave one per stdout line as `{"id": .., "output": <envelope>}`. Lines are
//! handled concurrently up to `concurrency`, so responses may come back out of
//! order; the id, echoed exactly as received, ties them together.

use crate::CliError;
use hubserve_core::{Job, RequestHandler, ResponseEnvelope};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;

/// Serve jobs from stdin until EOF
pub async fn run(
    handler: RequestHandler,
    concurrency: usize,
    timeout: Option<Duration>,
) -> Result<(), CliError> {
    let concurrency = concurrency.max(1);
    let handler = Arc::new(handler);
    let limit = Arc::new(Semaphore::new(concurrency));
    let (tx, mut rx) = mpsc::channel::<String>(concurrency * 2);

    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(line) = rx.recv().await {
            stdout.write_all(line.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }
        Ok::<_, std::io::Error>(())
    });

    tracing::info!(concurrency, timeout_secs = timeout.map(|t| t.as_secs()), "serving jobs from stdin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut jobs = JoinSet::new();
    let mut received = 0u64;

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        received += 1;

        let permit = Arc::clone(&limit)
            .acquire_owned()
            .await
            .map_err(|e| CliError::Other(format!("job limiter closed: {e}")))?;
        let handler = Arc::clone(&handler);
        let tx = tx.clone();

        jobs.spawn(async move {
            let _permit = permit;
            let response = process_line(&handler, &line, timeout).await;
            // a closed channel means the writer stopped; its error surfaces below
            let _ = tx.send(response.to_string()).await;
        });

        while let Some(done) = jobs.try_join_next() {
            log_join_error(done);
        }
    }

    drop(tx);
    while let Some(done) = jobs.join_next().await {
        log_join_error(done);
    }

    writer
        .await
        .map_err(|e| CliError::Other(format!("output writer failed: {e}")))??;

    tracing::info!(jobs = received, "stdin closed, shutting down");
    Ok(())
}

fn log_join_error(done: Result<(), tokio::task::JoinError>) {
    if let Err(e) = done {
        tracing::error!(error = %e, "job task aborted");
    }
}

/// Turn one input line into one response line.
///
/// Unparseable documents and expired time limits are reported as failure
/// envelopes in the worker's modality.
pub async fn process_line(handler: &RequestHandler, line: &str, timeout: Option<Duration>) -> Value {
    let document: Value = match serde_json::from_str(line) {
        Ok(document) => document,
        Err(e) => {
            tracing::warn!(error = %e, "unreadable job document");
            let envelope =
                ResponseEnvelope::failure(handler.modality(), format!("Invalid job document: {e}"));
            return json!({ "id": Value::Null, "output": envelope });
        }
    };

    let id = document.get("id").cloned().unwrap_or(Value::Null);
    let job = Job::from_document(document);

    let envelope = match timeout {
        Some(limit) => match tokio::time::timeout(limit, handler.handle(&job)).await {
            Ok(envelope) => envelope,
            Err(_) => {
                tracing::warn!(job_id = ?job.id, limit_ms = limit.as_millis() as u64, "job timed out");
                ResponseEnvelope::failure(handler.modality(), format!("Job timed out after {limit:?}"))
            }
        },
        None => handler.handle(&job).await,
    };

    json!({ "id": id, "output": envelope })
}
