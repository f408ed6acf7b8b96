//! Worker startup shared by all commands
//!
//! Startup failures (bad config, unresolvable model, engine load) are returned
//! to `main` and abort the process; nothing here is retried.

use crate::CliError;
use crate::cli::Cli;
use hubserve_core::{
    EngineHandle, RequestHandler, ResolvedSnapshot, SnapshotEngine, WorkerConfig, resolve_snapshot,
};

/// Load configuration and apply command-line overrides
pub fn load_config(cli: &Cli) -> Result<WorkerConfig, CliError> {
    let mut config = WorkerConfig::load(cli.config.as_deref())?;

    if let Some(model_name) = &cli.model_name {
        config.model_name = model_name.clone();
    }
    if let Some(cache_root) = &cli.cache_root {
        config.hf_cache_root = cache_root.clone();
    }
    if let Some(modality) = cli.modality {
        config.worker_modality = modality;
    }
    config.validate()?;

    Ok(config)
}

/// Resolve the configured model snapshot
pub fn resolve(config: &WorkerConfig) -> Result<ResolvedSnapshot, CliError> {
    Ok(resolve_snapshot(&config.model_name, &config.hf_cache_root)?)
}

/// Resolve, load the engine once and build the shared job handler
pub fn start(config: &WorkerConfig) -> Result<RequestHandler, CliError> {
    let snapshot = resolve(config)?;
    tracing::info!(snapshot = %snapshot.path().display(), "resolved local model path");

    let engine = EngineHandle::new(SnapshotEngine::load(&snapshot)?);

    tracing::info!(
        engine = %engine.name(),
        modality = %config.worker_modality,
        serialized = engine.is_serialized(),
        "worker ready"
    );

    Ok(RequestHandler::new(config.worker_modality, engine)
        .with_preprocessor(config.preprocessor())
        .with_params(config.generation_params()))
}
