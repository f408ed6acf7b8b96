//! Snapshot-backed placeholder engine
//!
//! Implements [`InferenceEngine`] on top of a resolved snapshot directory so
//! the worker runs end to end without a model runtime linked in. Text jobs
//! echo the prompt with a short backend note; image edits return the input
//! image unchanged. A real runtime replaces this type by implementing the
//! same trait.

use crate::artifact::ResolvedSnapshot;
use crate::engine::{
    EngineConcurrency, EngineError, EngineInput, EngineOutput, EngineResult, InferenceEngine,
};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Placeholder engine bound to one snapshot directory
#[derive(Debug)]
pub struct SnapshotEngine {
    model_id: String,
    snapshot: PathBuf,
    revision: String,
    file_count: usize,
}

impl SnapshotEngine {
    /// Load from a resolved snapshot.
    ///
    /// # Errors
    /// - `LoadFailed`: the snapshot directory vanished or cannot be listed
    pub fn load(snapshot: &ResolvedSnapshot) -> EngineResult<Self> {
        let path = snapshot.path();
        let file_count = std::fs::read_dir(path)
            .map_err(|e| {
                EngineError::LoadFailed(format!(
                    "snapshot directory unreadable: {}: {e}",
                    path.display()
                ))
            })?
            .filter_map(Result::ok)
            .count();

        tracing::info!(
            model = %snapshot.model_id(),
            revision = %snapshot.revision(),
            snapshot = %path.display(),
            files = file_count,
            "model loaded from local snapshot"
        );

        Ok(Self {
            model_id: snapshot.model_id().to_string(),
            snapshot: path.to_path_buf(),
            revision: snapshot.revision().to_string(),
            file_count,
        })
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn snapshot(&self) -> &Path {
        &self.snapshot
    }

    pub fn file_count(&self) -> usize {
        self.file_count
    }
}

#[async_trait]
impl InferenceEngine for SnapshotEngine {
    fn name(&self) -> &str {
        "SnapshotEngine"
    }

    fn concurrency(&self) -> EngineConcurrency {
        EngineConcurrency::Exclusive
    }

    async fn run(&self, input: EngineInput) -> EngineResult<EngineOutput> {
        match input {
            EngineInput::Text { request, .. } => {
                tracing::debug!(
                    model = %self.model_id,
                    max_tokens = request.max_tokens,
                    temperature = request.temperature,
                    "dispatching text generation"
                );
                Ok(EngineOutput::Text(format!(
                    "{} [snapshot backend] model={} revision={} max_tokens={}",
                    request.prompt, self.model_id, self.revision, request.max_tokens,
                )))
            }
            EngineInput::ImageEdit { image, params, .. } => {
                tracing::debug!(
                    model = %self.model_id,
                    width = image.width(),
                    height = image.height(),
                    steps = params.num_inference_steps,
                    "dispatching image edit"
                );
                Ok(EngineOutput::Image(image))
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
