//! Inference engine boundary
//!
//! The engine is an external capability: it is loaded once at startup and
//! then invoked once per job. This module defines the trait an engine
//! implements and [`EngineHandle`], the shared handle the request handler
//! calls through:
//! - engines that declare [`EngineConcurrency::Exclusive`] are serialized
//!   behind an async mutex;
//! - a panic inside an engine is caught and reported as
//!   [`EngineError::Panicked`] instead of unwinding into the host.

use crate::request::TextRequest;
use async_trait::async_trait;
use futures::FutureExt;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised by an inference engine
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// Loading weights from the snapshot failed
    #[error("Model load failed: {0}")]
    LoadFailed(String),

    /// Out of memory or another exhausted resource
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// The engine returned something other than what the job asked for
    #[error("Malformed output: {0}")]
    MalformedOutput(String),

    /// The engine panicked during the call
    #[error("Engine panicked: {0}")]
    Panicked(String),

    /// Other errors
    #[error("Inference failed: {0}")]
    Failed(String),
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

// ============================================================================
// Inputs and outputs
// ============================================================================

/// Opaque generation parameters, forwarded to the engine without validation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub num_inference_steps: u32,
    pub guidance_scale: f32,
    pub image_guidance_scale: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            num_inference_steps: 20,
            guidance_scale: 7.5,
            image_guidance_scale: 1.5,
        }
    }
}

/// Input for one engine invocation
#[derive(Debug, Clone)]
pub enum EngineInput {
    /// Text generation
    Text {
        request: TextRequest,
        params: GenerationParams,
    },
    /// Prompt-guided edit of an already decoded and size-constrained image
    ImageEdit {
        prompt: String,
        image: RgbImage,
        params: GenerationParams,
    },
}

impl EngineInput {
    fn kind(&self) -> &'static str {
        match self {
            EngineInput::Text { .. } => "text",
            EngineInput::ImageEdit { .. } => "image",
        }
    }
}

/// Raw engine output
#[derive(Debug, Clone, PartialEq)]
pub enum EngineOutput {
    /// Generated text
    Text(String),
    /// Edited image
    Image(RgbImage),
}

impl EngineOutput {
    pub fn kind(&self) -> &'static str {
        match self {
            EngineOutput::Text(_) => "text",
            EngineOutput::Image(_) => "image",
        }
    }
}

/// Whether an engine tolerates overlapping calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineConcurrency {
    /// Safe to call from several jobs at once
    Shared,
    /// Calls must not overlap
    #[default]
    Exclusive,
}

// ============================================================================
// Engine Trait
// ============================================================================

/// A loaded inference engine
///
/// Implementers are responsible for:
/// - Running the model forward pass for one input
/// - Reporting failures as [`EngineError`] rather than panicking
/// - Declaring whether concurrent calls are safe
#[async_trait]
pub trait InferenceEngine: Send + Sync {
    /// Get the engine name
    fn name(&self) -> &str;

    /// Concurrency contract of this engine. Defaults to exclusive access.
    fn concurrency(&self) -> EngineConcurrency {
        EngineConcurrency::Exclusive
    }

    /// Run inference for one job
    ///
    /// # Errors
    /// - `ResourceExhausted`: if the accelerator or host runs out of memory
    /// - `Failed`: for any other inference error
    async fn run(&self, input: EngineInput) -> EngineResult<EngineOutput>;
}

// ============================================================================
// Shared handle
// ============================================================================

/// Shared, read-only handle to the loaded engine
#[derive(Clone)]
pub struct EngineHandle {
    engine: Arc<dyn InferenceEngine>,
    gate: Option<Arc<Mutex<()>>>,
}

impl EngineHandle {
    pub fn new(engine: impl InferenceEngine + 'static) -> Self {
        Self::from_arc(Arc::new(engine))
    }

    pub fn from_arc(engine: Arc<dyn InferenceEngine>) -> Self {
        let gate = match engine.concurrency() {
            EngineConcurrency::Exclusive => Some(Arc::new(Mutex::new(()))),
            EngineConcurrency::Shared => None,
        };
        Self { engine, gate }
    }

    pub fn name(&self) -> &str {
        self.engine.name()
    }

    pub fn is_serialized(&self) -> bool {
        self.gate.is_some()
    }

    /// Invoke the engine once.
    ///
    /// Waits for exclusive access when the engine requires it. Panics are
    /// converted to [`EngineError::Panicked`]; the gate is released either way.
    pub async fn invoke(&self, input: EngineInput) -> EngineResult<EngineOutput> {
        let _guard = match &self.gate {
            Some(gate) => Some(gate.lock().await),
            None => None,
        };

        tracing::debug!(engine = %self.engine.name(), input = input.kind(), "invoking engine");

        AssertUnwindSafe(self.engine.run(input))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(EngineError::Panicked(panic_message(payload.as_ref()))))
    }
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle")
            .field("engine", &self.engine.name())
            .field("serialized", &self.is_serialized())
            .finish()
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
