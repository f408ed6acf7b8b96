//! Per-job orchestration
//!
//! validate → (decode + size cap for image edits) → engine, exactly once →
//! envelope. Every path ends in one [`ResponseEnvelope`]; per-job errors and
//! panics never leave [`RequestHandler::handle`].
//!
//! Image decoding, resizing and encoding run on Tokio's blocking pool, so an
//! image job yields to the runtime while it works and a host-side timeout
//! can interrupt it.

use crate::engine::{
    EngineError, EngineHandle, EngineInput, EngineOutput, GenerationParams, panic_message,
};
use crate::error::{JobError, JobResult};
use crate::preprocess::ImagePreprocessor;
use crate::request::{Job, Modality, ValidatedRequest, validate};
use futures::FutureExt;
use serde::{Serialize, Serializer};
use serde_json::{Value, json};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

/// Format tag reported alongside returned images
pub const IMAGE_FORMAT: &str = "jpeg";

/// Successful job output
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutput {
    /// Generated text
    Text(String),
    /// Base64 JPEG payload
    Image(String),
}

/// Failed job, remembering which wire shape to report it in
#[derive(Debug, Clone, PartialEq)]
pub struct JobFailure {
    pub modality: Modality,
    pub message: String,
}

/// Outcome of exactly one job
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseEnvelope {
    Success(JobOutput),
    Failure(JobFailure),
}

impl ResponseEnvelope {
    /// Failure envelope for `modality`. Also used by hosts to report
    /// interruptions (timeouts, unreadable job documents) in the same shape.
    pub fn failure(modality: Modality, message: impl Into<String>) -> Self {
        ResponseEnvelope::Failure(JobFailure {
            modality,
            message: message.into(),
        })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ResponseEnvelope::Success(_))
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            ResponseEnvelope::Failure(f) => Some(&f.message),
            ResponseEnvelope::Success(_) => None,
        }
    }

    /// Wire form. Text and image jobs use different shapes:
    ///
    /// ```text
    /// text:  {"status":"success","output":..} | {"status":"error","error":..}
    /// image: {"image":..,"format":"jpeg"}     | {"error":..}
    /// ```
    pub fn to_json(&self) -> Value {
        match self {
            ResponseEnvelope::Success(JobOutput::Text(output)) => {
                json!({ "status": "success", "output": output })
            }
            ResponseEnvelope::Success(JobOutput::Image(image)) => {
                json!({ "image": image, "format": IMAGE_FORMAT })
            }
            ResponseEnvelope::Failure(JobFailure {
                modality: Modality::Text,
                message,
            }) => json!({ "status": "error", "error": message }),
            ResponseEnvelope::Failure(JobFailure {
                modality: Modality::ImageEdit,
                message,
            }) => json!({ "error": message }),
        }
    }
}

impl Serialize for ResponseEnvelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Handles jobs of one modality against a loaded engine
///
/// Holds only read-only state, so one instance can be shared across
/// concurrent jobs behind an `Arc`.
#[derive(Debug, Clone)]
pub struct RequestHandler {
    modality: Modality,
    engine: EngineHandle,
    preprocessor: ImagePreprocessor,
    params: GenerationParams,
}

impl RequestHandler {
    pub fn new(modality: Modality, engine: EngineHandle) -> Self {
        Self {
            modality,
            engine,
            preprocessor: ImagePreprocessor::default(),
            params: GenerationParams::default(),
        }
    }

    pub fn with_preprocessor(mut self, preprocessor: ImagePreprocessor) -> Self {
        self.preprocessor = preprocessor;
        self
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    pub fn modality(&self) -> Modality {
        self.modality
    }

    pub fn preprocessor(&self) -> &ImagePreprocessor {
        &self.preprocessor
    }

    /// Turn one job into exactly one envelope.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn handle(&self, job: &Job) -> ResponseEnvelope {
        let started = Instant::now();
        let job_id = job.id.as_deref().unwrap_or("-");

        match contain_panic(self.process(job)).await {
            Ok(output) => {
                tracing::info!(
                    job_id,
                    modality = %self.modality,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    output_len = output_len(&output),
                    "job succeeded"
                );
                ResponseEnvelope::Success(output)
            }
            Err(err) => {
                tracing::warn!(
                    job_id,
                    modality = %self.modality,
                    kind = err.kind(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    error = %err,
                    "job failed"
                );
                ResponseEnvelope::failure(self.modality, err.to_string())
            }
        }
    }

    async fn process(&self, job: &Job) -> JobResult<JobOutput> {
        let request = validate(job, self.modality)?;

        let input = match request {
            ValidatedRequest::Text(request) => {
                tracing::info!(
                    prompt = %prompt_preview(&request.prompt),
                    max_tokens = request.max_tokens,
                    temperature = request.temperature,
                    "text request"
                );
                EngineInput::Text {
                    request,
                    params: self.params,
                }
            }
            ValidatedRequest::ImageEdit(request) => {
                let preprocessor = self.preprocessor;
                let payload = request.image;
                let image = tokio::task::spawn_blocking(move || preprocessor.prepare(&payload))
                    .await
                    .map_err(|e| JobError::ImageDecode(format!("decode task failed: {e}")))??;
                tracing::info!(
                    prompt = %prompt_preview(&request.prompt),
                    width = image.width(),
                    height = image.height(),
                    "image edit request"
                );
                EngineInput::ImageEdit {
                    prompt: request.prompt,
                    image,
                    params: self.params,
                }
            }
        };

        let output = self.engine.invoke(input).await.map_err(engine_failure)?;

        match (self.modality, output) {
            (Modality::Text, EngineOutput::Text(text)) => Ok(JobOutput::Text(text)),
            (Modality::ImageEdit, EngineOutput::Image(image)) => {
                let preprocessor = self.preprocessor;
                tokio::task::spawn_blocking(move || preprocessor.finish(&image))
                    .await
                    .map_err(|e| JobError::ImageEncode(format!("encode task failed: {e}")))?
                    .map(JobOutput::Image)
            }
            (modality, other) => Err(engine_failure(EngineError::MalformedOutput(format!(
                "expected {} output for a {modality} job, got {}",
                expected_kind(modality),
                other.kind()
            )))),
        }
    }
}

/// Run one job's work, turning a panic anywhere in it into
/// [`JobError::Internal`]
async fn contain_panic<T>(work: impl Future<Output = JobResult<T>>) -> JobResult<T> {
    AssertUnwindSafe(work).catch_unwind().await.unwrap_or_else(|payload| {
        let message = panic_message(payload.as_ref());
        tracing::error!(error = %message, "job handling panicked; continuing with next job");
        Err(JobError::Internal(message))
    })
}

fn engine_failure(err: EngineError) -> JobError {
    if matches!(err, EngineError::Panicked(_)) {
        tracing::error!(error = %err, "engine panicked; continuing with next job");
    }
    JobError::EngineFailure(err.to_string())
}

fn expected_kind(modality: Modality) -> &'static str {
    match modality {
        Modality::Text => "text",
        Modality::ImageEdit => "image",
    }
}

fn output_len(output: &JobOutput) -> usize {
    match output {
        JobOutput::Text(s) | JobOutput::Image(s) => s.len(),
    }
}

/// First 80 characters, for logs
fn prompt_preview(prompt: &str) -> String {
    prompt.chars().take(80).collect()
}
