//! Error taxonomy for the worker
//!
//! Two families with different propagation policies:
//! - [`ArtifactError`]: startup-phase failures. Never caught; they abort
//!   process initialisation.
//! - [`JobError`]: per-job failures. Always recovered at the
//!   [`RequestHandler`](crate::handler::RequestHandler) boundary and turned into
//!   a failure envelope.

use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Startup errors
// ============================================================================

/// Model artifact resolution errors
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// The configured model identifier is not in `org/name` form
    #[error("Invalid model identifier: '{0}' is not in 'org/name' format")]
    InvalidModelIdentifier(String),

    /// The `snapshots` directory of the model root does not exist
    #[error("Cache root missing: snapshots directory not found: {}", .0.display())]
    CacheRootMissing(PathBuf),

    /// The `snapshots` directory exists but holds no snapshot directories
    #[error("Empty cache: no snapshot subdirectories found under {}", .0.display())]
    EmptyCache(PathBuf),

    /// Reading the cache layout failed for a reason other than absence
    #[error("Cache I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for artifact resolution
pub type ArtifactResult<T> = Result<T, ArtifactError>;

// ============================================================================
// Per-job errors
// ============================================================================

/// Per-job failure kinds
#[derive(Debug, Clone, PartialEq, Error)]
pub enum JobError {
    /// A required input field is absent, null or empty
    #[error("Missing field: '{0}' is required")]
    MissingField(&'static str),

    /// An input field is present but cannot be coerced to the expected type
    #[error("Invalid field: '{field}' {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// The image payload is not valid base64 or not a decodable image
    #[error("Image decode error: {0}")]
    ImageDecode(String),

    /// The output image could not be serialized
    #[error("Image encode error: {0}")]
    ImageEncode(String),

    /// The inference engine raised during this job
    #[error("Engine failure: {0}")]
    EngineFailure(String),

    /// The worker itself panicked while handling this job
    #[error("Internal error: {0}")]
    Internal(String),
}

impl JobError {
    /// Stable short name of the failure kind, used as a structured log field
    pub fn kind(&self) -> &'static str {
        match self {
            JobError::MissingField(_) => "missing_field",
            JobError::InvalidField { .. } => "invalid_field",
            JobError::ImageDecode(_) => "image_decode",
            JobError::ImageEncode(_) => "image_encode",
            JobError::EngineFailure(_) => "engine_failure",
            JobError::Internal(_) => "internal",
        }
    }
}

/// Result type for per-job operations
pub type JobResult<T> = Result<T, JobError>;
