//! # hubserve-core
//!
//! Core of a serverless inference worker: offline model snapshot resolution
//! and the per-job request protocol around an external inference engine.
//!
//! Startup, once per process:
//! **config** → **artifact** (resolve snapshot) → engine load
//!
//! Per job, repeatedly:
//! **request** (validate) → **preprocess** (image edits) → **engine** → envelope
//!
//! | Module       | Role                                                   |
//! |--------------|--------------------------------------------------------|
//! | `artifact`   | `refs/main` / fallback snapshot lookup in a local cache |
//! | `request`    | untyped job input → typed request with defaults         |
//! | `preprocess` | base64 image decode, longest-edge cap, JPEG encode      |
//! | `engine`     | engine trait and serialized, panic-safe handle          |
//! | `handler`    | orchestration and success/error envelopes               |
//! | `provider`   | placeholder engine backed by the snapshot directory     |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hubserve_core::{EngineHandle, Job, Modality, RequestHandler, SnapshotEngine, resolve_snapshot};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let snapshot = resolve_snapshot("microsoft/Phi-3-mini-4k-instruct", "/cache/hub")?;
//!     let engine = EngineHandle::new(SnapshotEngine::load(&snapshot)?);
//!     let handler = RequestHandler::new(Modality::Text, engine);
//!
//!     let job = Job::from_document(json!({"input": {"prompt": "Hello"}}));
//!     println!("{}", handler.handle(&job).await.to_json());
//!     Ok(())
//! }
//! ```

pub mod artifact;
pub mod config;
pub mod engine;
pub mod error;
pub mod handler;
pub mod preprocess;
pub mod provider;
pub mod request;

pub use artifact::{ArtifactStore, ModelIdentifier, ResolutionSource, ResolvedSnapshot, resolve_snapshot};
pub use self::config::WorkerConfig;
pub use engine::{
    EngineConcurrency, EngineError, EngineHandle, EngineInput, EngineOutput, GenerationParams,
    InferenceEngine,
};
pub use error::{ArtifactError, JobError};
pub use handler::{JobFailure, JobOutput, RequestHandler, ResponseEnvelope};
pub use preprocess::ImagePreprocessor;
pub use provider::SnapshotEngine;
pub use request::{Job, Modality, ValidatedRequest, validate};
