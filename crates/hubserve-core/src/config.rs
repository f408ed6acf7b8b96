//! Worker configuration
//!
//! Read once at startup from, in increasing priority: built-in defaults, an
//! optional config file (format from its extension), and environment
//! variables named after the keys in upper case (`MODEL_NAME`,
//! `HF_CACHE_ROOT`, `MAX_IMAGE_DIMENSION`, ...).

use crate::engine::GenerationParams;
use crate::preprocess::{DEFAULT_JPEG_QUALITY, DEFAULT_MAX_DIMENSION, ImagePreprocessor};
use crate::request::Modality;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Model loaded when none is configured
pub const DEFAULT_MODEL_NAME: &str = "microsoft/Phi-3-mini-4k-instruct";
/// Cache root on the serverless network volume
pub const DEFAULT_CACHE_ROOT: &str = "/runpod-volume/huggingface-cache/hub";

/// Configuration loading error
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("Config parsing error: {0}")]
    Parse(#[from] config::ConfigError),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

/// Result type for config operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Startup configuration of one worker process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Model identifier in `org/name` form
    pub model_name: String,

    /// Root of the local model cache (the `hub` directory)
    pub hf_cache_root: PathBuf,

    /// Which request/response shape this worker serves
    pub worker_modality: Modality,

    /// Longest-edge cap applied to incoming images
    pub max_image_dimension: u32,

    /// JPEG quality of returned images
    pub jpeg_quality: u8,

    /// Denoising steps, forwarded to the engine as-is
    pub num_inference_steps: u32,

    /// Prompt guidance, forwarded to the engine as-is
    pub guidance_scale: f32,

    /// Image guidance, forwarded to the engine as-is
    pub image_guidance_scale: f32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        let params = GenerationParams::default();
        Self {
            model_name: DEFAULT_MODEL_NAME.to_string(),
            hf_cache_root: PathBuf::from(DEFAULT_CACHE_ROOT),
            worker_modality: Modality::Text,
            max_image_dimension: DEFAULT_MAX_DIMENSION,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            num_inference_steps: params.num_inference_steps,
            guidance_scale: params.guidance_scale,
            image_guidance_scale: params.image_guidance_scale,
        }
    }
}

impl WorkerConfig {
    pub fn new(model_name: impl Into<String>, hf_cache_root: impl Into<PathBuf>) -> Self {
        Self {
            model_name: model_name.into(),
            hf_cache_root: hf_cache_root.into(),
            ..Default::default()
        }
    }

    /// Load from an optional file and the process environment
    pub fn load(file: Option<&Path>) -> ConfigResult<Self> {
        Self::load_from(file, None)
    }

    /// Load from an optional file and an explicit environment map.
    /// `env = None` reads the process environment.
    pub fn load_from(file: Option<&Path>, env: Option<HashMap<String, String>>) -> ConfigResult<Self> {
        let mut builder = Config::builder();

        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(Environment::default().try_parsing(true).source(env));

        let cfg: WorkerConfig = builder.build()?.try_deserialize()?;
        cfg.validate()?;

        tracing::debug!(
            model_name = %cfg.model_name,
            cache_root = %cfg.hf_cache_root.display(),
            modality = %cfg.worker_modality,
            "worker configuration loaded"
        );

        Ok(cfg)
    }

    /// Check the values the worker itself depends on. Engine parameters are
    /// forwarded opaquely and not checked.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.model_name.trim().is_empty() {
            return Err(ConfigError::Invalid("model_name must not be empty".into()));
        }
        if self.max_image_dimension == 0 {
            return Err(ConfigError::Invalid("max_image_dimension must be > 0".into()));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ConfigError::Invalid("jpeg_quality must be between 1 and 100".into()));
        }
        Ok(())
    }

    /// Set the served modality
    pub fn with_modality(mut self, modality: Modality) -> Self {
        self.worker_modality = modality;
        self
    }

    /// Set the longest-edge cap
    pub fn with_max_image_dimension(mut self, max: u32) -> Result<Self, &'static str> {
        if max == 0 {
            return Err("max_image_dimension must be > 0");
        }
        self.max_image_dimension = max;
        Ok(self)
    }

    /// Set the JPEG quality of returned images
    pub fn with_jpeg_quality(mut self, quality: u8) -> Result<Self, &'static str> {
        if !(1..=100).contains(&quality) {
            return Err("jpeg_quality must be between 1 and 100");
        }
        self.jpeg_quality = quality;
        Ok(self)
    }

    pub fn preprocessor(&self) -> ImagePreprocessor {
        ImagePreprocessor::new(self.max_image_dimension, self.jpeg_quality)
    }

    pub fn generation_params(&self) -> GenerationParams {
        GenerationParams {
            num_inference_steps: self.num_inference_steps,
            guidance_scale: self.guidance_scale,
            image_guidance_scale: self.image_guidance_scale,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
