//! Job input validation
//!
//! Turns the untyped job input mapping into a typed [`ValidatedRequest`].
//! Defaults are applied here so the handler never deals with missing values.

use crate::error::{JobError, JobResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Prompt used when a text job carries none
pub const DEFAULT_PROMPT: &str = "Hello!";
/// Generation length used when a text job carries none
pub const DEFAULT_MAX_TOKENS: i64 = 256;
/// Sampling temperature used when a text job carries none
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Request/response shape a worker serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    /// Text generation
    Text,
    /// Prompt-guided image editing
    ImageEdit,
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modality::Text => write!(f, "text"),
            Modality::ImageEdit => write!(f, "image_edit"),
        }
    }
}

impl std::str::FromStr for Modality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "text" => Ok(Modality::Text),
            "image_edit" | "image" => Ok(Modality::ImageEdit),
            other => Err(format!("unknown modality '{other}'")),
        }
    }
}

/// A single job as received from the host runtime
///
/// Only `input` is interpreted; `id` is carried for log correlation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Job {
    pub id: Option<String>,
    pub input: Map<String, Value>,
}

impl Job {
    pub fn new(input: Map<String, Value>) -> Self {
        Self { id: None, input }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Build a job from a raw job document `{"id"?: .., "input"?: {..}}`.
    ///
    /// A missing, null or non-object `input` becomes an empty mapping. String
    /// and numeric ids are both accepted.
    pub fn from_document(document: Value) -> Self {
        let Value::Object(mut doc) = document else {
            return Self::default();
        };

        let id = match doc.remove("id") {
            Some(Value::String(s)) => Some(s),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };

        let input = match doc.remove("input") {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };

        Self { id, input }
    }

    fn field(&self, name: &str) -> Option<&Value> {
        match self.input.get(name) {
            None | Some(Value::Null) => None,
            Some(v) => Some(v),
        }
    }
}

impl From<Map<String, Value>> for Job {
    fn from(input: Map<String, Value>) -> Self {
        Self::new(input)
    }
}

/// Validated text generation request
#[derive(Debug, Clone, PartialEq)]
pub struct TextRequest {
    pub prompt: String,
    /// Not range-checked; the engine enforces runtime bounds
    pub max_tokens: i64,
    pub temperature: f64,
}

/// Validated image edit request; `image` is still transport-encoded
#[derive(Debug, Clone, PartialEq)]
pub struct ImageEditRequest {
    pub prompt: String,
    pub image: String,
}

/// Typed request, one variant per modality
#[derive(Debug, Clone, PartialEq)]
pub enum ValidatedRequest {
    Text(TextRequest),
    ImageEdit(ImageEditRequest),
}

impl ValidatedRequest {
    pub fn modality(&self) -> Modality {
        match self {
            ValidatedRequest::Text(_) => Modality::Text,
            ValidatedRequest::ImageEdit(_) => Modality::ImageEdit,
        }
    }

    pub fn prompt(&self) -> &str {
        match self {
            ValidatedRequest::Text(r) => &r.prompt,
            ValidatedRequest::ImageEdit(r) => &r.prompt,
        }
    }
}

/// Validate `job` against the field rules of `modality`
pub fn validate(job: &Job, modality: Modality) -> JobResult<ValidatedRequest> {
    match modality {
        Modality::Text => validate_text(job).map(ValidatedRequest::Text),
        Modality::ImageEdit => validate_image_edit(job).map(ValidatedRequest::ImageEdit),
    }
}

fn validate_text(job: &Job) -> JobResult<TextRequest> {
    let prompt = job
        .field("prompt")
        .and_then(coerce_text)
        .unwrap_or_else(|| DEFAULT_PROMPT.to_string());

    let max_tokens = match job.field("max_tokens") {
        None => DEFAULT_MAX_TOKENS,
        Some(v) => coerce_int(v).ok_or_else(|| invalid("max_tokens", "must be an integer", v))?,
    };

    let temperature = match job.field("temperature") {
        None => DEFAULT_TEMPERATURE,
        Some(v) => coerce_float(v).ok_or_else(|| invalid("temperature", "must be a number", v))?,
    };

    Ok(TextRequest {
        prompt,
        max_tokens,
        temperature,
    })
}

fn validate_image_edit(job: &Job) -> JobResult<ImageEditRequest> {
    let prompt = required_string(job, "prompt")?;
    let image = required_string(job, "image")?;
    Ok(ImageEditRequest { prompt, image })
}

fn required_string(job: &Job, field: &'static str) -> JobResult<String> {
    match job.field(field) {
        None => Err(JobError::MissingField(field)),
        Some(Value::String(s)) if s.trim().is_empty() => Err(JobError::MissingField(field)),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(invalid(field, "must be a string", other)),
    }
}

fn invalid(field: &'static str, reason: &str, value: &Value) -> JobError {
    JobError::InvalidField {
        field,
        reason: format!("{reason}, got {}", type_name(value)),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn coerce_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(truncate)),
        Value::Bool(b) => Some(i64::from(*b)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(truncate))
        }
        _ => None,
    }
}

fn coerce_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn truncate(f: f64) -> Option<i64> {
    (f.is_finite() && f >= i64::MIN as f64 && f <= i64::MAX as f64).then(|| f.trunc() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn job(input: Value) -> Job {
        Job::from_document(json!({ "input": input }))
    }

    fn text(input: Value) -> TextRequest {
        match validate(&job(input), Modality::Text).unwrap() {
            ValidatedRequest::Text(r) => r,
            other => panic!("expected text request, got {other:?}"),
        }
    }

    #[test]
    fn test_text_defaults() {
        let r = text(json!({}));
        assert_eq!(r.prompt, DEFAULT_PROMPT);
        assert_eq!(r.max_tokens, 256);
        assert_eq!(r.temperature, 0.7);
    }

    #[test]
    fn test_text_explicit_values() {
        let r = text(json!({"prompt": "Hello", "max_tokens": 50, "temperature": 0.2}));
        assert_eq!(r.prompt, "Hello");
        assert_eq!(r.max_tokens, 50);
        assert_eq!(r.temperature, 0.2);
    }

    #[test]
    fn test_text_coercions() {
        let r = text(json!({"prompt": 42, "max_tokens": "64", "temperature": "1"}));
        assert_eq!(r.prompt, "42");
        assert_eq!(r.max_tokens, 64);
        assert_eq!(r.temperature, 1.0);

        let r = text(json!({"max_tokens": 12.9, "temperature": 3}));
        assert_eq!(r.max_tokens, 12);
        assert_eq!(r.temperature, 3.0);

        let r = text(json!({"max_tokens": true, "temperature": false}));
        assert_eq!(r.max_tokens, 1);
        assert_eq!(r.temperature, 0.0);
    }

    #[test]
    fn test_text_uncoercible_prompt_falls_back() {
        assert_eq!(text(json!({"prompt": null})).prompt, DEFAULT_PROMPT);
        assert_eq!(text(json!({"prompt": ["a"]})).prompt, DEFAULT_PROMPT);
        assert_eq!(text(json!({"prompt": {"a": 1}})).prompt, DEFAULT_PROMPT);
    }

    #[test]
    fn test_text_no_range_checks() {
        let r = text(json!({"max_tokens": -5, "temperature": -1.5}));
        assert_eq!(r.max_tokens, -5);
        assert_eq!(r.temperature, -1.5);
    }

    #[test]
    fn test_text_null_numbers_take_defaults() {
        let r = text(json!({"max_tokens": null, "temperature": null}));
        assert_eq!(r.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(r.temperature, DEFAULT_TEMPERATURE);
    }

    #[test]
    fn test_text_uncoercible_numbers_fail() {
        let err = validate(&job(json!({"max_tokens": "lots"})), Modality::Text).unwrap_err();
        assert!(matches!(err, JobError::InvalidField { field: "max_tokens", .. }));

        let err = validate(&job(json!({"temperature": [0.1]})), Modality::Text).unwrap_err();
        assert!(matches!(err, JobError::InvalidField { field: "temperature", .. }));
        assert!(err.to_string().contains("got array"));
    }

    #[test]
    fn test_image_edit_requires_prompt_and_image() {
        let err = validate(&job(json!({"image": "aGk="})), Modality::ImageEdit).unwrap_err();
        assert_eq!(err, JobError::MissingField("prompt"));

        let err = validate(&job(json!({"prompt": "edit"})), Modality::ImageEdit).unwrap_err();
        assert_eq!(err, JobError::MissingField("image"));

        let err = validate(&job(json!({"prompt": "  ", "image": "aGk="})), Modality::ImageEdit)
            .unwrap_err();
        assert_eq!(err, JobError::MissingField("prompt"));

        let err = validate(&job(json!({"prompt": null, "image": "aGk="})), Modality::ImageEdit)
            .unwrap_err();
        assert_eq!(err, JobError::MissingField("prompt"));
    }

    #[test]
    fn test_image_edit_non_string_is_invalid() {
        let err = validate(&job(json!({"prompt": "edit", "image": 7})), Modality::ImageEdit)
            .unwrap_err();
        assert!(matches!(err, JobError::InvalidField { field: "image", .. }));
    }

    #[test]
    fn test_image_edit_valid() {
        let req = validate(
            &job(json!({"prompt": "make it blue", "image": "aGk="})),
            Modality::ImageEdit,
        )
        .unwrap();
        assert_eq!(req.modality(), Modality::ImageEdit);
        assert_eq!(req.prompt(), "make it blue");
    }

    #[test]
    fn test_job_from_document() {
        let j = Job::from_document(json!({"id": "job-1", "input": {"prompt": "x"}}));
        assert_eq!(j.id.as_deref(), Some("job-1"));
        assert_eq!(j.input.get("prompt"), Some(&json!("x")));

        let j = Job::from_document(json!({"id": 7, "input": null}));
        assert_eq!(j.id.as_deref(), Some("7"));
        assert!(j.input.is_empty());

        assert_eq!(Job::from_document(json!("nope")), Job::default());
    }

    #[test]
    fn test_modality_parse() {
        assert_eq!("text".parse::<Modality>().unwrap(), Modality::Text);
        assert_eq!("image-edit".parse::<Modality>().unwrap(), Modality::ImageEdit);
        assert_eq!("IMAGE".parse::<Modality>().unwrap(), Modality::ImageEdit);
        assert!("audio".parse::<Modality>().is_err());
        assert_eq!(Modality::ImageEdit.to_string(), "image_edit");
    }
}
