//! Image transport and size constraints
//!
//! Images travel as base64 strings. Everything decoded here is normalised to
//! 8-bit RGB so the engine sees a single color model whatever the source
//! encoding was.

use crate::error::{JobError, JobResult};
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::RgbImage;

/// Default longest-edge cap
pub const DEFAULT_MAX_DIMENSION: u32 = 768;
/// Default JPEG quality for returned images
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

/// Configured image limits for one worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImagePreprocessor {
    max_dimension: u32,
    jpeg_quality: u8,
}

impl Default for ImagePreprocessor {
    fn default() -> Self {
        Self {
            max_dimension: DEFAULT_MAX_DIMENSION,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl ImagePreprocessor {
    /// `max_dimension` of zero is raised to one; quality is clamped to 1..=100
    pub fn new(max_dimension: u32, jpeg_quality: u8) -> Self {
        Self {
            max_dimension: max_dimension.max(1),
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }

    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }

    pub fn jpeg_quality(&self) -> u8 {
        self.jpeg_quality
    }

    /// Decode a transport payload and apply the size cap
    pub fn prepare(&self, payload: &str) -> JobResult<RgbImage> {
        let image = decode(payload)?;
        let (width, height) = image.dimensions();
        let image = constrain_size(image, self.max_dimension);

        tracing::debug!(
            source_width = width,
            source_height = height,
            width = image.width(),
            height = image.height(),
            max_dimension = self.max_dimension,
            "image prepared"
        );

        Ok(image)
    }

    /// Serialize an engine result for transport
    pub fn finish(&self, image: &RgbImage) -> JobResult<String> {
        encode(image, self.jpeg_quality)
    }
}

/// Decode a base64 image payload into RGB.
///
/// Accepts an optional `data:<mime>;base64,` prefix, missing padding and
/// line-wrapped (MIME style) payloads.
pub fn decode(payload: &str) -> JobResult<RgbImage> {
    let bytes = decode_base64(payload)?;
    let image = image::load_from_memory(&bytes)
        .map_err(|e| JobError::ImageDecode(format!("unreadable image data: {e}")))?;
    Ok(image.to_rgb8())
}

fn decode_base64(payload: &str) -> JobResult<Vec<u8>> {
    let data = strip_data_url(payload.trim());
    if data.is_empty() {
        return Err(JobError::ImageDecode("empty image payload".into()));
    }

    let unwrapped: String;
    let data = if data.bytes().any(|b| b.is_ascii_whitespace()) {
        unwrapped = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        unwrapped.as_str()
    } else {
        data
    };

    let data = data.trim_end_matches('=');
    STANDARD_NO_PAD
        .decode(data)
        .map_err(|e| JobError::ImageDecode(format!("invalid base64: {e}")))
}

fn strip_data_url(payload: &str) -> &str {
    if payload.starts_with("data:") {
        if let Some((_, data)) = payload.split_once(";base64,") {
            return data;
        }
    }
    payload
}

/// Scale `image` down so its longest edge is at most `max_dimension`.
///
/// Images already within bounds are returned untouched; nothing is upscaled.
pub fn constrain_size(image: RgbImage, max_dimension: u32) -> RgbImage {
    let (width, height) = image.dimensions();
    match target_dimensions(width, height, max_dimension) {
        Some((w, h)) => imageops::resize(&image, w, h, FilterType::Lanczos3),
        None => image,
    }
}

/// New `(width, height)` for an image that exceeds `max_dimension`, or `None`
/// when no resize is needed
pub fn target_dimensions(width: u32, height: u32, max_dimension: u32) -> Option<(u32, u32)> {
    let max_dimension = max_dimension.max(1);
    let longest = width.max(height);
    if longest <= max_dimension {
        return None;
    }

    let scale = f64::from(max_dimension) / f64::from(longest);
    let scaled = |side: u32| ((f64::from(side) * scale).round() as u32).clamp(1, max_dimension);
    Some((scaled(width), scaled(height)))
}

/// JPEG-encode `image` at `quality` and base64 the bytes
pub fn encode(image: &RgbImage, quality: u8) -> JobResult<String> {
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100))
        .encode_image(image)
        .map_err(|e| JobError::ImageEncode(e.to_string()))?;
    Ok(STANDARD.encode(bytes))
}
