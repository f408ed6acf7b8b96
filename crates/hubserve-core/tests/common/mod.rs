//! Common test utilities shared across the `hubserve-core` integration tests.
//!
//! Declared with `mod common;` inside each integration test file that needs
//! it; not a standalone test binary.

#![allow(dead_code)]

pub mod mock_engine;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::{DynamicImage, ImageFormat, RgbImage};
use std::io::Cursor;
use std::path::PathBuf;
use tempfile::TempDir;

/// Base64 PNG of a solid image with the given dimensions
pub fn png_payload(width: u32, height: u32) -> String {
    let img = RgbImage::from_pixel(width, height, image::Rgb([40, 120, 200]));
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, ImageFormat::Png)
        .expect("png encode");
    STANDARD.encode(buf.into_inner())
}

/// Create `{root}/models--{org}--{name}/snapshots/{hash}` for each hash
pub fn seed_snapshots(root: &TempDir, model_id: &str, hashes: &[&str]) -> PathBuf {
    let (org, name) = model_id.split_once('/').expect("org/name");
    let model_root = root.path().join(format!("models--{org}--{name}"));
    for hash in hashes {
        std::fs::create_dir_all(model_root.join("snapshots").join(hash)).expect("mkdir");
    }
    model_root
}
