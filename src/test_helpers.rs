//! Shared test utilities for the imgfit test suite.
//!
//! Writes small real image files so codec-backed tests exercise the actual
//! decoders instead of the mock backend.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = tempfile::TempDir::new().unwrap();
//! create_test_png(&tmp.path().join("a.png"), 64, 48);
//! let pixels = noisy_image(64, 48, 7);
//! ```

use image::{ImageFormat, RgbImage};
use std::path::Path;

// =========================================================================
// Pixel sources
// =========================================================================

/// Deterministic pseudo-random RGB noise.
///
/// Noise compresses badly, which makes encoded size track quality closely.
pub fn noisy_image(width: u32, height: u32, seed: u64) -> RgbImage {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
    RgbImage::from_fn(width, height, |_, _| {
        let mut channel = || {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (state >> 56) as u8
        };
        image::Rgb([channel(), channel(), channel()])
    })
}

/// Smooth gradient; compresses well.
pub fn gradient_image(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            128,
        ])
    })
}

// =========================================================================
// File writers
// =========================================================================

/// Write a gradient JPEG of the given size.
pub fn create_test_jpeg(path: &Path, width: u32, height: u32) {
    gradient_image(width, height)
        .save_with_format(path, ImageFormat::Jpeg)
        .unwrap();
}

/// Write a gradient PNG of the given size.
pub fn create_test_png(path: &Path, width: u32, height: u32) {
    gradient_image(width, height)
        .save_with_format(path, ImageFormat::Png)
        .unwrap();
}
