//! Image backend trait and shared error type.
//!
//! The [`ImageBackend`] trait defines the four operations every backend must
//! support: identify, decode, resize, and encode. Encoding always targets an
//! in-memory buffer; the backend never writes output files.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate.

use super::calculations::Dimensions;
use super::params::{OutputFormat, Quality, ResampleFilter};
use image::DynamicImage;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode {path}: {message}")]
    Decode { path: PathBuf, message: String },
    #[error("{format} encode failed at quality {quality}: {message}")]
    Encode {
        format: OutputFormat,
        quality: u32,
        message: String,
    },
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Trait for image codec backends.
///
/// `Sync` so one backend can be shared across rayon workers.
pub trait ImageBackend: Sync {
    /// Read image dimensions without a full decode where the format allows it.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Decode the first frame of an image file.
    fn decode(&self, path: &Path) -> Result<DynamicImage, BackendError>;

    /// Resample to exactly `target`.
    fn resize(
        &self,
        image: &DynamicImage,
        target: Dimensions,
        filter: ResampleFilter,
    ) -> Result<DynamicImage, BackendError>;

    /// Encode at a fixed quality into a fresh buffer.
    fn encode(
        &self,
        image: &DynamicImage,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<Vec<u8>, BackendError>;
}
