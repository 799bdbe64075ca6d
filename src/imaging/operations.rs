//! High-level image operations.
//!
//! These functions combine calculations with backend execution: they take
//! [`ConvertSettings`], plan the target size, drive the resampler, and run the
//! budget search. None of them write output files or log; the caller owns
//! the filesystem.

use super::backend::{BackendError, ImageBackend};
use super::calculations::{Dimensions, PlanError, plan, resize_target};
use super::params::{ByteBudget, ConvertSettings, OutputFormat, Quality, QualitySearch};
use image::DynamicImage;
use std::path::Path;
use thiserror::Error;

/// Per-image conversion failure. None of these are fatal to a batch.
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("resize bound must be a positive pixel count")]
    InvalidBound,
    #[error("encoding failed: {0}")]
    EncodingFailure(#[from] BackendError),
    #[error("no quality from {start} down to {floor} fits within {budget} bytes")]
    BudgetUnreachable {
        budget: u64,
        start: u32,
        floor: u32,
        /// Smallest encoded size seen during the search, if any attempt ran.
        smallest: Option<usize>,
    },
    #[error("planned size {target} exceeds the {format} limit of {max_edge} px per edge")]
    TargetTooLarge {
        target: Dimensions,
        format: OutputFormat,
        max_edge: u32,
    },
}

impl ConvertError {
    /// Stable identifier used in reports and progress output.
    pub fn kind(&self) -> &'static str {
        match self {
            ConvertError::InvalidBound => "invalid-bound",
            ConvertError::EncodingFailure(_) => "encoding-failure",
            ConvertError::BudgetUnreachable { .. } => "budget-unreachable",
            ConvertError::TargetTooLarge { .. } => "target-too-large",
        }
    }
}

impl From<PlanError> for ConvertError {
    fn from(err: PlanError) -> Self {
        match err {
            PlanError::InvalidBound => ConvertError::InvalidBound,
            PlanError::InvalidSource(dims) => ConvertError::EncodingFailure(
                BackendError::ProcessingFailed(format!("decoded image is {dims}")),
            ),
        }
    }
}

/// Encoded output that satisfied its budget.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub quality: Quality,
    pub dimensions: Dimensions,
    pub format: OutputFormat,
    /// Encoder calls made, including the successful one.
    pub attempts: u32,
}

impl EncodedImage {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Result of converting one source file.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    pub source: Dimensions,
    /// Whether the pixels were resampled (false = passed through).
    pub resized: bool,
    pub encoded: EncodedImage,
}

/// Planned dimensions for a source file, without decoding or encoding it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedImage {
    pub source: Dimensions,
    /// `None` when the image would pass through at its source size.
    pub target: Option<Dimensions>,
}

/// Encode at decreasing quality until the output fits the budget.
///
/// Every attempt encodes into memory; the first buffer within budget is
/// returned. `search.start` is always tried. Once the next level would fall
/// below `search.floor`, the search gives up with [`ConvertError::BudgetUnreachable`]. Codec errors abort
/// immediately as [`ConvertError::EncodingFailure`].
pub fn encode_within_budget(
    backend: &impl ImageBackend,
    image: &DynamicImage,
    format: OutputFormat,
    budget: ByteBudget,
    search: &QualitySearch,
) -> Result<EncodedImage, ConvertError> {
    let dimensions = Dimensions::new(image.width(), image.height());
    let mut attempts = 0;
    let mut smallest: Option<usize> = None;

    for quality in search.levels() {
        attempts += 1;
        let bytes = backend.encode(image, format, quality)?;
        if budget.fits(bytes.len()) {
            return Ok(EncodedImage {
                bytes,
                quality,
                dimensions,
                format,
                attempts,
            });
        }
        smallest = Some(smallest.map_or(bytes.len(), |s| s.min(bytes.len())));
    }

    Err(ConvertError::BudgetUnreachable {
        budget: budget.bytes(),
        start: search.start.value(),
        floor: search.floor.value(),
        smallest,
    })
}

/// Normalise to 8-bit RGB once so every search attempt encodes the same pixels.
fn into_rgb8(image: DynamicImage) -> DynamicImage {
    match image {
        DynamicImage::ImageRgb8(_) => image,
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    }
}

/// Reject a resample target the output format could never encode, before
/// any pixels are allocated for it.
fn check_target(target: Dimensions, format: OutputFormat) -> Result<(), ConvertError> {
    let max_edge = format.max_edge();
    if target.width > max_edge || target.height > max_edge {
        return Err(ConvertError::TargetTooLarge {
            target,
            format,
            max_edge,
        });
    }
    Ok(())
}

/// Decode, plan, resample, and budget-encode one image file.
pub fn convert(
    backend: &impl ImageBackend,
    path: &Path,
    settings: &ConvertSettings,
) -> Result<Conversion, ConvertError> {
    if settings.max_px == 0 {
        return Err(ConvertError::InvalidBound);
    }

    let decoded = backend.decode(path)?;
    let source = Dimensions::new(decoded.width(), decoded.height());
    let planned = plan(source, settings.policy, settings.max_px, settings.rounding)?;
    let target = resize_target(source, planned, settings.policy, settings.only_shrink);
    if let Some(target) = target {
        check_target(target, settings.format)?;
    }

    let pixels = match target {
        Some(target) => backend.resize(&decoded, target, settings.filter)?,
        None => decoded,
    };
    let pixels = into_rgb8(pixels);

    let encoded = encode_within_budget(
        backend,
        &pixels,
        settings.format,
        settings.budget,
        &settings.search,
    )?;

    Ok(Conversion {
        source,
        resized: target.is_some(),
        encoded,
    })
}

/// Plan an image without decoding its pixels.
///
/// Useful for dry runs and for testing parameter generation.
pub fn plan_image(
    backend: &impl ImageBackend,
    path: &Path,
    settings: &ConvertSettings,
) -> Result<PlannedImage, ConvertError> {
    let source = backend.identify(path)?;
    let planned = plan(source, settings.policy, settings.max_px, settings.rounding)?;
    let target = resize_target(source, planned, settings.policy, settings.only_shrink);
    if let Some(target) = target {
        check_target(target, settings.format)?;
    }
    Ok(PlannedImage { source, target })
}
