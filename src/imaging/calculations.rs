//! Pure calculation functions for target dimensions.
//!
//! All functions here are pure and testable without any I/O or images.
//!
//! ## Rounding
//!
//! The non-governing edge is computed on integers as `other * bound / governing`
//! so results never depend on floating point. [`Rounding::Nearest`] rounds
//! half up (half away from zero, since every operand is positive);
//! [`Rounding::Truncate`] rounds toward zero. Either way the result is clamped
//! to at least 1 pixel.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Pixel dimensions of a source image or a computed target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Which edge of the source is set to the pixel bound.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum ResizePolicy {
    /// The larger of width/height becomes the bound.
    #[default]
    LongestEdge,
    /// The smaller of width/height becomes the bound.
    ShortestEdge,
    /// Width becomes the bound regardless of orientation.
    Width,
    /// Height becomes the bound regardless of orientation.
    Height,
}

/// Integer rounding applied to the scaled (non-governing) edge.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum Rounding {
    #[default]
    Nearest,
    Truncate,
}

/// The edge a policy pins to the bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Width,
    Height,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanError {
    #[error("resize bound must be a positive pixel count")]
    InvalidBound,
    #[error("source dimensions {0} have a zero-length side")]
    InvalidSource(Dimensions),
}

/// Determine the governing axis for a source under a policy.
///
/// Square sources are governed by width for both edge policies.
pub fn governing_axis(source: Dimensions, policy: ResizePolicy) -> Axis {
    match policy {
        ResizePolicy::LongestEdge if source.width >= source.height => Axis::Width,
        ResizePolicy::LongestEdge => Axis::Height,
        ResizePolicy::ShortestEdge if source.width <= source.height => Axis::Width,
        ResizePolicy::ShortestEdge => Axis::Height,
        ResizePolicy::Width => Axis::Width,
        ResizePolicy::Height => Axis::Height,
    }
}

/// Scale `other` by `bound / governing`, rounded and clamped to `1..=u32::MAX`.
fn scale_edge(other: u32, bound: u32, governing: u32, rounding: Rounding) -> u32 {
    let num = u128::from(other) * u128::from(bound);
    let den = u128::from(governing);
    let scaled = match rounding {
        Rounding::Truncate => num / den,
        Rounding::Nearest => (2 * num + den) / (2 * den),
    };
    scaled.clamp(1, u128::from(u32::MAX)) as u32
}

/// Calculate target dimensions for a source under a resize policy.
///
/// The governing edge is set to `bound` exactly; the other edge keeps the
/// source aspect ratio within one rounding unit.
///
/// # Examples
/// ```
/// # use imgfit::imaging::{plan, Dimensions, ResizePolicy, Rounding};
/// let target = plan(Dimensions::new(200, 100), ResizePolicy::LongestEdge, 50, Rounding::Nearest);
/// assert_eq!(target, Ok(Dimensions::new(50, 25)));
/// ```
pub fn plan(
    source: Dimensions,
    policy: ResizePolicy,
    bound: u32,
    rounding: Rounding,
) -> Result<Dimensions, PlanError> {
    if bound == 0 {
        return Err(PlanError::InvalidBound);
    }
    if source.width == 0 || source.height == 0 {
        return Err(PlanError::InvalidSource(source));
    }

    let target = match governing_axis(source, policy) {
        Axis::Width => Dimensions {
            width: bound,
            height: scale_edge(source.height, bound, source.width, rounding),
        },
        Axis::Height => Dimensions {
            width: scale_edge(source.width, bound, source.height, rounding),
            height: bound,
        },
    };
    Ok(target)
}

/// Decide whether the planned dimensions should actually be applied.
///
/// Returns `None` when the pixels should pass through unresized: the plan
/// equals the source, or `only_shrink` is set and the plan would not make the
/// governing edge smaller.
pub fn resize_target(
    source: Dimensions,
    planned: Dimensions,
    policy: ResizePolicy,
    only_shrink: bool,
) -> Option<Dimensions> {
    if planned == source {
        return None;
    }
    if only_shrink {
        let (current, wanted) = match governing_axis(source, policy) {
            Axis::Width => (source.width, planned.width),
            Axis::Height => (source.height, planned.height),
        };
        if wanted >= current {
            return None;
        }
    }
    Some(planned)
}
