//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the high-level [`operations`](super::operations) module
//! (which decides how an image is planned and searched) and the
//! [`backend`](super::backend) (which does the actual pixel and codec work).
//!
//! ## Types
//!
//! - [`Quality`] — Lossy encoding quality (1–100). Clamped on construction.
//! - [`QualitySearch`] — Start, step and floor of the decreasing quality search.
//! - [`ByteBudget`] — Maximum encoded size of one output image.
//! - [`OutputFormat`] — Lossy container written to disk (JPEG or AVIF).
//! - [`ResampleFilter`] — Interpolation used when pixels are resized.
//! - [`ConvertSettings`] — Everything one conversion needs, as a single immutable value.

use super::calculations::{ResizePolicy, Rounding};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "q{}", self.0)
    }
}

/// Decreasing linear quality search.
///
/// Levels are `start, start - step, ...` down to and including `floor`.
/// `start` is always tried, even when it already sits below `floor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualitySearch {
    pub start: Quality,
    pub step: u32,
    pub floor: Quality,
}

impl QualitySearch {
    pub fn new(start: u32, step: u32, floor: u32) -> Self {
        Self {
            start: Quality::new(start),
            step: step.max(1),
            floor: Quality::new(floor),
        }
    }

    /// Quality levels tried, highest first.
    pub fn levels(&self) -> impl Iterator<Item = Quality> + use<> {
        let step = self.step.max(1);
        let floor = self.floor.value();
        std::iter::successors(Some(self.start.value()), move |q| {
            q.checked_sub(step).filter(|&next| next >= floor)
        })
        .map(Quality)
    }

    /// Upper bound on encoder calls for one image.
    pub fn max_attempts(&self) -> usize {
        let (start, floor) = (self.start.value(), self.floor.value());
        if start < floor {
            1
        } else {
            ((start - floor) / self.step.max(1) + 1) as usize
        }
    }
}

impl Default for QualitySearch {
    fn default() -> Self {
        Self::new(95, 5, 20)
    }
}

/// Maximum number of bytes an encoded output may occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ByteBudget(u64);

impl ByteBudget {
    pub const MEGABYTE: u64 = 1024 * 1024;

    /// A budget of at least one byte.
    pub fn new(bytes: u64) -> Self {
        Self(bytes.max(1))
    }

    /// Budget from (possibly fractional) megabytes, 1 MB = 1024 × 1024 bytes.
    pub fn from_megabytes(megabytes: f64) -> Self {
        Self::new((megabytes * Self::MEGABYTE as f64).floor() as u64)
    }

    pub fn bytes(self) -> u64 {
        self.0
    }

    pub fn fits(self, len: usize) -> bool {
        len as u64 <= self.0
    }
}

impl Default for ByteBudget {
    fn default() -> Self {
        Self::from_megabytes(8.0)
    }
}

/// Lossy output container.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Jpeg,
    Avif,
}

impl OutputFormat {
    /// File extension written for this format (without the dot).
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Avif => "avif",
        }
    }

    /// Largest width or height the encoder accepts.
    pub fn max_edge(self) -> u32 {
        match self {
            OutputFormat::Jpeg | OutputFormat::Avif => u16::MAX as u32,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Jpeg => f.write_str("JPEG"),
            OutputFormat::Avif => f.write_str("AVIF"),
        }
    }
}

/// Interpolation filter used when resizing.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
pub enum ResampleFilter {
    #[default]
    #[serde(rename = "lanczos3")]
    #[value(name = "lanczos3")]
    Lanczos3,
    #[serde(rename = "catmull-rom")]
    #[value(name = "catmull-rom")]
    CatmullRom,
    #[serde(rename = "gaussian")]
    #[value(name = "gaussian")]
    Gaussian,
    #[serde(rename = "triangle")]
    #[value(name = "triangle")]
    Triangle,
    #[serde(rename = "nearest")]
    #[value(name = "nearest")]
    Nearest,
}

/// Parameters for converting one image: plan, resample, and budget search.
///
/// Built once per run and shared by reference; nothing in here changes
/// while a batch is running.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertSettings {
    pub policy: ResizePolicy,
    /// Pixel bound applied to the policy's governing edge.
    pub max_px: u32,
    pub rounding: Rounding,
    /// Skip resampling when the plan would enlarge the image.
    pub only_shrink: bool,
    pub filter: ResampleFilter,
    pub format: OutputFormat,
    pub budget: ByteBudget,
    pub search: QualitySearch,
}

impl Default for ConvertSettings {
    fn default() -> Self {
        Self {
            policy: ResizePolicy::LongestEdge,
            max_px: 4096,
            rounding: Rounding::Nearest,
            only_shrink: false,
            filter: ResampleFilter::Lanczos3,
            format: OutputFormat::Jpeg,
            budget: ByteBudget::default(),
            search: QualitySearch::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_clamps_to_valid_range() {
        assert_eq!(Quality::new(0).value(), 1);
        assert_eq!(Quality::new(50).value(), 50);
        assert_eq!(Quality::new(150).value(), 100);
    }

    #[test]
    fn default_search_levels() {
        let levels: Vec<u32> = QualitySearch::default().levels().map(Quality::value).collect();
        assert_eq!(levels.first(), Some(&95));
        assert_eq!(levels.last(), Some(&20));
        assert_eq!(levels.len(), 16);
        assert!(levels.windows(2).all(|w| w[0] - w[1] == 5));
    }

    #[test]
    fn search_stops_above_floor_when_step_overshoots() {
        let levels: Vec<u32> = QualitySearch::new(90, 30, 20).levels().map(Quality::value).collect();
        assert_eq!(levels, vec![90, 60, 30]);
    }

    #[test]
    fn search_does_not_underflow() {
        let levels: Vec<u32> = QualitySearch::new(10, 4, 1).levels().map(Quality::value).collect();
        assert_eq!(levels, vec![10, 6, 2]);
    }

    #[test]
    fn max_attempts_matches_levels() {
        for (start, step, floor) in [(95, 5, 20), (90, 30, 20), (50, 1, 50), (100, 7, 1), (20, 5, 40)] {
            let search = QualitySearch::new(start, step, floor);
            assert_eq!(search.max_attempts(), search.levels().count());
        }
    }

    #[test]
    fn start_below_floor_still_tries_start() {
        let search = QualitySearch::new(20, 5, 40);
        let levels: Vec<u32> = search.levels().map(Quality::value).collect();
        assert_eq!(levels, vec![20]);
        assert_eq!(search.max_attempts(), 1);
    }

    #[test]
    fn zero_step_is_treated_as_one() {
        assert_eq!(QualitySearch::new(22, 0, 20).levels().count(), 3);
    }

    #[test]
    fn budget_from_megabytes() {
        assert_eq!(ByteBudget::from_megabytes(8.0).bytes(), 8 * 1024 * 1024);
        assert_eq!(ByteBudget::from_megabytes(0.5).bytes(), 512 * 1024);
        assert_eq!(ByteBudget::from_megabytes(0.0).bytes(), 1);
    }

    #[test]
    fn budget_fits_is_inclusive() {
        let budget = ByteBudget::new(1000);
        assert!(budget.fits(999));
        assert!(budget.fits(1000));
        assert!(!budget.fits(1001));
    }

    #[test]
    fn format_extensions() {
        assert_eq!(OutputFormat::Jpeg.extension(), "jpg");
        assert_eq!(OutputFormat::Avif.extension(), "avif");
    }

    #[test]
    fn format_max_edge() {
        assert_eq!(OutputFormat::Jpeg.max_edge(), 65535);
        assert_eq!(OutputFormat::Avif.max_edge(), 65535);
    }

    #[test]
    fn filter_names_roundtrip_through_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            filter: ResampleFilter,
        }
        let w: Wrapper = toml::from_str(r#"filter = "catmull-rom""#).unwrap();
        assert_eq!(w.filter, ResampleFilter::CatmullRom);
    }
}
