//! Run configuration.
//!
//! Handles loading, validating, and merging `config.toml`. Stock defaults are
//! the base layer, a config file overrides them, and CLI flags override both.
//!
//! ## Config File Location
//!
//! By default `config.toml` is read from the source directory. `--config FILE`
//! points at an explicit file instead.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [resize]
//! policy = "longest-edge"   # longest-edge | shortest-edge | width | height
//! max_px = 4096             # Pixel bound for the governing edge
//! only_shrink = false       # Never enlarge images smaller than the bound
//! rounding = "nearest"      # nearest | truncate
//! filter = "lanczos3"       # lanczos3 | catmull-rom | gaussian | triangle | nearest
//!
//! [encoding]
//! format = "jpeg"           # jpeg | avif
//! max_size_mb = 8.0         # Byte budget per output file (1 MB = 1024 KiB)
//! start_quality = 95        # First quality tried
//! quality_step = 5          # Decrease per attempt
//! min_quality = 20          # Give up below this
//!
//! [batch]
//! extensions = ["png", "jpg", "jpeg", "webp", "bmp", "tif", "tiff"]
//! skip_existing = false     # Leave existing outputs alone
//! delete_input = false      # Remove sources after a successful write
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{
    ByteBudget, ConvertSettings, OutputFormat, QualitySearch, ResampleFilter, ResizePolicy,
    Rounding, supported_input_extensions,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// File name looked up in the source directory.
pub const CONFIG_FILENAME: &str = "config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Complete run configuration.
///
/// All fields have defaults. Config files need only specify the values they
/// want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FitConfig {
    /// Pixel bound and resize policy.
    pub resize: ResizeConfig,
    /// Output format and byte budget search.
    pub encoding: EncodingConfig,
    /// Discovery and bookkeeping for the batch.
    pub batch: BatchConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResizeConfig {
    pub policy: ResizePolicy,
    pub max_px: u32,
    pub only_shrink: bool,
    pub rounding: Rounding,
    pub filter: ResampleFilter,
}

impl Default for ResizeConfig {
    fn default() -> Self {
        Self {
            policy: ResizePolicy::LongestEdge,
            max_px: 4096,
            only_shrink: false,
            rounding: Rounding::Nearest,
            filter: ResampleFilter::Lanczos3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EncodingConfig {
    pub format: OutputFormat,
    pub max_size_mb: f64,
    pub start_quality: u32,
    pub quality_step: u32,
    pub min_quality: u32,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Jpeg,
            max_size_mb: 8.0,
            start_quality: 95,
            quality_step: 5,
            min_quality: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatchConfig {
    /// Input extensions, matched case-insensitively.
    pub extensions: Vec<String>,
    pub skip_existing: bool,
    pub delete_input: bool,
    /// Maximum number of parallel workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_processes: Option<usize>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            extensions: ["png", "jpg", "jpeg", "webp", "bmp", "tif", "tiff"]
                .iter()
                .map(|e| e.to_string())
                .collect(),
            skip_existing: false,
            delete_input: false,
            max_processes: None,
        }
    }
}

impl FitConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.resize.max_px == 0 {
            return Err(ConfigError::Validation(
                "resize.max_px must be a positive pixel count".into(),
            ));
        }
        let mb = self.encoding.max_size_mb;
        if !mb.is_finite() || mb <= 0.0 {
            return Err(ConfigError::Validation(
                "encoding.max_size_mb must be a positive number".into(),
            ));
        }
        let (start, step, floor) = (
            self.encoding.start_quality,
            self.encoding.quality_step,
            self.encoding.min_quality,
        );
        if !(1..=100).contains(&start) {
            return Err(ConfigError::Validation(
                "encoding.start_quality must be 1-100".into(),
            ));
        }
        if step == 0 {
            return Err(ConfigError::Validation(
                "encoding.quality_step must be at least 1".into(),
            ));
        }
        if floor == 0 || floor > start {
            return Err(ConfigError::Validation(
                "encoding.min_quality must be between 1 and start_quality".into(),
            ));
        }
        if self.batch.extensions.is_empty() {
            return Err(ConfigError::Validation(
                "batch.extensions must not be empty".into(),
            ));
        }
        let supported = supported_input_extensions();
        if let Some(ext) = self
            .batch
            .extensions
            .iter()
            .find(|ext| !supported.iter().any(|s| s.eq_ignore_ascii_case(ext)))
        {
            return Err(ConfigError::Validation(format!(
                "batch.extensions: no decoder for '{ext}' (supported: {})",
                supported.join(", ")
            )));
        }
        if self.batch.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "batch.max_processes must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Immutable per-image conversion settings derived from this config.
    pub fn convert_settings(&self) -> ConvertSettings {
        ConvertSettings {
            policy: self.resize.policy,
            max_px: self.resize.max_px,
            rounding: self.resize.rounding,
            only_shrink: self.resize.only_shrink,
            filter: self.resize.filter,
            format: self.encoding.format,
            budget: ByteBudget::from_megabytes(self.encoding.max_size_mb),
            search: QualitySearch::new(
                self.encoding.start_quality,
                self.encoding.quality_step,
                self.encoding.min_quality,
            ),
        }
    }
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &BatchConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(FitConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<FitConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: FitConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load `config.toml` from the given directory.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(dir: &Path) -> Result<FitConfig, ConfigError> {
    load_config_file(&dir.join(CONFIG_FILENAME))
}

/// Load an explicit config file; a missing file yields stock defaults.
pub fn load_config_file(path: &Path) -> Result<FitConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# imgfit Configuration
# =====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Place this file at <source>/config.toml or pass --config FILE.
# Command-line flags override values from this file.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Pixel bound
# ---------------------------------------------------------------------------
[resize]
# Which edge is set to max_px:
#   longest-edge  - the larger of width/height (square: width)
#   shortest-edge - the smaller of width/height (square: width)
#   width         - always the width
#   height        - always the height
policy = "longest-edge"

# Target length of the governing edge, in pixels.
max_px = 4096

# When true, images already within the bound are left at their size.
# When false, smaller images are enlarged to the bound.
only_shrink = false

# Rounding of the scaled edge: "nearest" (half up) or "truncate" (toward zero).
rounding = "nearest"

# Resampling filter: lanczos3, catmull-rom, gaussian, triangle, nearest.
filter = "lanczos3"

# ---------------------------------------------------------------------------
# File size budget
# ---------------------------------------------------------------------------
[encoding]
# Output container: "jpeg" (.jpg) or "avif" (.avif).
format = "jpeg"

# Maximum size of each output file in megabytes (1 MB = 1048576 bytes).
max_size_mb = 8.0

# Quality search: start high, step down until the file fits.
# Images that do not fit even at min_quality are reported as failures.
start_quality = 95
quality_step = 5
min_quality = 20

# ---------------------------------------------------------------------------
# Batch
# ---------------------------------------------------------------------------
[batch]
# Input file extensions (case-insensitive).
extensions = ["png", "jpg", "jpeg", "webp", "bmp", "tif", "tiff"]

# Leave images alone when their output file already exists.
skip_existing = false

# Delete each source image after its output has been written.
delete_input = false

# Maximum parallel workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
