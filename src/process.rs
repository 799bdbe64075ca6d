//! Batch conversion of a source tree.
//!
//! Takes the images found by [`scan`](crate::scan), converts each one with
//! [`imaging::convert`](crate::imaging::convert), and writes the results into
//! the mirrored output tree.
//!
//! ## Per-image isolation
//!
//! Every image succeeds or fails on its own. A corrupt file, a budget that
//! cannot be met, or a write error is recorded in the [`BatchReport`] and
//! the batch moves on. Only problems that affect the whole run (missing
//! source directory, unwritable output root) abort with [`ProcessError`].
//!
//! ## Writes
//!
//! Encoded bytes are written to a hidden sibling file and renamed into place,
//! so a destination path only ever holds a complete image. Nothing is written
//! for an image that fails. With `delete_input`, the source is removed only
//! after its output has been renamed into place.
//!
//! ## Parallel Processing
//!
//! Images are processed in parallel using [rayon](https://docs.rs/rayon).
//! Progress is reported through an optional channel of [`ProcessEvent`]s so
//! the caller decides how to display it.

use crate::config::FitConfig;
use crate::imaging::{
    ConvertError, ConvertSettings, ImageBackend, PlannedImage, RustBackend, convert, plan_image,
};
use crate::scan::{self, PlannedOutput, ScanError};
use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::Sender;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Scan failed: {0}")]
    Scan(#[from] ScanError),
}

/// Failure of a single image; recorded, never propagated.
#[derive(Error, Debug)]
pub enum ImageError {
    #[error(transparent)]
    Convert(#[from] ConvertError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("output path already used by {0}")]
    OutputCollision(String),
}

impl ImageError {
    pub fn kind(&self) -> &'static str {
        match self {
            ImageError::Convert(e) => e.kind(),
            ImageError::Io(_) => "io",
            ImageError::OutputCollision(_) => "output-collision",
        }
    }
}

/// Configuration for a batch run.
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    pub settings: ConvertSettings,
    pub extensions: Vec<String>,
    pub skip_existing: bool,
    pub delete_input: bool,
}

impl ProcessConfig {
    /// Build a ProcessConfig from FitConfig values.
    pub fn from_config(config: &FitConfig) -> Self {
        Self {
            settings: config.convert_settings(),
            extensions: config.batch.extensions.clone(),
            skip_existing: config.batch.skip_existing,
            delete_input: config.batch.delete_input,
        }
    }
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self::from_config(&FitConfig::default())
    }
}

/// Outcome of one image.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum ImageStatus {
    Converted {
        source_width: u32,
        source_height: u32,
        width: u32,
        height: u32,
        resized: bool,
        quality: u32,
        bytes: u64,
        attempts: u32,
        input_deleted: bool,
    },
    Skipped,
    Failed {
        kind: String,
        message: String,
    },
}

/// Report line for one image. Paths are relative to their roots.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageReport {
    pub source: String,
    pub output: String,
    #[serde(flatten)]
    pub status: ImageStatus,
}

/// Totals plus one entry per image, in scan order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub converted: usize,
    pub skipped: usize,
    pub failed: usize,
    pub bytes_written: u64,
    pub images: Vec<ImageReport>,
}

impl BatchReport {
    pub fn from_images(images: Vec<ImageReport>) -> Self {
        let mut report = Self {
            converted: 0,
            skipped: 0,
            failed: 0,
            bytes_written: 0,
            images: Vec::new(),
        };
        for image in &images {
            match &image.status {
                ImageStatus::Converted { bytes, .. } => {
                    report.converted += 1;
                    report.bytes_written += bytes;
                }
                ImageStatus::Skipped => report.skipped += 1,
                ImageStatus::Failed { .. } => report.failed += 1,
            }
        }
        report.images = images;
        report
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Failed entries only.
    pub fn failures(&self) -> impl Iterator<Item = &ImageReport> {
        self.images
            .iter()
            .filter(|i| matches!(i.status, ImageStatus::Failed { .. }))
    }
}

/// Progress events emitted while a batch runs.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessEvent {
    Started {
        total: usize,
    },
    ImageFinished {
        /// Images finished so far, including this one.
        completed: usize,
        total: usize,
        report: ImageReport,
    },
}

/// Dry-run result for one image.
#[derive(Debug)]
pub struct PlanEntry {
    pub source: String,
    pub output: String,
    pub result: Result<PlannedImage, ImageError>,
}

pub fn process(
    source_root: &Path,
    output_root: &Path,
    config: &ProcessConfig,
    progress: Option<Sender<ProcessEvent>>,
) -> Result<BatchReport, ProcessError> {
    let backend = RustBackend::new();
    process_with_backend(&backend, source_root, output_root, config, progress)
}

/// Process images using a specific backend (allows testing with mock).
pub fn process_with_backend(
    backend: &impl ImageBackend,
    source_root: &Path,
    output_root: &Path,
    config: &ProcessConfig,
    progress: Option<Sender<ProcessEvent>>,
) -> Result<BatchReport, ProcessError> {
    if !source_root.is_dir() {
        return Err(ScanError::SourceNotFound(source_root.to_path_buf()).into());
    }
    // Must exist before the walk so a nested output root can be excluded
    fs::create_dir_all(output_root)?;
    let images = scan::scan(source_root, &config.extensions, Some(output_root))?;
    let planned = scan::plan_outputs(images, output_root, config.settings.format);
    let total = planned.len();

    tracing::info!(
        total,
        source = %source_root.display(),
        output = %output_root.display(),
        "starting batch"
    );
    if let Some(tx) = &progress {
        tx.send(ProcessEvent::Started { total }).ok();
    }

    let completed = AtomicUsize::new(0);
    let reports: Vec<ImageReport> = planned
        .par_iter()
        .map(|item| {
            let report = process_one(backend, item, output_root, config);
            let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
            if let Some(tx) = &progress {
                tx.send(ProcessEvent::ImageFinished {
                    completed: done,
                    total,
                    report: report.clone(),
                })
                .ok();
            }
            report
        })
        .collect();

    let report = BatchReport::from_images(reports);
    tracing::info!(
        converted = report.converted,
        skipped = report.skipped,
        failed = report.failed,
        bytes = report.bytes_written,
        "batch finished"
    );
    Ok(report)
}

/// Identify and plan every image without encoding or writing anything.
pub fn plan_batch(
    backend: &impl ImageBackend,
    source_root: &Path,
    output_root: &Path,
    config: &ProcessConfig,
) -> Result<Vec<PlanEntry>, ProcessError> {
    let images = scan::scan(source_root, &config.extensions, Some(output_root))?;
    let planned = scan::plan_outputs(images, output_root, config.settings.format);

    Ok(planned
        .par_iter()
        .map(|item| {
            let result = match &item.collides_with {
                Some(owner) => Err(ImageError::OutputCollision(display_path(owner))),
                None => plan_image(backend, &item.source.path, &config.settings)
                    .map_err(ImageError::from),
            };
            PlanEntry {
                source: display_path(&item.source.relative),
                output: relative_output(item, output_root),
                result,
            }
        })
        .collect())
}

/// Forward-slash relative path for reports.
fn display_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn relative_output(item: &PlannedOutput, output_root: &Path) -> String {
    display_path(item.output.strip_prefix(output_root).unwrap_or(&item.output))
}

fn process_one(
    backend: &impl ImageBackend,
    item: &PlannedOutput,
    output_root: &Path,
    config: &ProcessConfig,
) -> ImageReport {
    let source = display_path(&item.source.relative);
    let status = match convert_one(backend, item, config) {
        Ok(status) => status,
        Err(err) => {
            tracing::warn!(source = %source, kind = err.kind(), "{err}");
            ImageStatus::Failed {
                kind: err.kind().to_string(),
                message: err.to_string(),
            }
        }
    };
    ImageReport {
        source,
        output: relative_output(item, output_root),
        status,
    }
}

fn convert_one(
    backend: &impl ImageBackend,
    item: &PlannedOutput,
    config: &ProcessConfig,
) -> Result<ImageStatus, ImageError> {
    if let Some(owner) = &item.collides_with {
        return Err(ImageError::OutputCollision(display_path(owner)));
    }
    if config.skip_existing && item.output.exists() {
        tracing::debug!(output = %item.output.display(), "output exists, skipping");
        return Ok(ImageStatus::Skipped);
    }

    let conversion = convert(backend, &item.source.path, &config.settings)?;
    let encoded = &conversion.encoded;
    write_atomic(&item.output, &encoded.bytes)?;
    tracing::debug!(
        output = %item.output.display(),
        quality = encoded.quality.value(),
        attempts = encoded.attempts,
        bytes = encoded.len(),
        "wrote image"
    );

    let input_deleted = config.delete_input && delete_source(&item.source.path);

    Ok(ImageStatus::Converted {
        source_width: conversion.source.width,
        source_height: conversion.source.height,
        width: encoded.dimensions.width,
        height: encoded.dimensions.height,
        resized: conversion.resized,
        quality: encoded.quality.value(),
        bytes: encoded.len() as u64,
        attempts: encoded.attempts,
        input_deleted,
    })
}

/// Remove a source after its output is in place. Failure leaves the
/// conversion intact and is only logged.
fn delete_source(path: &Path) -> bool {
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(source = %path.display(), "could not delete input: {err}");
            false
        }
    }
}

/// Hidden sibling used while an output is being written.
fn partial_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.partial"))
}

/// Write `bytes` so that `path` only ever holds the complete file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let partial = partial_path(path);
    let result = fs::write(&partial, bytes).and_then(|()| fs::rename(&partial, path));
    if result.is_err() {
        fs::remove_file(&partial).ok();
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::ByteBudget;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use crate::imaging::{Dimensions, OutputFormat, ResampleFilter, ResizePolicy};
    use std::sync::mpsc;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"source").unwrap();
    }

    fn dirs() -> (TempDir, PathBuf, PathBuf) {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("input");
        let output = tmp.path().join("output");
        fs::create_dir_all(&source).unwrap();
        (tmp, source, output)
    }

    fn config_with_budget(bytes: u64) -> ProcessConfig {
        let mut config = ProcessConfig::default();
        config.settings.max_px = 200;
        config.settings.budget = ByteBudget::new(bytes);
        config
    }

    fn status_of<'a>(report: &'a BatchReport, source: &str) -> &'a ImageStatus {
        &report
            .images
            .iter()
            .find(|i| i.source == source)
            .unwrap_or_else(|| panic!("no report for {source}"))
            .status
    }

    // =========================================================================
    // ProcessConfig
    // =========================================================================

    #[test]
    fn process_config_default_values() {
        let config = ProcessConfig::default();
        assert_eq!(config.settings.max_px, 4096);
        assert_eq!(config.settings.budget.bytes(), 8 * 1024 * 1024);
        assert!(!config.skip_existing);
        assert!(!config.delete_input);
        assert!(config.extensions.contains(&"png".to_string()));
    }

    // =========================================================================
    // Process with mock backend
    // =========================================================================

    #[test]
    fn converts_and_mirrors_tree() {
        let (_tmp, source, output) = dirs();
        touch(&source.join("a.png"));
        touch(&source.join("sub/b.webp"));

        let backend = MockBackend::with_dimensions(800, 600);
        let report =
            process_with_backend(&backend, &source, &output, &config_with_budget(100_000), None)
                .unwrap();

        assert_eq!(report.converted, 2);
        assert_eq!(report.failed, 0);
        assert!(output.join("a.jpg").is_file());
        assert!(output.join("sub/b.jpg").is_file());
        assert_eq!(report.images[0].output, "a.jpg");
        assert_eq!(report.images[1].output, "sub/b.jpg");

        match status_of(&report, "a.png") {
            ImageStatus::Converted {
                width,
                height,
                quality,
                bytes,
                ..
            } => {
                assert_eq!((*width, *height), (200, 150));
                assert_eq!(*quality, 95);
                assert_eq!(*bytes, 9500);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(report.bytes_written, 19_000);
        assert_eq!(fs::read(output.join("a.jpg")).unwrap().len(), 9500);
    }

    #[test]
    fn corrupt_image_is_isolated() {
        let (_tmp, source, output) = dirs();
        for name in ["1.png", "2.png", "3.png", "4.png"] {
            touch(&source.join(name));
        }

        let backend = MockBackend::with_corrupt(&["3.png"]);
        let report =
            process_with_backend(&backend, &source, &output, &config_with_budget(100_000), None)
                .unwrap();

        assert_eq!(report.converted, 3);
        assert_eq!(report.failed, 1);
        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures[0].source, "3.png");
        assert!(matches!(
            &failures[0].status,
            ImageStatus::Failed { kind, .. } if kind == "encoding-failure"
        ));
        assert!(!output.join("3.jpg").exists());
    }

    #[test]
    fn unreachable_budget_writes_nothing() {
        let (_tmp, source, output) = dirs();
        touch(&source.join("a.png"));

        let backend = MockBackend::new();
        let report =
            process_with_backend(&backend, &source, &output, &config_with_budget(10), None)
                .unwrap();

        assert_eq!(report.failed, 1);
        assert!(matches!(
            status_of(&report, "a.png"),
            ImageStatus::Failed { kind, .. } if kind == "budget-unreachable"
        ));
        // Output root exists but holds no files, partial or otherwise
        assert_eq!(fs::read_dir(&output).unwrap().count(), 0);
        assert_eq!(backend.encode_calls().len(), 16);
    }

    #[test]
    fn skip_existing_leaves_output_untouched() {
        let (_tmp, source, output) = dirs();
        touch(&source.join("a.png"));
        touch(&source.join("b.png"));
        fs::create_dir_all(&output).unwrap();
        fs::write(output.join("a.jpg"), b"previous").unwrap();

        let mut config = config_with_budget(100_000);
        config.skip_existing = true;
        let backend = MockBackend::new();
        let report = process_with_backend(&backend, &source, &output, &config, None).unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(report.converted, 1);
        assert_eq!(status_of(&report, "a.png"), &ImageStatus::Skipped);
        assert_eq!(fs::read(output.join("a.jpg")).unwrap(), b"previous");
    }

    #[test]
    fn existing_output_is_replaced_without_skip() {
        let (_tmp, source, output) = dirs();
        touch(&source.join("a.png"));
        fs::create_dir_all(&output).unwrap();
        fs::write(output.join("a.jpg"), b"previous").unwrap();

        let backend = MockBackend::new();
        process_with_backend(&backend, &source, &output, &config_with_budget(100_000), None)
            .unwrap();
        assert_eq!(fs::read(output.join("a.jpg")).unwrap().len(), 9500);
    }

    #[test]
    fn delete_input_only_after_success() {
        let (_tmp, source, output) = dirs();
        touch(&source.join("good.png"));
        touch(&source.join("bad.png"));

        let mut config = config_with_budget(100_000);
        config.delete_input = true;
        let backend = MockBackend::with_corrupt(&["bad.png"]);
        let report = process_with_backend(&backend, &source, &output, &config, None).unwrap();

        assert!(!source.join("good.png").exists());
        assert!(source.join("bad.png").exists());
        assert!(matches!(
            status_of(&report, "good.png"),
            ImageStatus::Converted {
                input_deleted: true,
                ..
            }
        ));
    }

    #[test]
    fn colliding_outputs_fail_the_later_source() {
        let (_tmp, source, output) = dirs();
        touch(&source.join("a.jpg"));
        touch(&source.join("a.png"));

        let backend = MockBackend::new();
        let report =
            process_with_backend(&backend, &source, &output, &config_with_budget(100_000), None)
                .unwrap();

        assert_eq!(report.converted, 1);
        assert!(matches!(
            status_of(&report, "a.png"),
            ImageStatus::Failed { kind, .. } if kind == "output-collision"
        ));
        // Only one decode happened
        let decodes = backend
            .get_operations()
            .into_iter()
            .filter(|op| matches!(op, RecordedOp::Decode(_)))
            .count();
        assert_eq!(decodes, 1);
    }

    #[test]
    fn output_inside_source_is_not_reprocessed() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().to_path_buf();
        let output = source.join("converted");
        touch(&source.join("a.png"));

        let backend = MockBackend::new();
        let config = config_with_budget(100_000);
        process_with_backend(&backend, &source, &output, &config, None).unwrap();
        let second = process_with_backend(&backend, &source, &output, &config, None).unwrap();

        assert_eq!(second.images.len(), 1);
        assert_eq!(second.images[0].source, "a.png");
    }

    #[test]
    fn progress_events_count_every_image() {
        let (_tmp, source, output) = dirs();
        for name in ["a.png", "b.png", "c.png"] {
            touch(&source.join(name));
        }

        let (tx, rx) = mpsc::channel();
        let backend = MockBackend::new();
        process_with_backend(
            &backend,
            &source,
            &output,
            &config_with_budget(100_000),
            Some(tx),
        )
        .unwrap();

        let events: Vec<ProcessEvent> = rx.iter().collect();
        assert_eq!(events[0], ProcessEvent::Started { total: 3 });
        let mut completed: Vec<usize> = events[1..]
            .iter()
            .map(|e| match e {
                ProcessEvent::ImageFinished {
                    completed, total, ..
                } => {
                    assert_eq!(*total, 3);
                    *completed
                }
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        completed.sort();
        assert_eq!(completed, vec![1, 2, 3]);
    }

    #[test]
    fn missing_source_is_batch_error() {
        let tmp = TempDir::new().unwrap();
        let backend = MockBackend::new();
        let result = process_with_backend(
            &backend,
            &tmp.path().join("missing"),
            &tmp.path().join("out"),
            &ProcessConfig::default(),
            None,
        );
        assert!(matches!(
            result,
            Err(ProcessError::Scan(ScanError::SourceNotFound(_)))
        ));
        assert!(!tmp.path().join("out").exists());
    }

    #[test]
    fn oversized_target_fails_only_that_image() {
        let (_tmp, source, output) = dirs();
        touch(&source.join("a_normal.png"));
        touch(&source.join("strip.png"));

        let mut backend = MockBackend::with_dimensions(800, 600);
        backend
            .dims_by_name
            .insert("strip.png".into(), Dimensions::new(1, 20_000));
        let mut config = config_with_budget(100_000);
        config.settings.policy = ResizePolicy::ShortestEdge;
        config.settings.max_px = 100;

        let report = process_with_backend(&backend, &source, &output, &config, None).unwrap();

        assert_eq!(report.converted, 1);
        assert!(output.join("a_normal.jpg").is_file());
        assert!(matches!(
            status_of(&report, "strip.png"),
            ImageStatus::Failed { kind, .. } if kind == "target-too-large"
        ));
        assert!(!output.join("strip.jpg").exists());
        // 1x20000 would plan 100x2000000; only the normal image is resampled
        let resizes: Vec<_> = backend
            .get_operations()
            .into_iter()
            .filter(|op| matches!(op, RecordedOp::Resize { .. }))
            .collect();
        assert_eq!(
            resizes,
            vec![RecordedOp::Resize {
                width: 133,
                height: 100,
                filter: ResampleFilter::Lanczos3,
            }]
        );
    }

    #[test]
    fn avif_format_changes_extension() {
        let (_tmp, source, output) = dirs();
        touch(&source.join("a.png"));

        let mut config = config_with_budget(100_000);
        config.settings.format = OutputFormat::Avif;
        let backend = MockBackend::new();
        process_with_backend(&backend, &source, &output, &config, None).unwrap();
        assert!(output.join("a.avif").is_file());
    }

    // =========================================================================
    // plan_batch
    // =========================================================================

    #[test]
    fn plan_batch_identifies_without_encoding() {
        let (_tmp, source, output) = dirs();
        touch(&source.join("big.png"));
        touch(&source.join("small.png"));

        let mut backend = MockBackend::with_dimensions(1000, 500);
        backend
            .dims_by_name
            .insert("small.png".into(), Dimensions::new(100, 50));
        let mut config = config_with_budget(100_000);
        config.settings.only_shrink = true;

        let entries = plan_batch(&backend, &source, &output, &config).unwrap();
        assert_eq!(entries.len(), 2);
        let big = entries[0].result.as_ref().unwrap();
        assert_eq!(big.target, Some(Dimensions::new(200, 100)));
        let small = entries[1].result.as_ref().unwrap();
        assert_eq!(small.target, None);

        assert!(
            backend
                .get_operations()
                .iter()
                .all(|op| matches!(op, RecordedOp::Identify(_)))
        );
        assert!(!output.exists());
    }

    // =========================================================================
    // Report
    // =========================================================================

    #[test]
    fn report_serializes_with_status_tag() {
        let report = BatchReport::from_images(vec![
            ImageReport {
                source: "a.png".into(),
                output: "a.jpg".into(),
                status: ImageStatus::Skipped,
            },
            ImageReport {
                source: "b.png".into(),
                output: "b.jpg".into(),
                status: ImageStatus::Failed {
                    kind: "budget-unreachable".into(),
                    message: "too big".into(),
                },
            },
        ]);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["skipped"], 1);
        assert_eq!(json["failed"], 1);
        assert_eq!(json["images"][0]["status"], "skipped");
        assert_eq!(json["images"][1]["status"], "failed");
        assert_eq!(json["images"][1]["kind"], "budget-unreachable");
        assert_eq!(json["images"][1]["source"], "b.png");
    }

    #[test]
    fn write_atomic_leaves_no_partial_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested/out.jpg");
        write_atomic(&path, b"data").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"data");
        let names: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);
    }
}
