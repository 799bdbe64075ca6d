//! Source discovery and output path planning.
//!
//! Walks the source tree for images with a supported extension and mirrors
//! each relative path into the output tree, swapping the extension for the
//! output format's:
//!
//! ```text
//! input/                         output/
//! ├── 001.png                →   ├── 001.jpg
//! ├── portraits/             →   ├── portraits/
//! │   ├── a.PNG              →   │   ├── a.jpg
//! │   └── b.webp             →   │   └── b.jpg
//! └── notes.txt                  (ignored: not an image)
//! ```
//!
//! ## Rules
//!
//! - Extensions are matched case-insensitively.
//! - Hidden entries (leading `.`) are skipped, including directories.
//! - An output directory nested inside the source is never scanned.
//! - Results are sorted by relative path so batches are reproducible.
//! - Two sources that map to the same output (`a.png`, `a.webp`) collide;
//!   the first in sorted order keeps the path.

use crate::imaging::OutputFormat;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Source directory not found: {0}")]
    SourceNotFound(PathBuf),
}

/// One discovered source image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    /// Path used to open the file.
    pub path: PathBuf,
    /// Path relative to the source root.
    pub relative: PathBuf,
}

/// A source paired with its destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedOutput {
    pub source: SourceImage,
    pub output: PathBuf,
    /// Relative path of the earlier source that already claimed `output`.
    pub collides_with: Option<PathBuf>,
}

/// Case-insensitive extension check.
pub fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|want| want.eq_ignore_ascii_case(ext)))
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'))
}

/// Discover source images under `source_root`.
///
/// `exclude` names a directory (typically the output root) whose contents are
/// never returned, even when it lives inside the source tree.
pub fn scan(
    source_root: &Path,
    extensions: &[String],
    exclude: Option<&Path>,
) -> Result<Vec<SourceImage>, ScanError> {
    if !source_root.is_dir() {
        return Err(ScanError::SourceNotFound(source_root.to_path_buf()));
    }
    let root = source_root.canonicalize()?;
    let exclude = exclude.and_then(|p| p.canonicalize().ok());

    let walker = WalkDir::new(&root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            !is_hidden(entry) && exclude.as_deref().is_none_or(|ex| entry.path() != ex)
        });

    let mut images = Vec::new();
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() || !has_extension(entry.path(), extensions) {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(&root)
            .unwrap_or(entry.path())
            .to_path_buf();
        images.push(SourceImage {
            path: entry.into_path(),
            relative,
        });
    }

    images.sort_by(|a, b| a.relative.cmp(&b.relative));
    Ok(images)
}

/// Mirror a relative source path into the output tree.
pub fn output_path(output_root: &Path, relative: &Path, format: OutputFormat) -> PathBuf {
    output_root.join(relative).with_extension(format.extension())
}

/// Pair every source with its output path and flag collisions.
pub fn plan_outputs(
    images: Vec<SourceImage>,
    output_root: &Path,
    format: OutputFormat,
) -> Vec<PlannedOutput> {
    let mut claimed: HashMap<PathBuf, PathBuf> = HashMap::new();

    images
        .into_iter()
        .map(|source| {
            let output = output_path(output_root, &source.relative, format);
            let collides_with = match claimed.get(&output) {
                Some(owner) => Some(owner.clone()),
                None => {
                    claimed.insert(output.clone(), source.relative.clone());
                    None
                }
            };
            PlannedOutput {
                source,
                output,
                collides_with,
            }
        })
        .collect()
}
