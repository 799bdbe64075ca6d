//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Convert
//!
//! One line per finished image, in completion order. The counter shows how
//! many images are done out of the batch total:
//!
//! ```text
//! Converting 120 images
//! [001/120] 001.png → 001.jpg  2048x1536 q95 1.2 MB
//! [002/120] portraits/a.png → portraits/a.jpg  2048x1536 q85 7.6 MB
//! [003/120] b.png: skipped (output exists)
//! [004/120] c.png: FAILED budget-unreachable: …
//!
//! Converted 118, skipped 1, failed 1 — 812.4 MB written
//! ```
//!
//! ## Plan
//!
//! ```text
//! a.png  4096x3072 → 2048x1536
//! b.png  800x600 (unchanged)
//! c.png: FAILED encoding-failure: …
//! ```
//!
//! # Architecture
//!
//! Each stage has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure —
//! no I/O, no side effects.

use crate::process::{BatchReport, ImageReport, ImageStatus, PlanEntry, ProcessEvent};

// ============================================================================
// Shared helpers
// ============================================================================

/// Zero-padded counter, padded to the width of `total`.
fn format_counter(completed: usize, total: usize) -> String {
    let width = total.to_string().len().max(3);
    format!("[{completed:0>width$}/{total:0>width$}]")
}

/// Human-readable byte count (base 1024, one decimal above bytes).
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

/// Format a single image result without the counter prefix.
pub fn format_image_report(report: &ImageReport) -> String {
    match &report.status {
        ImageStatus::Converted {
            width,
            height,
            quality,
            bytes,
            ..
        } => format!(
            "{} \u{2192} {}  {}x{} q{} {}",
            report.source,
            report.output,
            width,
            height,
            quality,
            format_bytes(*bytes)
        ),
        ImageStatus::Skipped => format!("{}: skipped (output exists)", report.source),
        ImageStatus::Failed { kind, message } => {
            format!("{}: FAILED {}: {}", report.source, kind, message)
        }
    }
}

// ============================================================================
// Convert output
// ============================================================================

/// Format a single process progress event as display lines.
pub fn format_process_event(event: &ProcessEvent) -> Vec<String> {
    match event {
        ProcessEvent::Started { total } => match total {
            0 => vec!["No images found".to_string()],
            1 => vec!["Converting 1 image".to_string()],
            n => vec![format!("Converting {n} images")],
        },
        ProcessEvent::ImageFinished {
            completed,
            total,
            report,
        } => vec![format!(
            "{} {}",
            format_counter(*completed, *total),
            format_image_report(report)
        )],
    }
}

/// Format the end-of-batch summary.
pub fn format_summary(report: &BatchReport) -> Vec<String> {
    vec![
        String::new(),
        format!(
            "Converted {}, skipped {}, failed {} \u{2014} {} written",
            report.converted,
            report.skipped,
            report.failed,
            format_bytes(report.bytes_written)
        ),
    ]
}

pub fn print_summary(report: &BatchReport) {
    for line in format_summary(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Plan output
// ============================================================================

/// Format one dry-run entry.
pub fn format_plan_entry(entry: &PlanEntry) -> String {
    match &entry.result {
        Ok(planned) => match planned.target {
            Some(target) => format!("{}  {} \u{2192} {}", entry.source, planned.source, target),
            None => format!("{}  {} (unchanged)", entry.source, planned.source),
        },
        Err(err) => format!("{}: FAILED {}: {}", entry.source, err.kind(), err),
    }
}

pub fn format_plan(entries: &[PlanEntry]) -> Vec<String> {
    if entries.is_empty() {
        return vec!["No images found".to_string()];
    }
    let resized = entries
        .iter()
        .filter(|e| matches!(&e.result, Ok(p) if p.target.is_some()))
        .count();
    let mut lines: Vec<String> = entries.iter().map(format_plan_entry).collect();
    lines.push(String::new());
    lines.push(format!(
        "{} images, {} to resize",
        entries.len(),
        resized
    ));
    lines
}

pub fn print_plan(entries: &[PlanEntry]) {
    for line in format_plan(entries) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
