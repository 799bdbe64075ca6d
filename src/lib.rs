//! # imgfit
//!
//! Batch image conversion under two constraints: a pixel bound on one edge
//! and a byte budget per output file.
//!
//! # Architecture: Core and Collaborator
//!
//! ```text
//! scan      input/   →  [SourceImage]         (walk, filter, mirror paths)
//! imaging   file     →  EncodedImage          (decode, plan, resample, budget-encode)
//! process   [images] →  output/ + BatchReport (parallel, isolated, atomic writes)
//! ```
//!
//! The [`imaging`] core is synchronous and touches no output files: it turns
//! one decoded image into an in-memory encoded buffer or a typed error. All
//! filesystem work, parallelism, skipping, deletion, and logging lives in
//! [`process`].
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | Dimension planning, resampling, and the quality search against a byte budget |
//! | [`scan`] | Source discovery and output path mirroring with collision detection |
//! | [`process`] | Batch driver: per-image isolation, atomic writes, progress events, reports |
//! | [`config`] | `config.toml` loading, validation, and merging over stock defaults |
//! | [`output`] | CLI output formatting for progress lines, plans, and summaries |
//!
//! # Design Decisions
//!
//! ## Integer Geometry
//!
//! Planned dimensions are computed with integer arithmetic on `u128`, so the
//! same input always yields the same output on every platform. Rounding is
//! round-half-up by default and truncation on request. A scaled edge never
//! drops below one pixel.
//!
//! ## Encode to Memory, Write Once
//!
//! Every quality attempt encodes into a buffer. Only the first buffer that
//! fits the budget is written, through a hidden sibling file and a rename.
//! An image that cannot meet the budget leaves nothing behind.
//!
//! ## Pure-Rust Codecs
//!
//! Decoding and JPEG/AVIF encoding use the `image` crate (with `rav1e` for
//! AVIF). The binary has no system library dependencies.

pub mod config;
pub mod imaging;
pub mod output;
pub mod process;
pub mod scan;

#[cfg(test)]
pub(crate) mod test_helpers;
