//! Image processing — planning, resampling, and budget-constrained encoding.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::image_dimensions` |
//! | **Plan** | [`plan`] — pure integer geometry per [`ResizePolicy`] |
//! | **Resample** | `resize_exact` with a configurable [`ResampleFilter`] |
//! | **Encode** | JPEG or AVIF into memory, searched by [`encode_within_budget`] |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing a conversion
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining calculations + backend

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, ImageBackend};
pub use calculations::{
    Axis, Dimensions, PlanError, ResizePolicy, Rounding, governing_axis, plan, resize_target,
};
pub use operations::{
    ConvertError, Conversion, EncodedImage, PlannedImage, convert, encode_within_budget,
    plan_image,
};
pub use params::{ByteBudget, ConvertSettings, OutputFormat, Quality, QualitySearch, ResampleFilter};
pub use rust_backend::{RustBackend, supported_input_extensions};
