//! Image processing — pure Rust, zero external dependencies.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Detect legacy encodings** | typed tables over MIME type + extension |
//! | **HEIF-family decode** | `avif-parse` (container) + `rav1d` (AV1) + custom YUV→RGB |
//! | **Resize** | `image::imageops` Lanczos3, width-bounded, no upscaling |
//! | **Recompress** | `image` JPEG encoder, quality-driven |
//!
//! The module is split into:
//! - **Calculations**: pure functions for dimension math (unit testable)
//! - **Parameters**: the [`Quality`] knob and its range policy
//! - **Format**: detection predicates over declared metadata
//! - **Normalize**: legacy-format conversion to baseline JPEG
//! - **Transform**: resize + recompress with the best-effort policy

pub mod calculations;
pub mod format;
pub mod normalize;
mod params;
pub mod transform;

pub use calculations::calculate_fit_width;
pub use format::{LegacyEncoding, detect_legacy, is_image};
pub use normalize::{NormalizeError, normalize};
pub use params::Quality;
pub use transform::{JPEG_MIME, Transformed, best_effort};
