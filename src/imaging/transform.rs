//! Resize and recompression.
//!
//! The final pixel stage: decode the (already normalized) bytes, apply an
//! optional width-bounded downscale with Lanczos3 resampling, and re-encode
//! as JPEG at the requested quality.
//!
//! ## Best-effort compression
//!
//! This stage never fails a request. If decode, resize, or encode goes wrong
//! (corrupt pixel data, an exotic color space), [`best_effort`] logs and
//! returns the untouched input bytes with their original content type. A
//! diary page with a full-size photo beats an error page with none, so
//! availability wins over optimality here. Contrast with
//! [`normalize`](super::normalize), where fallback would serve undecodable
//! bytes and failure is therefore hard.

use super::calculations::calculate_fit_width;
use super::params::Quality;
use image::DynamicImage;
use image::imageops::FilterType;
use thiserror::Error;
use tracing::warn;

/// MIME type of everything this stage emits.
pub const JPEG_MIME: &str = "image/jpeg";

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("decode failed: {0}")]
    Decode(image::ImageError),
    #[error("encode failed: {0}")]
    Encode(image::ImageError),
}

/// Final bytes plus the content type they should be served under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transformed {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Resize/recompress, degrading to the input on failure.
///
/// On success the output is JPEG at `quality`, downscaled to `target_width`
/// when one is given (never upscaled). On any failure the input bytes and
/// `content_type` come back unchanged.
pub fn best_effort(
    bytes: Vec<u8>,
    content_type: String,
    target_width: Option<u32>,
    quality: Quality,
) -> Transformed {
    match reencode(&bytes, target_width, quality) {
        Ok(out) => Transformed {
            bytes: out,
            content_type: JPEG_MIME.to_string(),
        },
        Err(err) => {
            warn!(%err, "transform failed, serving untransformed bytes");
            Transformed {
                bytes,
                content_type,
            }
        }
    }
}

fn reencode(
    bytes: &[u8],
    target_width: Option<u32>,
    quality: Quality,
) -> Result<Vec<u8>, TransformError> {
    let img = image::load_from_memory(bytes).map_err(TransformError::Decode)?;

    let img = match target_width {
        Some(w) if w < img.width() => {
            let (out_w, out_h) = calculate_fit_width((img.width(), img.height()), w);
            img.resize_exact(out_w, out_h, FilterType::Lanczos3)
        }
        _ => img,
    };

    encode_jpeg(&img, quality).map_err(TransformError::Encode)
}

/// Encode to in-memory JPEG at the given quality.
pub(crate) fn encode_jpeg(img: &DynamicImage, quality: Quality) -> Result<Vec<u8>, image::ImageError> {
    let mut out = Vec::new();
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(
        std::io::Cursor::new(&mut out),
        quality.value() as u8,
    );
    img.write_with_encoder(encoder)?;
    Ok(out)
}
