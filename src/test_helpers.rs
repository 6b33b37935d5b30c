//! Shared test utilities for the darkroom test suite.
//!
//! Fixture images are synthesized in memory with the `image` crate — no
//! binary blobs in the repository. The gradient fill keeps encoders honest:
//! flat-color images compress to nearly nothing and hide resize bugs.

use image::{DynamicImage, RgbImage};

/// A deterministic gradient image.
pub fn gradient(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    }))
}

/// PNG-encoded gradient.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut out = Vec::new();
    gradient(width, height)
        .write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
        .unwrap();
    out
}

/// JPEG-encoded gradient.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut out = Vec::new();
    gradient(width, height)
        .write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Jpeg)
        .unwrap();
    out
}

/// An AV1-coded HEIF-family container.
///
/// The normalizer's decode path treats AVIF and AV1-coded HEIC identically,
/// so these bytes stand in for either when paired with the right declared
/// MIME type or filename.
pub fn heif_family_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut out = Vec::new();
    let encoder = image::codecs::avif::AvifEncoder::new_with_speed_quality(
        std::io::Cursor::new(&mut out),
        6,
        85,
    );
    gradient(width, height).write_with_encoder(encoder).unwrap();
    out
}

/// Decoded dimensions of an encoded image.
pub fn dimensions_of(bytes: &[u8]) -> (u32, u32) {
    let img = image::load_from_memory(bytes).unwrap();
    (img.width(), img.height())
}
