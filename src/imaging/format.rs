//! Encoding detection.
//!
//! Two predicates over declared metadata, both pure:
//!
//! - [`detect_legacy`] — does this asset belong to the high-efficiency
//!   photographic family (HEIC/HEIF/AVIF) that browsers cannot be relied on
//!   to decode? Matches on the declared MIME type OR the filename extension,
//!   case-insensitively, so an `application/octet-stream` upload named
//!   `IMG_0042.HEIC` is still caught.
//! - [`is_image`] — is this asset an image at all? Used as a gate before
//!   fetching content, so non-image assets fail fast without spending
//!   bandwidth.
//!
//! All known formats live in the tables below; call sites never match on
//! strings directly.

/// A photographic encoding that requires conversion before clients can
/// render it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyEncoding {
    Heic,
    Heif,
    Avif,
}

/// Declared MIME types that mark an asset as legacy-encoded.
const LEGACY_MIME_TYPES: &[(&str, LegacyEncoding)] = &[
    ("image/heic", LegacyEncoding::Heic),
    ("image/heic-sequence", LegacyEncoding::Heic),
    ("image/heif", LegacyEncoding::Heif),
    ("image/heif-sequence", LegacyEncoding::Heif),
    ("image/avif", LegacyEncoding::Avif),
];

/// Filename extensions that mark an asset as legacy-encoded.
const LEGACY_EXTENSIONS: &[(&str, LegacyEncoding)] = &[
    ("heic", LegacyEncoding::Heic),
    ("heif", LegacyEncoding::Heif),
    ("hif", LegacyEncoding::Heif),
    ("avif", LegacyEncoding::Avif),
];

/// Extensions accepted as images by the pre-fetch gate, for sources that
/// declare an unhelpful MIME type. Standard raster formats plus the legacy
/// family.
const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "tif", "tiff", "bmp", "heic", "heif", "hif", "avif",
];

/// Detect whether an asset is legacy-encoded, by declared MIME type or
/// filename extension (either suffices).
pub fn detect_legacy(mime_type: &str, file_name: Option<&str>) -> Option<LegacyEncoding> {
    let mime = mime_type.trim();
    if let Some((_, enc)) = LEGACY_MIME_TYPES
        .iter()
        .find(|(candidate, _)| mime.eq_ignore_ascii_case(candidate))
    {
        return Some(*enc);
    }

    let ext = file_name.and_then(extension)?;
    LEGACY_EXTENSIONS
        .iter()
        .find(|(candidate, _)| ext.eq_ignore_ascii_case(candidate))
        .map(|(_, enc)| *enc)
}

/// Does the declared MIME type or filename extension indicate an image?
pub fn is_image(mime_type: &str, file_name: Option<&str>) -> bool {
    if mime_type.trim().to_ascii_lowercase().starts_with("image/") {
        return true;
    }
    file_name
        .and_then(extension)
        .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|e| ext.eq_ignore_ascii_case(e)))
}

fn extension(file_name: &str) -> Option<&str> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    // ".heic" or "photo." have no meaningful extension
    (!stem.is_empty() && !ext.is_empty()).then_some(ext)
}
