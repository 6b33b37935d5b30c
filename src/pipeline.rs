//! The request pipeline: fetch → normalize → transform.
//!
//! One call per HTTP request, strictly linear, no state shared between
//! invocations. The source client arrives as an injected dependency; the
//! pipeline owns nothing long-lived.
//!
//! Stage policy:
//! - Metadata is checked **before** any content fetch, so a request for a
//!   video or PDF costs one metadata round-trip, not a download.
//! - The thumbnail variant tries the provider's ready-made reduced
//!   representation first and falls back to the full asset, which the
//!   transform stage then reduces to the configured width.
//! - Normalization and transformation are CPU-bound; they run on a blocking
//!   worker so the async executor keeps serving other requests.

use crate::config::TransformConfig;
use crate::error::ProxyError;
use crate::imaging::{self, Quality};
use crate::source::AssetSource;
use tracing::debug;

/// Which source representation to serve, and which cache lifetime applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Variant {
    Thumbnail,
    #[default]
    Full,
}

impl Variant {
    /// Only the literal `thumbnail` (any case) selects the reduced
    /// fast path; absent or unrecognized values are full requests.
    pub fn from_query(raw: Option<&str>) -> Self {
        match raw {
            Some(v) if v.eq_ignore_ascii_case("thumbnail") => Variant::Thumbnail,
            _ => Variant::Full,
        }
    }
}

/// One caller request, parsed and defaulted by the HTTP layer.
#[derive(Debug, Clone)]
pub struct ImageRequest {
    pub identifier: String,
    pub variant: Variant,
    /// Maximum output width; 0 is treated as absent.
    pub width: Option<u32>,
    /// JPEG quality 1-100; out-of-range values fall back to the default.
    pub quality: Option<u32>,
}

/// Final payload ready for the response emitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServedImage {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Run the full pipeline for one request.
pub async fn serve_image(
    source: &dyn AssetSource,
    settings: &TransformConfig,
    request: ImageRequest,
) -> Result<ServedImage, ProxyError> {
    let meta = source.metadata(&request.identifier).await?;

    if !imaging::is_image(&meta.mime_type, meta.name.as_deref()) {
        return Err(ProxyError::UnsupportedType(format!(
            "asset {} is {}, not an image",
            request.identifier, meta.mime_type
        )));
    }

    let (raw, from_reduced) = match request.variant {
        Variant::Thumbnail => match source.reduced(&request.identifier).await {
            Ok(bytes) => (bytes, true),
            Err(err) => {
                debug!(
                    %err,
                    identifier = %request.identifier,
                    "reduced representation unavailable, falling back to full asset"
                );
                (source.content(&request.identifier).await?, false)
            }
        },
        Variant::Full => (source.content(&request.identifier).await?, false),
    };

    // A fallback thumbnail still needs reduction; use the configured width
    // when the caller gave none.
    let width = request.width.filter(|w| *w > 0).or_else(|| {
        (request.variant == Variant::Thumbnail && !from_reduced).then_some(settings.thumbnail_width)
    });
    let quality = request.quality;
    let fallback_quality = Quality::new(settings.default_quality).unwrap_or_default();
    let mime_type = meta.mime_type;
    let file_name = meta.name;

    tokio::task::spawn_blocking(move || {
        develop(
            raw,
            &mime_type,
            file_name.as_deref(),
            from_reduced,
            width,
            quality,
            fallback_quality,
        )
    })
    .await
    .map_err(|e| ProxyError::Internal(format!("image worker failed: {e}")))?
}

/// The synchronous pixel half of the pipeline: normalize, then transform.
fn develop(
    raw: Vec<u8>,
    mime_type: &str,
    file_name: Option<&str>,
    from_reduced: bool,
    width: Option<u32>,
    requested_quality: Option<u32>,
    fallback_quality: Quality,
) -> Result<ServedImage, ProxyError> {
    // Provider-generated thumbnails are already standard rasters even when
    // the asset's declared type is legacy; conversion would misfire on them.
    let (bytes, content_type) = if from_reduced {
        (raw, mime_type.to_string())
    } else {
        match imaging::normalize(&raw, mime_type, file_name)? {
            Some(jpeg) => (jpeg, imaging::JPEG_MIME.to_string()),
            None => (raw, mime_type.to_string()),
        }
    };

    // With no width and no quality requested there is nothing to transform.
    // The passthrough also makes the pipeline idempotent on its own output.
    if width.is_none() && requested_quality.is_none() {
        return Ok(ServedImage {
            bytes,
            content_type,
        });
    }

    let quality = Quality::resolve(requested_quality, fallback_quality);
    let out = imaging::best_effort(bytes, content_type, width, quality);
    Ok(ServedImage {
        bytes: out.bytes,
        content_type: out.content_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransformConfig;
    use crate::source::tests::MockSource;
    use crate::test_helpers::{dimensions_of, heif_family_bytes, jpeg_bytes, png_bytes};

    fn settings() -> TransformConfig {
        TransformConfig::default()
    }

    fn request(variant: Variant, width: Option<u32>, quality: Option<u32>) -> ImageRequest {
        ImageRequest {
            identifier: "asset-1".to_string(),
            variant,
            width,
            quality,
        }
    }

    #[test]
    fn variant_parsing_defaults_to_full() {
        assert_eq!(Variant::from_query(Some("thumbnail")), Variant::Thumbnail);
        assert_eq!(Variant::from_query(Some("THUMBNAIL")), Variant::Thumbnail);
        assert_eq!(Variant::from_query(Some("medium")), Variant::Full);
        assert_eq!(Variant::from_query(None), Variant::Full);
    }

    #[tokio::test]
    async fn non_image_fails_before_any_content_fetch() {
        let source = MockSource::with_asset("video/mp4", Some("clip.mp4"), vec![1, 2, 3]);

        let err = serve_image(&source, &settings(), request(Variant::Full, None, None))
            .await
            .unwrap_err();

        assert!(matches!(err, ProxyError::UnsupportedType(_)));
        assert_eq!(source.recorded(), vec!["metadata"]);
    }

    #[tokio::test]
    async fn missing_asset_surfaces_not_found() {
        let source = MockSource::default();

        let err = serve_image(&source, &settings(), request(Variant::Full, None, None))
            .await
            .unwrap_err();

        assert!(matches!(err, ProxyError::NotFound(_)));
    }

    #[tokio::test]
    async fn full_passthrough_leaves_standard_bytes_untouched() {
        let png = png_bytes(40, 30);
        let source = MockSource::with_asset("image/png", Some("shot.png"), png.clone());

        let served = serve_image(&source, &settings(), request(Variant::Full, None, None))
            .await
            .unwrap();

        assert_eq!(served.bytes, png);
        assert_eq!(served.content_type, "image/png");
        assert_eq!(source.recorded(), vec!["metadata", "content"]);
    }

    #[tokio::test]
    async fn thumbnail_serves_reduced_representation_as_is() {
        let thumb = png_bytes(32, 24);
        let source = MockSource::with_asset("image/png", Some("shot.png"), png_bytes(800, 600))
            .with_reduced(thumb.clone());

        let served = serve_image(&source, &settings(), request(Variant::Thumbnail, None, None))
            .await
            .unwrap();

        assert_eq!(served.bytes, thumb);
        assert_eq!(source.recorded(), vec!["metadata", "reduced"]);
    }

    #[tokio::test]
    async fn thumbnail_falls_back_to_full_and_reduces() {
        let source = MockSource::with_asset("image/png", Some("shot.png"), png_bytes(800, 600));

        let served = serve_image(&source, &settings(), request(Variant::Thumbnail, None, None))
            .await
            .unwrap();

        assert_eq!(source.recorded(), vec!["metadata", "reduced", "content"]);
        assert_eq!(served.content_type, "image/jpeg");
        // Reduced to the configured thumbnail width, aspect preserved
        assert_eq!(dimensions_of(&served.bytes), (400, 300));
    }

    #[tokio::test]
    async fn legacy_full_request_converts_to_jpeg() {
        let source = MockSource::with_asset(
            "image/heic",
            Some("photo.HEIC"),
            heif_family_bytes(64, 48),
        );

        let served = serve_image(&source, &settings(), request(Variant::Full, None, None))
            .await
            .unwrap();

        assert_eq!(served.content_type, "image/jpeg");
        assert!(!served.bytes.is_empty());
        assert_eq!(dimensions_of(&served.bytes), (64, 48));
    }

    #[tokio::test]
    async fn corrupt_legacy_asset_is_a_conversion_error() {
        let source =
            MockSource::with_asset("image/heic", Some("broken.heic"), vec![0u8; 200]);

        let err = serve_image(&source, &settings(), request(Variant::Full, None, None))
            .await
            .unwrap_err();

        assert!(matches!(err, ProxyError::Conversion(_)));
    }

    #[tokio::test]
    async fn rerunning_on_own_output_is_idempotent() {
        let source = MockSource::with_asset(
            "image/heic",
            Some("photo.heic"),
            heif_family_bytes(48, 48),
        );
        let first = serve_image(&source, &settings(), request(Variant::Full, None, None))
            .await
            .unwrap();

        let source = MockSource::with_asset("image/jpeg", Some("photo.jpg"), first.bytes.clone());
        let second = serve_image(&source, &settings(), request(Variant::Full, None, None))
            .await
            .unwrap();

        assert_eq!(second.bytes, first.bytes);
        assert_eq!(second.content_type, first.content_type);
    }

    #[tokio::test]
    async fn width_request_never_upscales() {
        let source = MockSource::with_asset("image/jpeg", Some("small.jpg"), jpeg_bytes(100, 80));

        let served = serve_image(&source, &settings(), request(Variant::Full, Some(5000), None))
            .await
            .unwrap();

        assert_eq!(dimensions_of(&served.bytes), (100, 80));
    }

    #[tokio::test]
    async fn zero_width_is_treated_as_absent() {
        let png = png_bytes(30, 30);
        let source = MockSource::with_asset("image/png", Some("shot.png"), png.clone());

        let served = serve_image(&source, &settings(), request(Variant::Full, Some(0), None))
            .await
            .unwrap();

        assert_eq!(served.bytes, png);
        assert_eq!(served.content_type, "image/png");
    }

    #[tokio::test]
    async fn quality_only_request_recompresses_to_jpeg() {
        let source = MockSource::with_asset("image/png", Some("shot.png"), png_bytes(60, 40));

        let served = serve_image(&source, &settings(), request(Variant::Full, None, Some(50)))
            .await
            .unwrap();

        assert_eq!(served.content_type, "image/jpeg");
        assert_eq!(dimensions_of(&served.bytes), (60, 40));
    }

    #[tokio::test]
    async fn transform_failure_degrades_to_fetched_bytes() {
        // Declared as an image but the bytes are garbage: normalization
        // passes them through (not legacy), the transform soft-fails, and
        // the caller still gets the original payload.
        let garbage = vec![0xCD; 96];
        let source = MockSource::with_asset("image/png", Some("odd.png"), garbage.clone());

        let served = serve_image(&source, &settings(), request(Variant::Full, Some(100), None))
            .await
            .unwrap();

        assert_eq!(served.bytes, garbage);
        assert_eq!(served.content_type, "image/png");
    }
}
