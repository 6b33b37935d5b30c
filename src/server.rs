//! HTTP surface and response emission.
//!
//! Three routes:
//! - `GET /images/:identifier` — the image pipeline. Query parameters
//!   `variant` (thumbnail|full), `width`, `quality`, all optional.
//! - `GET /images/:identifier/info` — asset metadata as JSON, with
//!   ready-made proxy URLs for both variants.
//! - `GET /health` — liveness probe.
//!
//! ## Image response header contract
//!
//! Emitted exactly, for compatibility with the diary frontend and any CDN
//! in front of it:
//! - `Content-Type`: the final encoding (JPEG after conversion/transform,
//!   the declared type on passthrough or best-effort fallback)
//! - `Cache-Control`: `public, max-age=2592000` for thumbnails (30 days),
//!   `public, max-age=31536000` for full images (1 year) — assets are
//!   immutable in practice, thumbnails churn only when covers change
//! - `Access-Control-Allow-Origin: *` — images are deliberately
//!   cross-origin-fetchable
//! - `Content-Length`: exact payload size

use crate::config::{AppConfig, CacheConfig};
use crate::error::ProxyError;
use crate::imaging;
use crate::pipeline::{self, ImageRequest, ServedImage, Variant};
use crate::source::AssetSource;
use axum::extract::{Path, Query, State};
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_ORIGIN, CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE,
};
use axum::http::{HeaderName, HeaderValue};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;

/// Long-lived dependencies shared by all requests.
#[derive(Clone)]
pub struct AppState {
    pub source: Arc<dyn AssetSource>,
    pub config: Arc<AppConfig>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/images/:identifier", get(image_handler))
        .route("/images/:identifier/info", get(info_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Bind and serve until SIGINT/SIGTERM.
pub async fn serve(config: AppConfig, source: Arc<dyn AssetSource>) -> std::io::Result<()> {
    let address = format!("{}:{}", config.server.host, config.server.port);
    let app = router(AppState {
        source,
        config: Arc::new(config),
    });

    let listener = TcpListener::bind(&address).await?;
    info!("listening on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
        info!("received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
        info!("received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[derive(Debug, Deserialize)]
struct ImageQuery {
    variant: Option<String>,
    width: Option<u32>,
    quality: Option<u32>,
}

async fn image_handler(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
    Query(query): Query<ImageQuery>,
) -> Result<Response, ProxyError> {
    let variant = Variant::from_query(query.variant.as_deref());
    let served = pipeline::serve_image(
        state.source.as_ref(),
        &state.config.transform,
        ImageRequest {
            identifier,
            variant,
            width: query.width,
            quality: query.quality,
        },
    )
    .await?;

    Ok(image_response(served, variant, &state.config.cache))
}

/// Asset metadata plus proxy URLs, mirroring what the diary frontend needs
/// to build a gallery entry.
async fn info_handler(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> Result<Json<serde_json::Value>, ProxyError> {
    let meta = state.source.metadata(&identifier).await?;
    let is_image = imaging::is_image(&meta.mime_type, meta.name.as_deref());

    Ok(Json(json!({
        "identifier": identifier,
        "name": meta.name,
        "mimeType": meta.mime_type,
        "size": meta.size,
        "isImage": is_image,
        "thumbnailUrl": format!("/images/{identifier}?variant=thumbnail"),
        "fullUrl": format!("/images/{identifier}"),
    })))
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Attach the image header contract to the final payload.
fn image_response(served: ServedImage, variant: Variant, cache: &CacheConfig) -> Response {
    let headers: [(HeaderName, HeaderValue); 4] = [
        (
            CONTENT_TYPE,
            header_value(&served.content_type, "application/octet-stream"),
        ),
        (
            CACHE_CONTROL,
            header_value(&cache_control(variant, cache), "no-store"),
        ),
        (ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*")),
        (
            CONTENT_LENGTH,
            header_value(&served.bytes.len().to_string(), "0"),
        ),
    ];
    (headers, served.bytes).into_response()
}

fn cache_control(variant: Variant, cache: &CacheConfig) -> String {
    let max_age = match variant {
        Variant::Thumbnail => cache.thumbnail_max_age_secs,
        Variant::Full => cache.full_max_age_secs,
    };
    format!("public, max-age={max_age}")
}

fn header_value(value: &str, fallback: &'static str) -> HeaderValue {
    HeaderValue::from_str(value).unwrap_or_else(|_| HeaderValue::from_static(fallback))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::tests::MockSource;
    use crate::test_helpers::{dimensions_of, png_bytes};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn app(source: MockSource) -> Router {
        router(AppState {
            source: Arc::new(source),
            config: Arc::new(AppConfig::default()),
        })
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[test]
    fn cache_control_lifetimes_match_contract() {
        let cache = CacheConfig::default();
        assert_eq!(
            cache_control(Variant::Thumbnail, &cache),
            "public, max-age=2592000"
        );
        assert_eq!(
            cache_control(Variant::Full, &cache),
            "public, max-age=31536000"
        );
    }

    #[tokio::test]
    async fn full_image_carries_the_header_contract() {
        let source = MockSource::with_asset("image/png", Some("shot.png"), png_bytes(800, 600));

        let response = app(source)
            .oneshot(get_request("/images/abc?width=100"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers().clone();
        assert_eq!(headers[CONTENT_TYPE.as_str()], "image/jpeg");
        assert_eq!(headers[CACHE_CONTROL.as_str()], "public, max-age=31536000");
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN.as_str()], "*");

        let body = body_bytes(response).await;
        assert_eq!(
            headers[CONTENT_LENGTH.as_str()],
            body.len().to_string().as_str()
        );
        let (width, _) = dimensions_of(&body);
        assert_eq!(width, 100);
    }

    #[tokio::test]
    async fn thumbnail_variant_uses_the_shorter_cache_lifetime() {
        let source = MockSource::with_asset("image/png", Some("shot.png"), png_bytes(800, 600))
            .with_reduced(png_bytes(32, 24));

        let response = app(source)
            .oneshot(get_request("/images/abc?variant=thumbnail"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[CACHE_CONTROL.as_str()],
            "public, max-age=2592000"
        );
    }

    #[tokio::test]
    async fn missing_asset_is_404_with_json_error() {
        let response = app(MockSource::default())
            .oneshot(get_request("/images/nope"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: serde_json::Value =
            serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert!(body["error"].as_str().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn non_image_asset_is_400() {
        let source = MockSource::with_asset("application/pdf", Some("doc.pdf"), vec![1, 2]);

        let response = app(source)
            .oneshot(get_request("/images/doc"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn info_reports_metadata_and_proxy_urls() {
        let source = MockSource::with_asset("image/heic", Some("IMG_0042.HEIC"), vec![0; 10]);

        let response = app(source)
            .oneshot(get_request("/images/abc/info"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value =
            serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body["identifier"], "abc");
        assert_eq!(body["name"], "IMG_0042.HEIC");
        assert_eq!(body["mimeType"], "image/heic");
        assert_eq!(body["isImage"], true);
        assert_eq!(body["thumbnailUrl"], "/images/abc?variant=thumbnail");
        assert_eq!(body["fullUrl"], "/images/abc");
    }

    #[tokio::test]
    async fn health_answers_ok() {
        let response = app(MockSource::default())
            .oneshot(get_request("/health"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value =
            serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body["status"], "ok");
    }
}
