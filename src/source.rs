//! Asset retrieval from the cloud-storage provider.
//!
//! The [`AssetSource`] trait is the seam between the pipeline and the
//! outside world: metadata lookup, content download, and the provider's
//! ready-made reduced representation. The production implementation is
//! [`DriveSource`], a thin client over the Google Drive v3 REST surface.
//! Tests swap in a recording mock.
//!
//! The client is constructed once at startup and injected wherever assets
//! are needed — a single shared `reqwest::Client` carries connection
//! pooling and the upstream timeout. Obtaining the bearer token is the
//! operator's concern (see [`SourceConfig::load_token`]).
//!
//! There is no local caching layer: HTTP cache headers on the outbound
//! response delegate caching to clients and CDNs.

use crate::config::SourceConfig;
use crate::error::ProxyError;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Declared metadata for an asset, as reported by the source system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetMetadata {
    pub name: Option<String>,
    pub mime_type: String,
    pub size: Option<u64>,
}

/// Retrieval capability keyed by opaque asset identifier.
#[async_trait]
pub trait AssetSource: Send + Sync {
    /// Declared metadata (name, MIME type, size).
    async fn metadata(&self, identifier: &str) -> Result<AssetMetadata, ProxyError>;

    /// Full asset content.
    async fn content(&self, identifier: &str) -> Result<Vec<u8>, ProxyError>;

    /// Provider-generated reduced representation, where one exists.
    /// Callers treat any error as "unavailable" and fall back to
    /// [`content`](Self::content).
    async fn reduced(&self, identifier: &str) -> Result<Vec<u8>, ProxyError>;
}

/// Wire format of a Drive v3 file resource. `size` arrives as a decimal
/// string, not a number.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileResource {
    name: Option<String>,
    mime_type: Option<String>,
    size: Option<String>,
    thumbnail_link: Option<String>,
}

impl FileResource {
    fn into_metadata(self) -> AssetMetadata {
        AssetMetadata {
            name: self.name,
            // Providers occasionally omit the type; untyped photos are
            // treated as JPEG
            mime_type: self.mime_type.unwrap_or_else(|| "image/jpeg".to_string()),
            size: self.size.and_then(|s| s.parse().ok()),
        }
    }
}

/// Google Drive v3 asset source with bearer-token auth.
pub struct DriveSource {
    http: reqwest::Client,
    base_url: String,
    token: String,
    max_asset_bytes: u64,
}

impl DriveSource {
    pub fn new(config: &SourceConfig, token: String) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token,
            max_asset_bytes: config.max_asset_bytes,
        })
    }

    async fn get(&self, url: &str, identifier: &str) -> Result<reqwest::Response, ProxyError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| ProxyError::Upstream(format!("request to source failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(classify_status(status, identifier))
        }
    }

    /// Drain a response body, enforcing the per-asset size ceiling both
    /// against the declared length and against the actual byte count.
    async fn bounded_body(&self, mut response: reqwest::Response) -> Result<Vec<u8>, ProxyError> {
        if let Some(declared) = response.content_length() {
            if declared > self.max_asset_bytes {
                return Err(ProxyError::Upstream(format!(
                    "asset size {declared} exceeds the configured ceiling of {} bytes",
                    self.max_asset_bytes
                )));
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| ProxyError::Upstream(format!("reading source response failed: {e}")))?
        {
            if (body.len() + chunk.len()) as u64 > self.max_asset_bytes {
                return Err(ProxyError::Upstream(format!(
                    "asset exceeds the configured ceiling of {} bytes",
                    self.max_asset_bytes
                )));
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }

    async fn file_resource(&self, identifier: &str) -> Result<FileResource, ProxyError> {
        let url = format!(
            "{}/files/{}?fields=name,mimeType,size,thumbnailLink",
            self.base_url, identifier
        );
        let response = self.get(&url, identifier).await?;
        response
            .json()
            .await
            .map_err(|e| ProxyError::Upstream(format!("malformed source metadata: {e}")))
    }
}

/// Map an upstream HTTP status to the request error taxonomy: missing and
/// forbidden both read as "not found" to the caller, everything else is a
/// source failure.
fn classify_status(status: reqwest::StatusCode, identifier: &str) -> ProxyError {
    match status {
        reqwest::StatusCode::NOT_FOUND
        | reqwest::StatusCode::FORBIDDEN
        | reqwest::StatusCode::UNAUTHORIZED => {
            ProxyError::NotFound(format!("asset {identifier} is missing or inaccessible"))
        }
        other => ProxyError::Upstream(format!("source returned {other} for asset {identifier}")),
    }
}

#[async_trait]
impl AssetSource for DriveSource {
    async fn metadata(&self, identifier: &str) -> Result<AssetMetadata, ProxyError> {
        debug!(identifier, "fetching asset metadata");
        Ok(self.file_resource(identifier).await?.into_metadata())
    }

    async fn content(&self, identifier: &str) -> Result<Vec<u8>, ProxyError> {
        debug!(identifier, "fetching asset content");
        let url = format!("{}/files/{}?alt=media", self.base_url, identifier);
        let response = self.get(&url, identifier).await?;
        self.bounded_body(response).await
    }

    async fn reduced(&self, identifier: &str) -> Result<Vec<u8>, ProxyError> {
        debug!(identifier, "fetching reduced representation");
        let resource = self.file_resource(identifier).await?;
        let link = resource.thumbnail_link.ok_or_else(|| {
            ProxyError::Upstream(format!("asset {identifier} has no reduced representation"))
        })?;

        // The link is pre-authorized; no bearer token needed
        let response = self
            .http
            .get(&link)
            .send()
            .await
            .map_err(|e| ProxyError::Upstream(format!("reduced representation fetch failed: {e}")))?;
        if !response.status().is_success() {
            return Err(classify_status(response.status(), identifier));
        }
        self.bounded_body(response).await
    }
}
