//! # Darkroom
//!
//! An image proxy and transcoding service for a cloud-drive photo diary.
//! The diary frontend cannot load drive-hosted photos directly (CORS, auth,
//! and phone-native HEIC uploads get in the way), so this service sits in
//! between: it fetches an asset through the authenticated drive API,
//! converts legacy encodings to JPEG, optionally downscales and
//! recompresses, and streams the bytes with long-lived cache headers.
//!
//! # Architecture: Four-Stage Pipeline
//!
//! Every request flows through four stages, strictly in order:
//!
//! ```text
//! 1. Fetch      drive API   →  raw bytes + declared metadata
//! 2. Normalize  HEIC/HEIF/AVIF  →  baseline JPEG (max quality)
//! 3. Transform  optional width-bounded resize + JPEG recompression
//! 4. Emit       Content-Type / Cache-Control / CORS / Content-Length
//! ```
//!
//! The pipeline is stateless: nothing survives a request except the shared
//! drive client injected at startup. Caching is delegated entirely to the
//! HTTP headers consumed by browsers and CDNs — there is no local cache to
//! manage or invalidate.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`source`] | Drive API client behind the [`source::AssetSource`] trait |
//! | [`pipeline`] | Per-request orchestration of the four stages |
//! | [`imaging`] | Pure-Rust pixel work: detection, conversion, resize, recompress |
//! | [`server`] | axum routes, response headers, graceful shutdown |
//! | [`config`] | Sparse `config.toml` loading and validation |
//! | [`error`] | Error taxonomy and its HTTP status mapping |
//!
//! # Design Decisions
//!
//! ## JPEG-Only Output
//!
//! Everything the transform stage emits is JPEG. The diary's photos come
//! from phone cameras; a single universally decodable output format keeps
//! the frontend's `<img>` handling trivial and the cache key space small.
//!
//! ## Pure-Rust Imaging (No ImageMagick, No libheif)
//!
//! The [`imaging`] module uses the `image` crate for decode/resize/encode
//! and `avif-parse` + `rav1d` for the HEIF-family path — all pure Rust, no
//! system dependencies. The binary is fully self-contained: download it,
//! set a token, point it at a drive folder.
//!
//! ## Check Before Fetch
//!
//! Metadata is always fetched first. A request for a non-image asset is
//! rejected after one small metadata round-trip instead of after
//! downloading megabytes of video.
//!
//! ## Best-Effort Compression
//!
//! If the resize/recompress stage fails, the service serves the
//! pre-transform bytes rather than erroring — a full-size photo beats a
//! broken diary page. Format conversion is the one exception: serving raw
//! HEIC to a browser would render nothing, so conversion failures are hard
//! errors.

pub mod config;
pub mod error;
pub mod imaging;
pub mod pipeline;
pub mod server;
pub mod source;

#[cfg(test)]
pub(crate) mod test_helpers;
