//! Request error taxonomy and its HTTP mapping.
//!
//! Every hard failure in the pipeline collapses into [`ProxyError`], which
//! renders as structured JSON (`{"error": "..."}`) with the matching status
//! code. The one deliberate non-error is the transform stage's best-effort
//! degradation, which never reaches this type — see
//! [`imaging::transform`](crate::imaging::transform).

use crate::imaging::NormalizeError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProxyError {
    /// Asset missing or inaccessible at the source.
    #[error("asset not found: {0}")]
    NotFound(String),
    /// The requested asset is not an image.
    #[error("not an image: {0}")]
    UnsupportedType(String),
    /// Source system unreachable, timed out, or returned a server error.
    #[error("source system failure: {0}")]
    Upstream(String),
    /// Legacy-format conversion failed; unconverted bytes are never served.
    #[error("image conversion failed: {0}")]
    Conversion(#[from] NormalizeError),
    /// A defect on our side (e.g. a worker task panicked).
    #[error("internal error: {0}")]
    Internal(String),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::NotFound(_) => StatusCode::NOT_FOUND,
            ProxyError::UnsupportedType(_) => StatusCode::BAD_REQUEST,
            ProxyError::Upstream(_) | ProxyError::Conversion(_) | ProxyError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
