//! Structured errors for the proxy surface.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors returned to HTTP clients of the proxy.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// Unparsable control message or request.
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Request body exceeds the configured limit.
    #[error("PAYLOAD_TOO_LARGE: {0}")]
    PayloadTooLarge(String),

    /// Pass-through request that never reached the origin.
    #[error("UPSTREAM_FAILED: {0}")]
    Upstream(#[from] lantern_core::Error),
}

impl ProxyError {
    fn status(&self) -> StatusCode {
        match self {
            ProxyError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ProxyError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ProxyError::Upstream(lantern_core::Error::InvalidUrl(_)) => StatusCode::BAD_REQUEST,
            ProxyError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(error = %self, "proxy request failed");
        }
        (status, self.to_string()).into_response()
    }
}
