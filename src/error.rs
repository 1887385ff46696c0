//! Relay error type and its mapping onto HTTP responses.

use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, warn};

/// Every way a relay request can fail.
///
/// The [`IntoResponse`] impl is the single place failures turn into status
/// codes and bodies, so handlers just propagate with `?`.
#[derive(Error, Debug)]
pub enum RelayError {
    /// `url` query parameter absent or empty
    #[error("Missing URL parameter")]
    MissingUrl,

    /// Target could not be parsed or uses an unsupported scheme
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Target resolves to an address the relay refuses to contact
    #[error("Target not allowed: {0}")]
    ForbiddenTarget(String),

    /// Transport failure talking to the upstream (DNS, TLS, connect, body read)
    #[error("Proxy error: {0}")]
    Upstream(#[from] reqwest::Error),

    /// Upstream answered with a non-2xx status
    #[error("Failed to fetch source: {status_text}. Body: {excerpt}")]
    UpstreamStatus {
        status: StatusCode,
        status_text: String,
        excerpt: String,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// HTTP status this error is reported with.
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::MissingUrl | RelayError::InvalidUrl(_) => StatusCode::BAD_REQUEST,
            RelayError::ForbiddenTarget(_) => StatusCode::FORBIDDEN,
            RelayError::Upstream(_) | RelayError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            RelayError::UpstreamStatus { status, .. } => *status,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();

        match &self {
            RelayError::Upstream(_) | RelayError::Internal(_) => error!("{}", self),
            // Upstream body was already logged in full by the handler
            RelayError::UpstreamStatus { .. } => {}
            _ => warn!("Rejected relay request: {}", self),
        }

        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.to_string(),
        )
            .into_response()
    }
}

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_url_is_bad_request() {
        let err = RelayError::MissingUrl;
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Missing URL parameter");
    }

    #[test]
    fn upstream_status_is_mirrored() {
        let err = RelayError::UpstreamStatus {
            status: StatusCode::NOT_FOUND,
            status_text: "Not Found".to_string(),
            excerpt: "no such playlist".to_string(),
        };
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            err.to_string(),
            "Failed to fetch source: Not Found. Body: no such playlist"
        );
    }

    #[test]
    fn forbidden_target_is_403() {
        let err = RelayError::ForbiddenTarget("127.0.0.1".to_string());
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn into_response_uses_plain_text() {
        let resp = RelayError::InvalidUrl("nope".to_string()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain; charset=utf-8"
        );
    }
}
