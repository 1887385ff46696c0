//! Streaming passthrough for non-playlist payloads.
//!
//! Segments can be tens of megabytes and a player pulls several at once, so
//! the upstream body is never collected. It is handed to axum as a stream;
//! when the player disconnects the response body is dropped, which drops the
//! upstream stream and closes that connection too.

use super::headers::{MEDIA_ALLOW_METHODS, forwarded_headers};
use axum::{
    body::Body,
    http::{
        HeaderValue,
        header::{ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use futures_util::TryStreamExt;
use tracing::warn;

/// Content type reported when upstream does not send one.
pub const DEFAULT_MEDIA_TYPE: &str = "application/octet-stream";

/// Turn an upstream response into a streamed player response.
///
/// The status is mirrored and only allow-listed headers are copied.
pub fn stream_through(upstream: reqwest::Response) -> Response {
    let status = upstream.status();

    let mut headers = forwarded_headers(upstream.headers());
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(MEDIA_ALLOW_METHODS),
    );
    let content_type = upstream
        .headers()
        .get(CONTENT_TYPE)
        .filter(|v| !v.is_empty())
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_MEDIA_TYPE));
    headers.insert(CONTENT_TYPE, content_type);

    let source = upstream.url().clone();
    let stream = upstream
        .bytes_stream()
        .inspect_err(move |e| warn!("Upstream body from {} aborted: {}", source, e));

    (status, headers, Body::from_stream(stream)).into_response()
}
