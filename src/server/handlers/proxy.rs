use crate::{
    error::{RelayError, Result},
    hls::{self, MANIFEST_CONTENT_TYPE, PayloadKind, RewriteOptions},
    metrics,
    server::{
        headers::preflight_headers, passthrough::stream_through, state::AppState,
        url_validation::{blocked_redirect, parse_target},
    },
    upstream::fetch_upstream,
};
use axum::{
    extract::{Query, State},
    http::{
        HeaderMap, StatusCode,
        header::{ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE, USER_AGENT},
    },
    response::{IntoResponse, Response},
};
use futures_util::StreamExt;
use hyper::ext::ReasonPhrase;
use std::collections::HashMap;
use std::time::Instant;
use tracing::{error, info, warn};

/// Characters of an upstream error body returned to the player.
pub const ERROR_EXCERPT_CHARS: usize = 200;

/// Characters of an upstream error body written to the log.
const LOG_EXCERPT_CHARS: usize = 500;

/// Bytes of an upstream error body read before the rest is discarded.
const ERROR_BODY_MAX_BYTES: usize = 2 * 1024;

/// Relay a remote playlist or media resource to the player.
///
/// Playlists come back rewritten so every URI they reference goes through
/// this endpoint again; everything else is streamed through unchanged.
pub async fn relay(
    Query(params): Query<HashMap<String, String>>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response> {
    let start = Instant::now();

    let result = relay_request(&state, &params, &headers).await;

    let (kind, status) = match &result {
        Ok((kind, response)) => (kind.as_str(), response.status()),
        Err(e) => ("error", e.status()),
    };
    metrics::record_request(kind, status.as_u16());
    metrics::record_duration(kind, start);

    result.map(|(_, response)| response)
}

async fn relay_request(
    state: &AppState,
    params: &HashMap<String, String>,
    headers: &HeaderMap,
) -> Result<(PayloadKind, Response)> {
    let raw_url = params
        .get("url")
        .filter(|u| !u.is_empty())
        .ok_or(RelayError::MissingUrl)?;

    let target = parse_target(raw_url, state.config.block_private_targets)?;
    info!("Relaying: {}", target);

    let upstream = fetch_upstream(
        &state.http_client,
        &target,
        headers.get(USER_AGENT),
        &state.config.default_user_agent,
    )
    .await
    .map_err(|e| match blocked_redirect(&e) {
        Some(blocked) => RelayError::ForbiddenTarget(blocked.0.clone()),
        None => {
            metrics::record_upstream_error("transport");
            RelayError::Upstream(e)
        }
    })?;

    let status = upstream.status();
    if !status.is_success() {
        metrics::record_upstream_error("status");

        let status_text = reason_phrase(&upstream);
        let body = read_error_body(upstream, ERROR_BODY_MAX_BYTES).await;
        error!(
            "Upstream error: {} for {}\nBody: {}",
            status,
            target,
            excerpt(&body, LOG_EXCERPT_CHARS)
        );

        return Err(RelayError::UpstreamStatus {
            status,
            status_text,
            excerpt: excerpt(&body, ERROR_EXCERPT_CHARS).to_string(),
        });
    }

    let content_type = upstream
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let kind = hls::classify(content_type, &target);

    match kind {
        PayloadKind::Manifest => {
            // Relative URIs resolve against where the playlist actually came from
            let base = upstream.url().clone();
            let text = upstream.text().await?;

            let rewritten = hls::rewrite_manifest(
                &text,
                &base,
                RewriteOptions {
                    relay_path: &state.config.relay_path,
                    rewrite_tag_uris: state.config.rewrite_tag_uris,
                },
            );
            metrics::record_lines_rewritten(rewritten.rewritten);
            info!(
                "Rewrote playlist {} ({} URIs through relay)",
                target, rewritten.rewritten
            );

            let response = (
                StatusCode::OK,
                [
                    (CONTENT_TYPE, MANIFEST_CONTENT_TYPE),
                    (ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
                ],
                rewritten.body,
            )
                .into_response();
            Ok((kind, response))
        }
        PayloadKind::Media => Ok((kind, stream_through(upstream))),
    }
}

/// Answer a CORS preflight for the relay endpoint.
pub async fn preflight() -> Response {
    (StatusCode::NO_CONTENT, preflight_headers()).into_response()
}

/// Reason phrase the upstream sent, falling back to the canonical one.
///
/// hyper only records the phrase when it differs from the canonical text,
/// which is the case for CDN codes like 520 or 530.
fn reason_phrase(upstream: &reqwest::Response) -> String {
    upstream
        .extensions()
        .get::<ReasonPhrase>()
        .map(|phrase| String::from_utf8_lossy(phrase.as_bytes()).into_owned())
        .or_else(|| upstream.status().canonical_reason().map(str::to_string))
        .unwrap_or_default()
}

/// Read at most `max_bytes` of an error body, then drop the rest.
///
/// A multi-byte character cut at the limit is discarded. A body that fails
/// mid-read yields whatever arrived before the failure.
async fn read_error_body(upstream: reqwest::Response, max_bytes: usize) -> String {
    let mut buf = Vec::with_capacity(max_bytes.min(8 * 1024));
    let mut stream = upstream.bytes_stream();

    while buf.len() < max_bytes {
        match stream.next().await {
            Some(Ok(chunk)) => {
                let take = chunk.len().min(max_bytes - buf.len());
                buf.extend_from_slice(&chunk[..take]);
            }
            Some(Err(e)) => {
                warn!("Upstream error body unreadable: {}", e);
                break;
            }
            None => break,
        }
    }

    if let Err(e) = std::str::from_utf8(&buf)
        && e.error_len().is_none()
    {
        buf.truncate(e.valid_up_to());
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// First `max_chars` characters of `text`.
fn excerpt(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
