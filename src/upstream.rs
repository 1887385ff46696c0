//! Upstream fetch with browser-like request headers.
//!
//! Streaming CDNs commonly reject requests that do not look like a browser
//! playing the video from their own site. [`fetch_upstream`] issues a single
//! GET that carries the player's User-Agent and sets `Referer`/`Origin` to
//! the target's own origin. No retry is attempted; the player picks another
//! server on failure.

use reqwest::{
    Client, Response,
    header::{HeaderMap, HeaderName, HeaderValue, ORIGIN, REFERER, USER_AGENT},
};
use tracing::{debug, warn};
use url::Url;

/// User-Agent used when the inbound request does not carry one.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Fixed headers every upstream request carries.
const STATIC_HEADERS: &[(&str, &str)] = &[
    ("accept", "*/*"),
    ("accept-language", "en-US,en;q=0.9"),
    ("connection", "keep-alive"),
    ("sec-fetch-dest", "empty"),
    ("sec-fetch-mode", "cors"),
    ("sec-fetch-site", "cross-site"),
    ("pragma", "no-cache"),
    ("cache-control", "no-cache"),
];

/// Build the header set sent upstream for `target`.
///
/// `client_user_agent` is the inbound request's User-Agent, forwarded as-is
/// when present; otherwise `fallback_user_agent` is used.
pub fn browser_headers(
    target: &Url,
    client_user_agent: Option<&HeaderValue>,
    fallback_user_agent: &str,
) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(STATIC_HEADERS.len() + 3);

    let user_agent = client_user_agent
        .cloned()
        .or_else(|| HeaderValue::from_str(fallback_user_agent).ok())
        .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_USER_AGENT));
    headers.insert(USER_AGENT, user_agent);

    // Same-site checks on the CDN want the target's origin, not ours
    let origin = target.origin().ascii_serialization();
    if let Ok(value) = HeaderValue::from_str(&format!("{origin}/")) {
        headers.insert(REFERER, value);
    }
    if let Ok(value) = HeaderValue::from_str(&origin) {
        headers.insert(ORIGIN, value);
    }

    for (name, value) in STATIC_HEADERS {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }

    headers
}

/// Fetch `target` once with browser headers.
///
/// A non-2xx response is returned as `Ok`; deciding whether that is a failure
/// is left to the caller.
///
/// # Errors
///
/// Returns the transport error (DNS, TLS, connection refused, ...) as-is.
pub async fn fetch_upstream(
    client: &Client,
    target: &Url,
    client_user_agent: Option<&HeaderValue>,
    fallback_user_agent: &str,
) -> Result<Response, reqwest::Error> {
    debug!("Fetching upstream: {}", target);

    let headers = browser_headers(target, client_user_agent, fallback_user_agent);

    client
        .get(target.clone())
        .headers(headers)
        .send()
        .await
        .inspect_err(|e| warn!("Upstream fetch failed for {}: {}", target, e))
}
