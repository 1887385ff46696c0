//! Response header policy for relayed content.
//!
//! Only a closed set of upstream headers reaches the player; everything else
//! (cookies, CSP, server banners, content encoding) is dropped.

use axum::http::{
    HeaderMap, HeaderName, HeaderValue,
    header::{self, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN},
};

/// Methods advertised on relayed media responses.
pub const MEDIA_ALLOW_METHODS: &str = "GET, OPTIONS, HEAD";

/// Methods advertised on preflight responses.
pub const PREFLIGHT_ALLOW_METHODS: &str = "GET, OPTIONS";

/// Upstream headers copied onto passthrough responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardedHeader {
    ContentLength,
    CacheControl,
    Expires,
    Date,
    LastModified,
    ETag,
    AcceptRanges,
}

impl ForwardedHeader {
    pub const ALL: [ForwardedHeader; 7] = [
        ForwardedHeader::ContentLength,
        ForwardedHeader::CacheControl,
        ForwardedHeader::Expires,
        ForwardedHeader::Date,
        ForwardedHeader::LastModified,
        ForwardedHeader::ETag,
        ForwardedHeader::AcceptRanges,
    ];

    /// Canonical `Header-Case` spelling.
    pub fn canonical(self) -> &'static str {
        match self {
            ForwardedHeader::ContentLength => "Content-Length",
            ForwardedHeader::CacheControl => "Cache-Control",
            ForwardedHeader::Expires => "Expires",
            ForwardedHeader::Date => "Date",
            ForwardedHeader::LastModified => "Last-Modified",
            ForwardedHeader::ETag => "Etag",
            ForwardedHeader::AcceptRanges => "Accept-Ranges",
        }
    }

    pub fn header_name(self) -> HeaderName {
        match self {
            ForwardedHeader::ContentLength => header::CONTENT_LENGTH,
            ForwardedHeader::CacheControl => header::CACHE_CONTROL,
            ForwardedHeader::Expires => header::EXPIRES,
            ForwardedHeader::Date => header::DATE,
            ForwardedHeader::LastModified => header::LAST_MODIFIED,
            ForwardedHeader::ETag => header::ETAG,
            ForwardedHeader::AcceptRanges => header::ACCEPT_RANGES,
        }
    }

    /// Look up a header name, ignoring ASCII case.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|h| h.canonical().eq_ignore_ascii_case(name))
    }
}

/// Copy allow-listed, non-empty upstream headers into a fresh map.
pub fn forwarded_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in upstream {
        if value.is_empty() {
            continue;
        }
        if let Some(allowed) = ForwardedHeader::from_name(name.as_str()) {
            headers.append(allowed.header_name(), value.clone());
        }
    }
    headers
}

/// Headers answering a CORS preflight.
pub fn preflight_headers() -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(3);
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(PREFLIGHT_ALLOW_METHODS),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case() {
        assert_eq!(
            ForwardedHeader::from_name("content-length"),
            Some(ForwardedHeader::ContentLength)
        );
        assert_eq!(
            ForwardedHeader::from_name("ETAG"),
            Some(ForwardedHeader::ETag)
        );
        assert_eq!(ForwardedHeader::from_name("set-cookie"), None);
    }

    #[test]
    fn canonical_and_header_name_agree() {
        for h in ForwardedHeader::ALL {
            assert!(h.canonical().eq_ignore_ascii_case(h.header_name().as_str()));
        }
    }

    #[test]
    fn only_allow_listed_headers_forwarded() {
        let mut upstream = HeaderMap::new();
        upstream.insert(header::CONTENT_LENGTH, HeaderValue::from_static("1024"));
        upstream.insert(header::ETAG, HeaderValue::from_static("\"abc\""));
        upstream.insert(header::SET_COOKIE, HeaderValue::from_static("id=1"));
        upstream.insert(header::SERVER, HeaderValue::from_static("nginx"));
        upstream.insert(header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        upstream.insert(header::EXPIRES, HeaderValue::from_static(""));

        let headers = forwarded_headers(&upstream);
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[header::CONTENT_LENGTH], "1024");
        assert_eq!(headers[header::ETAG], "\"abc\"");
    }

    #[test]
    fn repeated_values_are_kept() {
        let mut upstream = HeaderMap::new();
        upstream.append(header::CACHE_CONTROL, HeaderValue::from_static("public"));
        upstream.append(header::CACHE_CONTROL, HeaderValue::from_static("max-age=60"));

        let headers = forwarded_headers(&upstream);
        assert_eq!(headers.get_all(header::CACHE_CONTROL).iter().count(), 2);
    }

    #[test]
    fn preflight_advertises_get_and_options() {
        let headers = preflight_headers();
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_METHODS], "GET, OPTIONS");
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_HEADERS], "Content-Type");
    }
}
