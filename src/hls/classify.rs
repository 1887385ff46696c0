use url::Url;

/// How an upstream payload is handed back to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// HLS playlist: decoded, rewritten, re-served
    Manifest,
    /// Anything else (segments, keys, thumbnails): streamed through untouched
    Media,
}

impl PayloadKind {
    /// Label used for metrics and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadKind::Manifest => "manifest",
            PayloadKind::Media => "media",
        }
    }
}

const MANIFEST_CONTENT_TYPES: [&str; 2] = ["application/vnd.apple.mpegurl", "application/x-mpegurl"];

/// Decide whether an upstream response is an HLS playlist.
///
/// The content type is checked first. Some origins serve playlists as
/// `text/plain` or `application/octet-stream`, so a `.m3u8` path on the
/// requested URL also counts. Never fails; no content type means "not a
/// playlist" unless the path says otherwise.
pub fn classify(content_type: Option<&str>, target: &Url) -> PayloadKind {
    let by_type = content_type
        .map(str::to_ascii_lowercase)
        .is_some_and(|ct| MANIFEST_CONTENT_TYPES.iter().any(|m| ct.contains(m)));

    if by_type || target.path().ends_with(".m3u8") {
        PayloadKind::Manifest
    } else {
        PayloadKind::Media
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(input: &str) -> Url {
        Url::parse(input).expect("test urls should be valid")
    }

    #[test]
    fn apple_mpegurl_is_manifest() {
        let kind = classify(
            Some("application/vnd.apple.mpegurl"),
            &url("https://cdn.example/master"),
        );
        assert_eq!(kind, PayloadKind::Manifest);
    }

    #[test]
    fn x_mpegurl_with_charset_is_manifest() {
        let kind = classify(
            Some("Application/X-MpegURL; charset=utf-8"),
            &url("https://cdn.example/index"),
        );
        assert_eq!(kind, PayloadKind::Manifest);
    }

    #[test]
    fn mislabeled_m3u8_falls_back_to_suffix() {
        let kind = classify(
            Some("text/plain"),
            &url("https://cdn.example/live/index.m3u8?token=abc"),
        );
        assert_eq!(kind, PayloadKind::Manifest);
    }

    #[test]
    fn missing_content_type_with_m3u8_suffix() {
        assert_eq!(
            classify(None, &url("https://cdn.example/a/b.m3u8")),
            PayloadKind::Manifest
        );
    }

    #[test]
    fn transport_stream_is_media() {
        assert_eq!(
            classify(Some("video/mp2t"), &url("https://cdn.example/seg0.ts")),
            PayloadKind::Media
        );
    }

    #[test]
    fn missing_content_type_degrades_to_media() {
        assert_eq!(
            classify(None, &url("https://cdn.example/key.bin")),
            PayloadKind::Media
        );
    }

    #[test]
    fn m3u8_in_query_only_is_media() {
        assert_eq!(
            classify(None, &url("https://cdn.example/get?file=a.m3u8")),
            PayloadKind::Media
        );
    }
}
