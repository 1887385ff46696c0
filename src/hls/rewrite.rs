//! Line-oriented HLS playlist rewriting.
//!
//! Every URI line of a playlist is resolved against the playlist's own URL
//! and replaced with a relay URL, so segment, key and variant requests made
//! by the player come back through the relay too. The playlist is not parsed
//! into a model: tags, comments and blank lines are copied byte-for-byte and
//! the output has exactly as many lines as the input, in the same order.
//!
//! URIs quoted inside tag attributes (`#EXT-X-KEY:URI="..."`,
//! `#EXT-X-MAP:URI="..."`, ...) are left alone unless
//! [`RewriteOptions::rewrite_tag_uris`] is set.

use tracing::{debug, warn};
use url::Url;

/// Tags whose quoted `URI` attribute points at something the player fetches.
const URI_BEARING_TAGS: [&str; 8] = [
    "#EXT-X-KEY:",
    "#EXT-X-SESSION-KEY:",
    "#EXT-X-MAP:",
    "#EXT-X-MEDIA:",
    "#EXT-X-I-FRAME-STREAM-INF:",
    "#EXT-X-PART:",
    "#EXT-X-PRELOAD-HINT:",
    "#EXT-X-RENDITION-REPORT:",
];

/// Knobs for [`rewrite_manifest`].
#[derive(Debug, Clone, Copy)]
pub struct RewriteOptions<'a> {
    /// Path of the relay endpoint, e.g. `/api/proxy`
    pub relay_path: &'a str,
    /// Also rewrite quoted `URI="..."` attributes of [`URI_BEARING_TAGS`]
    pub rewrite_tag_uris: bool,
}

/// A rewritten playlist plus counters for logging and metrics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenManifest {
    pub body: String,
    /// URI lines (and tag URIs, when enabled) now pointing at the relay
    pub rewritten: usize,
    /// URI lines left untouched because they could not be resolved
    pub unresolved: usize,
}

/// Build the relay URL that fetches `absolute` through `relay_path`.
///
/// Everything except `A-Z a-z 0-9 - _ . ~` is percent-encoded.
pub fn relay_url(relay_path: &str, absolute: &str) -> String {
    format!("{}?url={}", relay_path, urlencoding::encode(absolute))
}

/// Recover the absolute target URL from a relay URL built by [`relay_url`].
///
/// Returns `None` when there is no non-empty `url` query parameter.
pub fn target_from_relay_url(relay: &str) -> Option<String> {
    let (_, query) = relay.split_once('?')?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "url")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

/// Rewrite every URI line of `text` to go through the relay.
///
/// Lines are split on `\n`. A trailing `\r` is treated as part of the line
/// terminator and kept on rewritten lines, so CRLF playlists stay CRLF.
/// A line that cannot be resolved against `base` is kept as-is.
pub fn rewrite_manifest(text: &str, base: &Url, options: RewriteOptions<'_>) -> RewrittenManifest {
    let mut body = String::with_capacity(text.len() + text.len() / 2);
    let mut rewritten = 0;
    let mut unresolved = 0;

    for (index, line) in text.split('\n').enumerate() {
        if index > 0 {
            body.push('\n');
        }

        let (content, terminator) = match line.strip_suffix('\r') {
            Some(content) => (content, "\r"),
            None => (line, ""),
        };
        let trimmed = content.trim();

        if trimmed.is_empty() {
            body.push_str(line);
            continue;
        }

        if trimmed.starts_with('#') {
            if options.rewrite_tag_uris
                && URI_BEARING_TAGS.iter().any(|tag| trimmed.starts_with(tag))
                && let Some(tag_line) = rewrite_tag_uri(content, base, options.relay_path)
            {
                body.push_str(&tag_line);
                body.push_str(terminator);
                rewritten += 1;
            } else {
                body.push_str(line);
            }
            continue;
        }

        match base.join(trimmed) {
            Ok(absolute) => {
                body.push_str(&relay_url(options.relay_path, absolute.as_str()));
                body.push_str(terminator);
                rewritten += 1;
            }
            Err(e) => {
                warn!("Failed to rewrite playlist URI {:?}: {}", trimmed, e);
                body.push_str(line);
                unresolved += 1;
            }
        }
    }

    debug!(
        "Rewrote {} playlist URIs against {} ({} unresolved)",
        rewritten, base, unresolved
    );

    RewrittenManifest {
        body,
        rewritten,
        unresolved,
    }
}

/// Locate the value of the `URI="..."` attribute in a tag line.
///
/// Returns the value and its byte range (quotes excluded). Attribute names
/// that merely end in `URI` (e.g. `X-ASSET-URI`) are skipped.
pub fn quoted_uri(line: &str) -> Option<(&str, std::ops::Range<usize>)> {
    const MARKER: &str = "URI=\"";

    let mut from = 0;
    while let Some(found) = line[from..].find(MARKER) {
        let marker_pos = from + found;
        let value_start = marker_pos + MARKER.len();
        let at_boundary = line[..marker_pos].ends_with(&[':', ','][..]);

        if at_boundary {
            let closing = line[value_start..].find('"')?;
            let value_end = value_start + closing;
            return Some((&line[value_start..value_end], value_start..value_end));
        }
        from = value_start;
    }

    None
}

/// Replace the quoted URI of a tag line with a relay URL.
///
/// Non-HTTP(S) URIs such as `skd://` key identifiers or `data:` payloads are
/// not fetchable through the relay and are left untouched (returns `None`).
fn rewrite_tag_uri(line: &str, base: &Url, relay_path: &str) -> Option<String> {
    let (value, range) = quoted_uri(line)?;

    let absolute = match base.join(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => url,
        Ok(_) => return None,
        Err(e) => {
            warn!("Failed to rewrite tag URI {:?}: {}", value, e);
            return None;
        }
    };

    let relay = relay_url(relay_path, absolute.as_str());
    let mut result = String::with_capacity(line.len() + relay.len());
    result.push_str(&line[..range.start]);
    result.push_str(&relay);
    result.push_str(&line[range.end..]);
    Some(result)
}
