use crate::error::RelayError;
use reqwest::redirect::Policy;
use std::error::Error as StdError;
use std::net::{Ipv4Addr, Ipv6Addr};
use thiserror::Error;
use tracing::warn;
use url::{Host, Url};

/// Longest redirect chain followed for one upstream fetch.
const MAX_REDIRECTS: usize = 10;

/// Parse and vet the `url` parameter of a relay request.
///
/// The target must be an absolute `http://` or `https://` URL. With
/// `block_private` set, IP-literal hosts in loopback, private, link-local
/// or unspecified ranges are refused. Hostnames are not resolved, so a
/// public name pointing at a private address still passes.
///
/// # Errors
/// - [`RelayError::InvalidUrl`] for unparseable, relative or non-HTTP(S) URLs
/// - [`RelayError::ForbiddenTarget`] for blocked IP literals
pub fn parse_target(raw: &str, block_private: bool) -> Result<Url, RelayError> {
    let url = Url::parse(raw).map_err(|e| RelayError::InvalidUrl(format!("{raw}: {e}")))?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(RelayError::InvalidUrl(format!(
                "scheme '{scheme}' not allowed, only http/https"
            )));
        }
    }

    let host = url
        .host()
        .ok_or_else(|| RelayError::InvalidUrl(format!("no host in {raw}")))?;

    if block_private && is_blocked_host(&host) {
        return Err(RelayError::ForbiddenTarget(host.to_string()));
    }

    Ok(url)
}

/// A redirect hop that landed on a blocked address.
///
/// Raised from the client's redirect policy; the handler finds it in the
/// `reqwest::Error` source chain and reports it as a forbidden target.
#[derive(Debug, Error)]
#[error("redirect to blocked target {0}")]
pub struct BlockedRedirect(pub String);

/// Redirect policy that re-applies the target check to every hop.
///
/// With `block_private` off this only caps the chain length.
pub fn redirect_policy(block_private: bool) -> Policy {
    Policy::custom(move |attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.error("too many redirects");
        }
        if block_private
            && let Some(host) = attempt.url().host()
            && is_blocked_host(&host)
        {
            let host = host.to_string();
            warn!("Refusing redirect to blocked target {}", host);
            return attempt.error(BlockedRedirect(host));
        }
        attempt.follow()
    })
}

/// Find a [`BlockedRedirect`] anywhere in an error's source chain.
pub fn blocked_redirect<'a>(err: &'a (dyn StdError + 'static)) -> Option<&'a BlockedRedirect> {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(blocked) = e.downcast_ref::<BlockedRedirect>() {
            return Some(blocked);
        }
        current = e.source();
    }
    None
}

fn is_blocked_host(host: &Host<&str>) -> bool {
    match host {
        Host::Ipv4(ip) => is_blocked_ipv4(*ip),
        Host::Ipv6(ip) => is_blocked_ipv6(*ip),
        Host::Domain(_) => false,
    }
}

/// `0.0.0.0/8`, loopback, RFC 1918 and link-local (cloud metadata) ranges.
fn is_blocked_ipv4(ip: Ipv4Addr) -> bool {
    ip.octets()[0] == 0 || ip.is_loopback() || ip.is_private() || ip.is_link_local()
}

/// Loopback, unspecified, `fe80::/10`, `fc00::/7`, and IPv4-mapped forms of
/// the blocked IPv4 ranges.
fn is_blocked_ipv6(ip: Ipv6Addr) -> bool {
    let first = ip.segments()[0];

    ip.is_loopback()
        || ip.is_unspecified()
        || (first & 0xffc0) == 0xfe80
        || (first & 0xfe00) == 0xfc00
        || ip.to_ipv4_mapped().is_some_and(is_blocked_ipv4)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blocked(url: &str) -> bool {
        matches!(parse_target(url, true), Err(RelayError::ForbiddenTarget(_)))
    }

    fn invalid(url: &str) -> bool {
        matches!(parse_target(url, true), Err(RelayError::InvalidUrl(_)))
    }

    #[test]
    fn accepts_public_targets() {
        let url = parse_target("https://cdn.example/hls/index.m3u8?token=abc", true).unwrap();
        assert_eq!(url.host_str(), Some("cdn.example"));
        assert!(parse_target("http://8.8.8.8/seg.ts", true).is_ok());
        assert!(parse_target("http://[2001:db8::1]/seg.ts", true).is_ok());
    }

    #[test]
    fn rejects_private_ipv4_when_blocking() {
        assert!(blocked("http://127.0.0.1/seg.ts"));
        assert!(blocked("http://10.1.2.3/seg.ts"));
        assert!(blocked("http://172.16.0.1/seg.ts"));
        assert!(blocked("http://192.168.1.10/seg.ts"));
        assert!(blocked("http://169.254.169.254/latest/meta-data/"));
        assert!(blocked("http://0.0.0.0/seg.ts"));
    }

    #[test]
    fn boundaries_of_172_range_allowed() {
        assert!(parse_target("http://172.15.255.255/seg.ts", true).is_ok());
        assert!(parse_target("http://172.32.0.0/seg.ts", true).is_ok());
    }

    #[test]
    fn rejects_private_ipv6_when_blocking() {
        assert!(blocked("http://[::1]/seg.ts"));
        assert!(blocked("http://[fe80::1]/seg.ts"));
        assert!(blocked("http://[fd00::1]/seg.ts"));
        assert!(blocked("http://[::ffff:127.0.0.1]/seg.ts"));
    }

    #[test]
    fn private_targets_allowed_when_not_blocking() {
        assert!(parse_target("http://127.0.0.1:8080/seg.ts", false).is_ok());
        assert!(parse_target("http://[::1]/seg.ts", false).is_ok());
    }

    #[test]
    fn rejects_non_http_schemes() {
        assert!(invalid("ftp://cdn.example/seg.ts"));
        assert!(invalid("file:///etc/passwd"));
        assert!(invalid("data:text/plain,hello"));
    }

    #[test]
    fn blocked_redirect_found_in_source_chain() {
        #[derive(Debug, Error)]
        #[error("wrapper")]
        struct Wrapper(#[source] BlockedRedirect);

        let err = Wrapper(BlockedRedirect("127.0.0.1".to_string()));
        let found = blocked_redirect(&err).unwrap();
        assert_eq!(found.0, "127.0.0.1");

        let other = std::io::Error::other("refused");
        assert!(blocked_redirect(&other).is_none());
    }

    #[test]
    fn rejects_malformed_and_relative() {
        assert!(invalid(""));
        assert!(invalid("not-a-url"));
        assert!(invalid("/api/proxy?url=x"));
        assert!(invalid("https://[bad/seg.ts"));
    }
}
