use std::env;

use crate::upstream::DEFAULT_USER_AGENT;

/// Default mount point of the relay endpoint
pub const DEFAULT_RELAY_PATH: &str = "/api/proxy";

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub is_dev: bool,
    /// Route the relay is served on; also the prefix of every rewritten playlist URI
    pub relay_path: String,
    /// User-Agent sent upstream when the player did not send one
    pub default_user_agent: String,
    /// Refuse targets whose host is a private, loopback or link-local IP literal
    pub block_private_targets: bool,
    /// Also rewrite quoted `URI="..."` attributes inside playlist tags
    pub rewrite_tag_uris: bool,
    /// Expose Prometheus metrics on `/metrics`
    pub metrics_enabled: bool,
}

impl Config {
    /// Load configuration from environment variables
    /// In DEV mode, provides sensible defaults. In PROD mode, PORT is required.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let is_dev = parse_bool("DEV_MODE", false);

        // Port: required in prod, defaults to 3000 in dev
        let port = if is_dev {
            env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?
        } else {
            env::var("PORT")
                .map_err(|_| "PORT is required in production")?
                .parse()?
        };

        let relay_path = env::var("RELAY_PATH").unwrap_or_else(|_| DEFAULT_RELAY_PATH.to_string());
        validate_relay_path(&relay_path)?;

        let default_user_agent =
            env::var("DEFAULT_USER_AGENT").unwrap_or_else(|_| DEFAULT_USER_AGENT.to_string());

        // Local upstreams are common while developing, so only prod blocks them by default
        let block_private_targets = parse_bool("BLOCK_PRIVATE_TARGETS", !is_dev);

        Ok(Config {
            port,
            is_dev,
            relay_path,
            default_user_agent,
            block_private_targets,
            rewrite_tag_uris: parse_bool("REWRITE_TAG_URIS", false),
            metrics_enabled: parse_bool("METRICS_ENABLED", true),
        })
    }
}

/// Check that `path` is a literal route usable as a relay URL prefix.
///
/// Route captures (`{id}`, `:id`, `*rest`) would change the router's matching
/// and `?`/`#` would corrupt the `?url=` query of rewritten URIs.
fn validate_relay_path(path: &str) -> Result<(), String> {
    if !path.starts_with('/') {
        return Err(format!("RELAY_PATH must start with '/': {path}"));
    }
    if matches!(path, "/" | "/health" | "/metrics") {
        return Err(format!("RELAY_PATH collides with a built-in route: {path}"));
    }
    if let Some(c) = path
        .chars()
        .find(|c| matches!(c, '{' | '}' | '?' | '#' | '%') || c.is_whitespace() || c.is_control())
    {
        return Err(format!("RELAY_PATH contains {c:?}: {path}"));
    }
    if path
        .split('/')
        .any(|segment| segment.starts_with(':') || segment.starts_with('*'))
    {
        return Err(format!("RELAY_PATH segments cannot start with ':' or '*': {path}"));
    }
    Ok(())
}

/// Read a boolean env var, falling back to `default` when unset or unparseable.
fn parse_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().to_ascii_lowercase().parse().ok())
        .unwrap_or(default)
}
