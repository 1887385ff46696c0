//! HLS playlist handling: payload classification and URI rewriting.

pub mod classify;
pub mod rewrite;

pub use classify::{PayloadKind, classify};
pub use rewrite::{RewriteOptions, RewrittenManifest, relay_url, rewrite_manifest, target_from_relay_url};

/// Content type of every playlist the relay serves.
pub const MANIFEST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";
