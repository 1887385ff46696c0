//! Prometheus metrics for relay traffic.
//!
//! Thin wrappers over the `metrics` facade so handlers record with one call.
//! The recorder is process-global and installed at most once.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;
use tracing::warn;

static HANDLE: OnceLock<Option<PrometheusHandle>> = OnceLock::new();

/// Install the Prometheus recorder (first call only) and return its handle.
///
/// Returns `None` if another recorder was already installed globally.
pub fn init() -> Option<PrometheusHandle> {
    HANDLE
        .get_or_init(|| match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Prometheus recorder not installed: {}", e);
                None
            }
        })
        .clone()
}

/// Count a finished relay request. `kind` is `manifest`, `media` or `error`.
pub fn record_request(kind: &'static str, status: u16) {
    counter!("relay_requests_total", "kind" => kind, "status" => status.to_string()).increment(1);
}

/// Record time spent handling a relay request.
pub fn record_duration(kind: &'static str, start: Instant) {
    histogram!("relay_request_duration_seconds", "kind" => kind)
        .record(start.elapsed().as_secs_f64());
}

/// Count an upstream failure. `reason` is `transport` or `status`.
pub fn record_upstream_error(reason: &'static str) {
    counter!("relay_upstream_errors_total", "reason" => reason).increment(1);
}

/// Count playlist URIs redirected through the relay.
pub fn record_lines_rewritten(count: usize) {
    counter!("relay_manifest_lines_rewritten_total").increment(count as u64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        let first = init();
        let second = init();
        assert!(first.is_some());
        assert_eq!(first.is_some(), second.is_some());
    }

    #[test]
    fn recorded_metrics_are_rendered() {
        // Nothing else in this test binary installs a recorder
        let handle = init().expect("Prometheus recorder should install");

        record_request("manifest", 200);
        record_upstream_error("status");
        record_lines_rewritten(3);

        let rendered = handle.render();
        assert!(rendered.contains("relay_requests_total"));
        assert!(rendered.contains("relay_upstream_errors_total"));
        assert!(rendered.contains("relay_manifest_lines_rewritten_total"));
    }
}
