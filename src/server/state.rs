use crate::{
    config::Config,
    error::{RelayError, Result},
    metrics,
    server::url_validation::redirect_policy,
};
use metrics_exporter_prometheus::PrometheusHandle;
use reqwest::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    /// Shared HTTP client for upstream connection pooling
    pub http_client: Client,
    /// When the process started serving, for uptime reporting
    pub started_at: Instant,
    /// Prometheus handle, present when metrics are enabled
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create a new AppState with the given configuration
    pub fn new(config: Config) -> Result<Self> {
        let http_client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .redirect(redirect_policy(config.block_private_targets))
            .build()
            .map_err(|e| RelayError::Internal(format!("Failed to create HTTP client: {e}")))?;

        let metrics = if config.metrics_enabled {
            metrics::init()
        } else {
            None
        };

        Ok(Self {
            config: Arc::new(config),
            http_client,
            started_at: Instant::now(),
            metrics,
        })
    }
}
