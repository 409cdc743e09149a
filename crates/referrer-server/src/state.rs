use crate::rate_limit::RateLimiter;
use referrer_core::config::AppConfig;
use referrer_google::{AnalyticsBackend, GoogleAnalyticsService};
use std::sync::Arc;
use std::time::Instant;

/// Shared application state for the server.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub backend: Arc<dyn AnalyticsBackend>,
    pub rate_limiter: Arc<RateLimiter>,
    pub started_at: Instant,
}

impl AppState {
    /// State backed by the live Google APIs.
    pub fn new(config: AppConfig) -> Self {
        let backend = Arc::new(GoogleAnalyticsService::from_config(&config));
        Self::with_backend(config, backend)
    }

    pub fn with_backend(config: AppConfig, backend: Arc<dyn AnalyticsBackend>) -> Self {
        let rate_limiter = Arc::new(RateLimiter::from_config(&config.server.rate_limit));
        Self {
            config,
            backend,
            rate_limiter,
            started_at: Instant::now(),
        }
    }
}
