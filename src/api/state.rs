//! Application state shared by every handler.

use std::sync::Arc;

use crate::config::{
    Config, RATE_LIMIT_AUTH_REQUESTS, RATE_LIMIT_AUTH_WINDOW_SECONDS, RATE_LIMIT_REQUESTS,
    RATE_LIMIT_WINDOW_SECONDS,
};
use crate::infra::{Database, FileStorage, Notifier, RateLimiter};
use crate::services::{ServiceContainer, Services};

/// The two rate limit tiers
#[derive(Clone)]
pub struct RateLimits {
    pub general: Arc<RateLimiter>,
    pub auth: Arc<RateLimiter>,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            general: Arc::new(RateLimiter::new(RATE_LIMIT_REQUESTS, RATE_LIMIT_WINDOW_SECONDS)),
            auth: Arc::new(RateLimiter::new(
                RATE_LIMIT_AUTH_REQUESTS,
                RATE_LIMIT_AUTH_WINDOW_SECONDS,
            )),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub services: Arc<dyn ServiceContainer>,
    pub storage: Arc<FileStorage>,
    pub rate_limits: RateLimits,
    /// Used by the health check; absent when services are injected directly
    pub database: Option<Arc<Database>>,
}

impl AppState {
    /// Wire the full service container on top of the database.
    pub fn from_config(database: Arc<Database>, config: Config, notifier: Arc<dyn Notifier>) -> Self {
        let storage = FileStorage::new(config.upload_dir.clone(), config.max_upload_bytes);
        let services = Services::from_connection(database.shared_connection(), config, notifier);

        Self {
            services: Arc::new(services),
            storage: Arc::new(storage),
            rate_limits: RateLimits::default(),
            database: Some(database),
        }
    }

    /// State with manually injected services.
    pub fn new(services: Arc<dyn ServiceContainer>, storage: FileStorage) -> Self {
        Self {
            services,
            storage: Arc::new(storage),
            rate_limits: RateLimits::default(),
            database: None,
        }
    }

    pub fn with_rate_limits(mut self, rate_limits: RateLimits) -> Self {
        self.rate_limits = rate_limits;
        self
    }
}
