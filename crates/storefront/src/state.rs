//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::api::{ApiClient, ApiError};
use crate::config::StorefrontConfig;
use crate::realtime::NotificationHub;

/// Application state shared across all handlers.
///
/// Cheap to clone; everything lives behind one `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    api: ApiClient,
    hub: NotificationHub,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend HTTP client cannot be built.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, ApiError> {
        let api = ApiClient::new(&config.backend)?;
        let hub = NotificationHub::new(config.backend.socket_url.clone());

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                api,
                hub,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Session store pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Backend REST client.
    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    /// Live notification rooms.
    #[must_use]
    pub fn hub(&self) -> &NotificationHub {
        &self.inner.hub
    }
}
