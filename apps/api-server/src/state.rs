//! Application state - shared across all handlers.

use std::sync::Arc;

use actix_web::http::header::HeaderName;
use quota_core::RateLimiter;
use quota_core::ports::CounterStore;
use quota_infra::InMemoryCounterStore;

use crate::config::{AppConfig, StorageConfig};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub limiter: Arc<RateLimiter>,
    pub store: Arc<dyn CounterStore>,
    pub api_key_header: HeaderName,
}

/// Errors raised while wiring the application.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[cfg(feature = "redis")]
    #[error("Failed to connect to Redis: {0}")]
    Store(#[from] quota_core::StoreError),

    #[cfg(not(feature = "redis"))]
    #[error("Redis storage requested but the server was built without the redis feature")]
    RedisUnsupported,
}

/// Open the configured counter store.
/// An unreachable Redis is an error; there is no fallback to memory.
async fn open_store(storage: &StorageConfig) -> Result<Arc<dyn CounterStore>, StartupError> {
    match storage {
        #[cfg(feature = "redis")]
        StorageConfig::Redis {
            url,
            connect_timeout,
            key_prefix,
        } => {
            let config = quota_infra::RedisConfig {
                url: url.clone(),
                connect_timeout: *connect_timeout,
                key_prefix: key_prefix.clone(),
            };
            let store: Arc<dyn CounterStore> =
                Arc::new(quota_infra::RedisCounterStore::new(config).await?);
            Ok(store)
        }
        #[cfg(not(feature = "redis"))]
        StorageConfig::Redis { .. } => Err(StartupError::RedisUnsupported),
        StorageConfig::Memory => {
            tracing::warn!("Using in-memory counter store - limits are per-process");
            let store: Arc<dyn CounterStore> = Arc::new(InMemoryCounterStore::new());
            Ok(store)
        }
    }
}

impl AppState {
    /// Build the application state from configuration.
    pub async fn new(config: &AppConfig) -> Result<Self, StartupError> {
        let store = open_store(&config.storage).await?;

        let limiter = RateLimiter::new(store.clone(), config.ip_policy)
            .with_token_policies(config.token_policies.clone())
            .with_timeout(config.decision_timeout);

        tracing::info!(
            backend = config.storage.name(),
            token_policies = limiter.token_policies().len(),
            "Application state initialized"
        );

        Ok(Self {
            limiter: Arc::new(limiter),
            store,
            api_key_header: config.api_key_header.clone(),
        })
    }

    /// Close the counter store; called once the server has stopped.
    pub async fn shutdown(&self) {
        if let Err(e) = self.store.close().await {
            tracing::error!(error = %e, "Failed to close counter store");
        }
    }
}
