use crate::cache::CredentialCache;
use crate::config;
use crate::gateway::Gateway;

/// Shared application state. Built once at startup and injected into every
/// handler through axum's `State`; nothing here is reachable as a global, so
/// tests can construct isolated instances.
#[derive(Clone)]
pub struct AppState {
    /// Gateway to the upstream data service.
    pub data: Gateway,
    /// Gateway to the upstream schema service.
    pub meta: Gateway,
    pub cache: CredentialCache,
}

impl AppState {
    pub fn from_config(cache: CredentialCache) -> Self {
        let upstream = &config::config().upstream;
        Self {
            data: Gateway::new(upstream.data_api_url.clone(), cache.clone()),
            meta: Gateway::new(upstream.meta_api_url.clone(), cache.clone()),
            cache,
        }
    }
}
