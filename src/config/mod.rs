use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub auth: AuthConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub enable_request_logging: bool,
}

/// Base URLs of the upstream services this portal forwards to.
/// An unset URL is a configuration error surfaced per call, not at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    pub data_api_url: Option<String>,
    pub meta_api_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Cookie carrying the rotating refresh token.
    pub refresh_cookie: String,
    /// Cookie carrying the caller fingerprint.
    pub fingerprint_cookie: String,
    /// Header carrying the caller fingerprint.
    pub fingerprint_header: String,
    /// Header carrying an explicit tenant domain (may be an absolute URL).
    pub tenant_header: String,
    /// Max-Age for the refresh cookie set by the session routes.
    pub refresh_cookie_max_age_secs: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub sweep_interval_secs: u64,
    /// TTL applied when an upstream token response carries no expires_in.
    pub default_ttl_secs: i64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Ok(v) = env::var("PORTAL_PORT").or_else(|_| env::var("PORT")) {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }
        if let Ok(v) = env::var("PORTAL_ENABLE_REQUEST_LOGGING") {
            self.server.enable_request_logging = v.parse().unwrap_or(self.server.enable_request_logging);
        }

        // Upstream overrides
        if let Ok(v) = env::var("PORTAL_DATA_API_URL") {
            if !v.trim().is_empty() {
                self.upstream.data_api_url = Some(v);
            }
        }
        if let Ok(v) = env::var("PORTAL_META_API_URL") {
            if !v.trim().is_empty() {
                self.upstream.meta_api_url = Some(v);
            }
        }

        // Auth overrides
        if let Ok(v) = env::var("PORTAL_REFRESH_COOKIE") {
            self.auth.refresh_cookie = v;
        }
        if let Ok(v) = env::var("PORTAL_FINGERPRINT_COOKIE") {
            self.auth.fingerprint_cookie = v;
        }
        if let Ok(v) = env::var("PORTAL_FINGERPRINT_HEADER") {
            self.auth.fingerprint_header = v.to_lowercase();
        }
        if let Ok(v) = env::var("PORTAL_TENANT_HEADER") {
            self.auth.tenant_header = v.to_lowercase();
        }
        if let Ok(v) = env::var("PORTAL_REFRESH_COOKIE_MAX_AGE_SECS") {
            self.auth.refresh_cookie_max_age_secs =
                v.parse().unwrap_or(self.auth.refresh_cookie_max_age_secs);
        }

        // Cache overrides
        if let Ok(v) = env::var("PORTAL_CACHE_SWEEP_INTERVAL_SECS") {
            self.cache.sweep_interval_secs = v.parse().unwrap_or(self.cache.sweep_interval_secs);
        }
        if let Ok(v) = env::var("PORTAL_CACHE_DEFAULT_TTL_SECS") {
            self.cache.default_ttl_secs = v.parse().unwrap_or(self.cache.default_ttl_secs);
        }

        self
    }

    fn base(environment: Environment) -> Self {
        Self {
            environment,
            server: ServerConfig {
                port: 3000,
                enable_request_logging: true,
            },
            upstream: UpstreamConfig {
                data_api_url: None,
                meta_api_url: None,
            },
            auth: AuthConfig {
                refresh_cookie: "portal_refresh".to_string(),
                fingerprint_cookie: "portal_fp".to_string(),
                fingerprint_header: "x-fingerprint".to_string(),
                tenant_header: "x-tenant-domain".to_string(),
                refresh_cookie_max_age_secs: 30 * 24 * 3600,
            },
            cache: CacheConfig {
                sweep_interval_secs: 300,
                default_ttl_secs: 900,
            },
        }
    }

    fn development() -> Self {
        Self::base(Environment::Development)
    }

    fn staging() -> Self {
        Self::base(Environment::Staging)
    }

    fn production() -> Self {
        let mut config = Self::base(Environment::Production);
        config.server.enable_request_logging = false;
        config
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.auth.refresh_cookie, "portal_refresh");
        assert_eq!(config.cache.sweep_interval_secs, 300);
        assert!(config.upstream.data_api_url.is_none());
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert!(!config.server.enable_request_logging);
        assert_eq!(config.cache.default_ttl_secs, 900);
    }
}
