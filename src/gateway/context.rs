// Per-call resolution of the outbound request context: tenant domain, bearer
// credential, and caller fingerprint. Every step degrades to "absent" rather
// than failing the call; the upstream service is the final authority.

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::Value;
use std::convert::Infallible;
use url::Url;

use crate::cache::CredentialCache;
use crate::config;

/// Read-only view of the inbound request that the gateway resolves against.
#[derive(Debug, Clone)]
pub struct InboundContext {
    pub headers: HeaderMap,
    /// Hostname from the request target, when the client sent an absolute URI.
    pub hostname: Option<String>,
}

impl InboundContext {
    pub fn new(headers: HeaderMap, hostname: Option<String>) -> Self {
        Self { headers, hostname }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    /// Value of a named cookie from the Cookie header, if present.
    pub fn cookie(&self, name: &str) -> Option<String> {
        let raw = self.header("cookie")?;
        for pair in raw.split(';') {
            if let Some((key, value)) = pair.trim().split_once('=') {
                if key == name && !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
        None
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for InboundContext {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::new(
            parts.headers.clone(),
            parts.uri.host().map(str::to_string),
        ))
    }
}

/// Ephemeral result of the resolution steps; built fresh per forward call and
/// never cached.
#[derive(Debug, Clone, Default)]
pub struct ResolvedOutboundContext {
    pub tenant_domain: Option<String>,
    pub bearer_token: Option<String>,
    pub fingerprint: Option<String>,
}

pub async fn resolve(inbound: &InboundContext, cache: &CredentialCache) -> ResolvedOutboundContext {
    let bearer_token = resolve_bearer(inbound, cache).await;
    ResolvedOutboundContext {
        tenant_domain: resolve_tenant(inbound),
        fingerprint: resolve_fingerprint(inbound, bearer_token.as_deref()),
        bearer_token,
    }
}

/// Tenant resolution, first match wins:
/// explicit tenant header > forwarded host > host header > request hostname.
///
/// Host-derived values are lower-cased, stripped of any port suffix, and
/// suppressed entirely for localhost/loopback: local calls have no tenant.
pub fn resolve_tenant(inbound: &InboundContext) -> Option<String> {
    let auth_cfg = &config::config().auth;

    if let Some(raw) = inbound.header(&auth_cfg.tenant_header) {
        if raw.contains("://") {
            if let Ok(parsed) = Url::parse(raw) {
                if let Some(host) = parsed.host_str() {
                    return Some(host.to_lowercase());
                }
            }
        }
        return Some(raw.to_lowercase());
    }

    let raw_host = inbound
        .header("x-forwarded-host")
        .or_else(|| inbound.header("host"))
        .map(str::to_string)
        .or_else(|| inbound.hostname.clone())?;

    let host = strip_port(&raw_host.to_lowercase())?;
    match host.as_str() {
        "localhost" | "127.0.0.1" | "::1" => None,
        _ => Some(host),
    }
}

fn strip_port(host: &str) -> Option<String> {
    let stripped = if let Some(rest) = host.strip_prefix('[') {
        // Bracketed IPv6 literal, possibly with a port after the bracket.
        rest.split(']').next().unwrap_or(rest)
    } else if host.matches(':').count() > 1 {
        // Bare IPv6 literal has no port to strip.
        host
    } else {
        host.split(':').next().unwrap_or(host)
    };

    let stripped = stripped.trim();
    if stripped.is_empty() {
        None
    } else {
        Some(stripped.to_string())
    }
}

/// Credential resolution: refresh-token cookie via the cache first, then a
/// passed-through Authorization header for direct API callers. Missing
/// credentials log a warning and the call proceeds without one.
pub async fn resolve_bearer(inbound: &InboundContext, cache: &CredentialCache) -> Option<String> {
    let auth_cfg = &config::config().auth;

    if let Some(refresh_token) = inbound.cookie(&auth_cfg.refresh_cookie) {
        if let Some(access_token) = cache.lookup(&refresh_token).await {
            return Some(format!("Bearer {access_token}"));
        }
        tracing::warn!("refresh cookie present but no cached access token for it");
    }

    if let Some(raw) = inbound.header("authorization") {
        return Some(normalize_bearer(raw));
    }

    tracing::warn!("forwarding upstream without credentials; upstream will authorize");
    None
}

fn normalize_bearer(raw: &str) -> String {
    if raw.len() >= 7 && raw[..7].eq_ignore_ascii_case("bearer ") {
        raw.to_string()
    } else {
        format!("Bearer {raw}")
    }
}

/// Fingerprint resolution: explicit header > cookie > best-effort probe of a
/// three-part signed token's payload segment. The probe never verifies the
/// signature and swallows every failure.
pub fn resolve_fingerprint(inbound: &InboundContext, bearer: Option<&str>) -> Option<String> {
    let auth_cfg = &config::config().auth;

    if let Some(value) = inbound.header(&auth_cfg.fingerprint_header) {
        return Some(value.to_string());
    }
    if let Some(value) = inbound.cookie(&auth_cfg.fingerprint_cookie) {
        return Some(value);
    }
    bearer.and_then(fingerprint_from_bearer)
}

fn fingerprint_from_bearer(bearer: &str) -> Option<String> {
    let token = if bearer.len() >= 7 && bearer[..7].eq_ignore_ascii_case("bearer ") {
        bearer[7..].trim()
    } else {
        bearer.trim()
    };

    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return None;
    }

    let payload = URL_SAFE_NO_PAD
        .decode(segments[1].trim_end_matches('='))
        .ok()?;
    let claims: Value = serde_json::from_slice(&payload).ok()?;
    claims
        .get("fingerprint")
        .and_then(Value::as_str)
        .map(str::to_string)
}
