use axum::http::{HeaderMap, HeaderName, HeaderValue};
use httpmock::MockServer;

use schema_portal::cache::CredentialCache;
use schema_portal::gateway::{Gateway, InboundContext};

/// Gateway wired to a mock upstream, sharing a fresh credential cache.
pub fn gateway_for(server: &MockServer) -> (Gateway, CredentialCache) {
    let cache = CredentialCache::new();
    let gateway = Gateway::new(Some(server.base_url()), cache.clone());
    (gateway, cache)
}

/// Inbound request context carrying the given headers (names must be static
/// lowercase, axum-style).
pub fn inbound_with(pairs: &[(&'static str, &str)]) -> InboundContext {
    let mut headers = HeaderMap::new();
    for (name, value) in pairs {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_str(value).expect("test header value"),
        );
    }
    InboundContext::new(headers, None)
}
