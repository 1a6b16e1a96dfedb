// Outbound request gateway: every CRUD and schema route delegates here before
// talking to an upstream service. Resolves the outbound context, issues one
// HTTP call, and normalizes whatever comes back. Failures become envelopes,
// never panics or errors crossing the handler boundary.

pub mod context;
pub mod normalize;

pub use context::{InboundContext, ResolvedOutboundContext};
pub use normalize::RouteShape;

use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde_json::Value;

use crate::cache::CredentialCache;
use crate::config;
use crate::error::ApiError;

#[derive(Debug, thiserror::Error)]
enum UpstreamError {
    #[error("upstream base URL is not configured")]
    Unconfigured,
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl From<&UpstreamError> for ApiError {
    fn from(e: &UpstreamError) -> Self {
        match e {
            UpstreamError::Unconfigured => ApiError::internal_server_error(e.to_string()),
            UpstreamError::Transport(_) => ApiError::bad_gateway(e.to_string()),
        }
    }
}

/// Caller-supplied overrides for a forward call.
#[derive(Debug, Clone, Default)]
pub struct ForwardOptions {
    pub method: Option<Method>,
    pub body: Option<Value>,
    pub extra_headers: Vec<(String, String)>,
}

impl ForwardOptions {
    pub fn method(method: Method) -> Self {
        Self {
            method: Some(method),
            ..Default::default()
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.push((name.into(), value.into()));
        self
    }
}

/// Normalized upstream reply: the original status plus the canonical
/// envelope, suitable for direct re-emission by the calling handler.
/// A `None` body means a no-content response and is re-emitted as such.
#[derive(Debug, Clone)]
pub struct ForwardReply {
    pub status: StatusCode,
    pub body: Option<Value>,
}

impl ForwardReply {
    fn from_error(error: ApiError) -> Self {
        Self {
            status: StatusCode::from_u16(error.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            body: Some(error.to_json()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.body
            .as_ref()
            .and_then(|b| b.get("success"))
            .and_then(Value::as_bool)
            .unwrap_or(self.status.as_u16() < 400)
    }
}

impl IntoResponse for ForwardReply {
    fn into_response(self) -> Response {
        match self.body {
            Some(body) => (self.status, Json(body)).into_response(),
            None => self.status.into_response(),
        }
    }
}

/// One gateway per upstream service, sharing the process-wide credential
/// cache. Cloning shares the HTTP client and the cache.
#[derive(Debug, Clone)]
pub struct Gateway {
    client: reqwest::Client,
    base_url: Option<String>,
    cache: CredentialCache,
}

impl Gateway {
    pub fn new(base_url: Option<String>, cache: CredentialCache) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            cache,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }

    /// Forward the inbound request to `<base URL><path>` and normalize the
    /// response for `shape`. Total: every failure mode comes back as an
    /// envelope with success/failure encoded in the body.
    pub async fn forward(
        &self,
        inbound: &InboundContext,
        shape: RouteShape,
        path: &str,
        options: ForwardOptions,
    ) -> ForwardReply {
        match self.forward_inner(inbound, shape, path, options).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(path, error = %e, "gateway forward failed");
                ForwardReply::from_error(ApiError::from(&e))
            }
        }
    }

    async fn forward_inner(
        &self,
        inbound: &InboundContext,
        shape: RouteShape,
        path: &str,
        options: ForwardOptions,
    ) -> Result<ForwardReply, UpstreamError> {
        let base = self.base_url.as_deref().ok_or(UpstreamError::Unconfigured)?;
        let resolved = context::resolve(inbound, &self.cache).await;

        let method = options.method.unwrap_or(Method::GET);
        let url = format!("{}{}", base.trim_end_matches('/'), path);

        // Fresh header set: only the resolved Authorization/tenant/fingerprint
        // headers and explicit caller overrides go upstream. Inbound headers
        // are never copied wholesale.
        let auth_cfg = &config::config().auth;
        let mut request = self.client.request(method, &url);
        if let Some(bearer) = &resolved.bearer_token {
            request = request.header(header::AUTHORIZATION, bearer.as_str());
        }
        if let Some(tenant) = &resolved.tenant_domain {
            request = request.header(auth_cfg.tenant_header.as_str(), tenant.as_str());
        }
        if let Some(fingerprint) = &resolved.fingerprint {
            request = request.header(auth_cfg.fingerprint_header.as_str(), fingerprint.as_str());
        }
        for (name, value) in &options.extra_headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &options.body {
            request = request.json(body);
        }

        // The single suspension point. Dropping this future aborts the
        // in-flight call; no internal timeout or retry.
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::NO_CONTENT || status == StatusCode::RESET_CONTENT {
            return Ok(ForwardReply { status, body: None });
        }

        let declared_json = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("json"))
            .unwrap_or(false);
        let text = response.text().await?;

        let body = if declared_json {
            match serde_json::from_str::<Value>(&text) {
                Ok(payload) => normalize::normalize_json(shape, status, payload),
                Err(e) => {
                    tracing::warn!(path, error = %e, "upstream declared JSON but body failed to parse");
                    normalize::normalize_text(status, &text)
                }
            }
        } else {
            normalize::normalize_text(status, &text)
        };

        Ok(ForwardReply {
            status,
            body: Some(body),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;

    #[tokio::test]
    async fn unconfigured_base_url_is_a_local_500_envelope() {
        let gateway = Gateway::new(None, CredentialCache::new());
        let inbound = InboundContext::new(HeaderMap::new(), None);

        let reply = gateway
            .forward(&inbound, RouteShape::List, "/api/data/users", ForwardOptions::default())
            .await;

        assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
        let body = reply.body.unwrap();
        assert_eq!(body["success"], serde_json::json!(false));
        assert_eq!(body["code"], serde_json::json!("INTERNAL_SERVER_ERROR"));
        assert!(body["error"].as_str().unwrap().contains("not configured"));
    }

    #[tokio::test]
    async fn unreachable_upstream_is_a_502_envelope() {
        // Port 1 on loopback refuses the connection immediately.
        let gateway = Gateway::new(
            Some("http://127.0.0.1:1".to_string()),
            CredentialCache::new(),
        );
        let inbound = InboundContext::new(HeaderMap::new(), None);

        let reply = gateway
            .forward(&inbound, RouteShape::Detail, "/api/data/users/1", ForwardOptions::default())
            .await;

        assert_eq!(reply.status, StatusCode::BAD_GATEWAY);
        let body = reply.body.unwrap();
        assert_eq!(body["success"], serde_json::json!(false));
        assert_eq!(body["code"], serde_json::json!("BAD_GATEWAY"));
        assert!(body["error"].as_str().unwrap().contains("upstream request failed"));
    }
}
