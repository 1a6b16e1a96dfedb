// handlers/auth.rs - session routes
//
// Credential issuance stays upstream; these handlers move the issued secrets
// into the server-side credential cache and an HttpOnly cookie so they never
// reach the browser as response payload.

use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::config;
use crate::error::ApiError;
use crate::gateway::{ForwardOptions, InboundContext, RouteShape};
use crate::state::AppState;

/// Token fields as found in an upstream login/refresh envelope.
struct IssuedTokens {
    refresh_token: String,
    access_token: String,
    ttl_secs: i64,
}

fn issued_tokens(envelope: &Value) -> Option<IssuedTokens> {
    let data = match envelope.get("data") {
        Some(data) if data.is_object() => data,
        _ => envelope,
    };
    let access_token = data
        .get("access_token")
        .or_else(|| data.get("token"))
        .and_then(Value::as_str)?
        .to_string();
    let refresh_token = data.get("refresh_token").and_then(Value::as_str)?.to_string();
    let ttl_secs = data
        .get("expires_in")
        .and_then(Value::as_i64)
        .unwrap_or(config::config().cache.default_ttl_secs);
    Some(IssuedTokens {
        refresh_token,
        access_token,
        ttl_secs,
    })
}

/// Remove token material from an upstream envelope before it leaves the
/// portal. The browser only ever holds the HttpOnly refresh cookie.
fn strip_token_fields(envelope: &mut Value) {
    if let Some(obj) = envelope.get_mut("data").and_then(Value::as_object_mut) {
        obj.remove("access_token");
        obj.remove("refresh_token");
        obj.remove("token");
    }
    if let Some(obj) = envelope.as_object_mut() {
        obj.remove("access_token");
        obj.remove("refresh_token");
        obj.remove("token");
    }
}

fn refresh_cookie(value: &str, max_age_secs: i64) -> String {
    let name = &config::config().auth.refresh_cookie;
    format!("{name}={value}; HttpOnly; Path=/; Max-Age={max_age_secs}; SameSite=Lax")
}

fn expired_refresh_cookie() -> String {
    refresh_cookie("", 0)
}

fn with_set_cookie(mut response: Response, cookie: String) -> Response {
    match HeaderValue::from_str(&cookie) {
        Ok(value) => {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        Err(e) => tracing::warn!(error = %e, "refresh cookie value could not be encoded"),
    }
    response
}

/// POST /auth/login - proxy credentials upstream; on success cache the issued
/// tokens and hand the browser only the refresh cookie.
pub async fn login(
    State(state): State<AppState>,
    inbound: InboundContext,
    Json(body): Json<Value>,
) -> Response {
    if !body.is_object() {
        return ApiError::bad_request("login body must be a JSON object").into_response();
    }

    let reply = state
        .data
        .forward(
            &inbound,
            RouteShape::Mutation,
            "/auth/login",
            ForwardOptions::method(Method::POST).with_body(body),
        )
        .await;

    if !reply.is_success() {
        return reply.into_response();
    }
    let Some(mut envelope) = reply.body.clone() else {
        return reply.into_response();
    };
    let Some(tokens) = issued_tokens(&envelope) else {
        tracing::warn!("upstream login succeeded but returned no token pair");
        return reply.into_response();
    };

    state
        .cache
        .store(&tokens.refresh_token, &tokens.access_token, tokens.ttl_secs)
        .await;
    strip_token_fields(&mut envelope);

    let cookie = refresh_cookie(
        &tokens.refresh_token,
        config::config().auth.refresh_cookie_max_age_secs,
    );
    with_set_cookie((reply.status, Json(envelope)).into_response(), cookie)
}

/// POST /auth/refresh - rotate the session's refresh token upstream and
/// re-key the cache entry atomically.
pub async fn refresh(State(state): State<AppState>, inbound: InboundContext) -> Response {
    let Some(old_refresh) = inbound.cookie(&config::config().auth.refresh_cookie) else {
        return ApiError::unauthorized("missing refresh cookie").into_response();
    };

    let reply = state
        .data
        .forward(
            &inbound,
            RouteShape::Mutation,
            "/auth/refresh",
            ForwardOptions::method(Method::POST)
                .with_body(json!({ "refresh_token": old_refresh })),
        )
        .await;

    if !reply.is_success() {
        return reply.into_response();
    }
    let Some(mut envelope) = reply.body.clone() else {
        return reply.into_response();
    };
    let Some(tokens) = issued_tokens(&envelope) else {
        tracing::warn!("upstream refresh succeeded but returned no token pair");
        return reply.into_response();
    };

    state
        .cache
        .rotate(
            &old_refresh,
            &tokens.refresh_token,
            &tokens.access_token,
            tokens.ttl_secs,
        )
        .await;
    strip_token_fields(&mut envelope);

    let cookie = refresh_cookie(
        &tokens.refresh_token,
        config::config().auth.refresh_cookie_max_age_secs,
    );
    with_set_cookie((reply.status, Json(envelope)).into_response(), cookie)
}

/// DELETE /auth/session - drop the cached session and expire the cookie.
/// Idempotent: logging out twice is still a success.
pub async fn logout(State(state): State<AppState>, inbound: InboundContext) -> Response {
    if let Some(refresh_token) = inbound.cookie(&config::config().auth.refresh_cookie) {
        state.cache.remove(&refresh_token).await;
    }

    let body = json!({ "success": true, "data": { "logged_out": true } });
    with_set_cookie(
        (StatusCode::OK, Json(body)).into_response(),
        expired_refresh_cookie(),
    )
}
