// handlers/meta.rs - /api/meta/:schema schema-definition proxy handlers
//
// Same glue as the data routes, pointed at the schema service upstream.

use axum::extract::{Path, State};
use axum::http::Method;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::Value;

use crate::gateway::{ForwardOptions, InboundContext, RouteShape};
use crate::state::AppState;

/// GET /api/meta/:schema - fetch one schema definition
pub async fn schema_get(
    State(state): State<AppState>,
    Path(schema): Path<String>,
    inbound: InboundContext,
) -> impl IntoResponse {
    state
        .meta
        .forward(
            &inbound,
            RouteShape::Detail,
            &format!("/api/meta/{schema}"),
            ForwardOptions::default(),
        )
        .await
}

/// POST /api/meta/:schema - create schema definition
pub async fn schema_post(
    State(state): State<AppState>,
    Path(schema): Path<String>,
    inbound: InboundContext,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    state
        .meta
        .forward(
            &inbound,
            RouteShape::Mutation,
            &format!("/api/meta/{schema}"),
            ForwardOptions::method(Method::POST).with_body(body),
        )
        .await
}

/// PUT /api/meta/:schema - replace schema definition
pub async fn schema_put(
    State(state): State<AppState>,
    Path(schema): Path<String>,
    inbound: InboundContext,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    state
        .meta
        .forward(
            &inbound,
            RouteShape::Mutation,
            &format!("/api/meta/{schema}"),
            ForwardOptions::method(Method::PUT).with_body(body),
        )
        .await
}

/// DELETE /api/meta/:schema - delete schema definition
pub async fn schema_delete(
    State(state): State<AppState>,
    Path(schema): Path<String>,
    inbound: InboundContext,
) -> impl IntoResponse {
    state
        .meta
        .forward(
            &inbound,
            RouteShape::Mutation,
            &format!("/api/meta/{schema}"),
            ForwardOptions::method(Method::DELETE),
        )
        .await
}
