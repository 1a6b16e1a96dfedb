// handlers/data.rs - /api/data/:schema[...] CRUD proxy handlers
//
// Thin glue: each handler builds the upstream path, picks the response shape,
// and delegates to the data-service gateway. The query string is forwarded
// verbatim so filtering/pagination stays an upstream concern.

use axum::extract::{Path, RawQuery, State};
use axum::http::Method;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::Value;

use crate::gateway::{ForwardOptions, InboundContext, RouteShape};
use crate::state::AppState;

fn with_query(path: String, query: Option<String>) -> String {
    match query {
        Some(q) if !q.is_empty() => format!("{path}?{q}"),
        _ => path,
    }
}

/// GET /api/data/:schema - list records
pub async fn schema_get(
    State(state): State<AppState>,
    Path(schema): Path<String>,
    RawQuery(query): RawQuery,
    inbound: InboundContext,
) -> impl IntoResponse {
    let path = with_query(format!("/api/data/{schema}"), query);
    state
        .data
        .forward(&inbound, RouteShape::List, &path, ForwardOptions::default())
        .await
}

/// POST /api/data/:schema - create record(s)
pub async fn schema_post(
    State(state): State<AppState>,
    Path(schema): Path<String>,
    inbound: InboundContext,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    state
        .data
        .forward(
            &inbound,
            RouteShape::Mutation,
            &format!("/api/data/{schema}"),
            ForwardOptions::method(Method::POST).with_body(body),
        )
        .await
}

/// PUT /api/data/:schema - bulk replace
pub async fn schema_put(
    State(state): State<AppState>,
    Path(schema): Path<String>,
    inbound: InboundContext,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    state
        .data
        .forward(
            &inbound,
            RouteShape::Mutation,
            &format!("/api/data/{schema}"),
            ForwardOptions::method(Method::PUT).with_body(body),
        )
        .await
}

/// PATCH /api/data/:schema - bulk update
pub async fn schema_patch(
    State(state): State<AppState>,
    Path(schema): Path<String>,
    inbound: InboundContext,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    state
        .data
        .forward(
            &inbound,
            RouteShape::Mutation,
            &format!("/api/data/{schema}"),
            ForwardOptions::method(Method::PATCH).with_body(body),
        )
        .await
}

/// DELETE /api/data/:schema - bulk delete (body optional: ids/filter)
pub async fn schema_delete(
    State(state): State<AppState>,
    Path(schema): Path<String>,
    RawQuery(query): RawQuery,
    inbound: InboundContext,
    body: Option<Json<Value>>,
) -> impl IntoResponse {
    let mut options = ForwardOptions::method(Method::DELETE);
    if let Some(Json(body)) = body {
        options = options.with_body(body);
    }
    let path = with_query(format!("/api/data/{schema}"), query);
    state
        .data
        .forward(&inbound, RouteShape::Mutation, &path, options)
        .await
}

/// GET /api/data/:schema/:id - show single record
pub async fn record_get(
    State(state): State<AppState>,
    Path((schema, id)): Path<(String, String)>,
    RawQuery(query): RawQuery,
    inbound: InboundContext,
) -> impl IntoResponse {
    let path = with_query(format!("/api/data/{schema}/{id}"), query);
    state
        .data
        .forward(&inbound, RouteShape::Detail, &path, ForwardOptions::default())
        .await
}

/// PUT /api/data/:schema/:id - replace single record
pub async fn record_put(
    State(state): State<AppState>,
    Path((schema, id)): Path<(String, String)>,
    inbound: InboundContext,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    state
        .data
        .forward(
            &inbound,
            RouteShape::Mutation,
            &format!("/api/data/{schema}/{id}"),
            ForwardOptions::method(Method::PUT).with_body(body),
        )
        .await
}

/// PATCH /api/data/:schema/:id - partially update single record
pub async fn record_patch(
    State(state): State<AppState>,
    Path((schema, id)): Path<(String, String)>,
    inbound: InboundContext,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    state
        .data
        .forward(
            &inbound,
            RouteShape::Mutation,
            &format!("/api/data/{schema}/{id}"),
            ForwardOptions::method(Method::PATCH).with_body(body),
        )
        .await
}

/// DELETE /api/data/:schema/:id - delete single record
pub async fn record_delete(
    State(state): State<AppState>,
    Path((schema, id)): Path<(String, String)>,
    inbound: InboundContext,
) -> impl IntoResponse {
    state
        .data
        .forward(
            &inbound,
            RouteShape::Mutation,
            &format!("/api/data/{schema}/{id}"),
            ForwardOptions::method(Method::DELETE),
        )
        .await
}
