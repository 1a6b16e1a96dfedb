use axum::routing::get;
use axum::{extract::State, response::IntoResponse, Json, Router};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config;
use crate::error::ApiError;
use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let router = Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        // Session routes (token acquisition / teardown)
        .merge(auth_routes())
        // Proxied API
        .merge(data_routes())
        .merge(meta_routes())
        .merge(diag_routes())
        .fallback(not_found)
        // Global middleware
        .layer(CorsLayer::permissive());

    let router = if config::config().server.enable_request_logging {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    };

    router.with_state(state)
}

fn auth_routes() -> Router<AppState> {
    use axum::routing::{delete, post};
    use crate::handlers::auth;

    Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/session", delete(auth::logout))
}

fn data_routes() -> Router<AppState> {
    use crate::handlers::data;

    Router::new()
        // Schema-level operations (collection)
        .route(
            "/api/data/:schema",
            get(data::schema_get)
                .post(data::schema_post)
                .put(data::schema_put)
                .patch(data::schema_patch)
                .delete(data::schema_delete),
        )
        // Record-level operations (individual)
        .route(
            "/api/data/:schema/:id",
            get(data::record_get)
                .put(data::record_put)
                .patch(data::record_patch)
                .delete(data::record_delete),
        )
}

fn meta_routes() -> Router<AppState> {
    use crate::handlers::meta;

    Router::new()
        // Schema definition management
        .route(
            "/api/meta/:schema",
            get(meta::schema_get)
                .post(meta::schema_post)
                .put(meta::schema_put)
                .delete(meta::schema_delete),
        )
}

fn diag_routes() -> Router<AppState> {
    use crate::handlers::diag;

    Router::new().route("/api/diag/cache", get(diag::cache_stats))
}

async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "Schema Portal",
            "version": version,
            "description": "Schema-driven CRUD portal backend proxying to an upstream data/schema service",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "auth": "/auth/login, /auth/refresh, /auth/session (public - session management)",
                "data": "/api/data/:schema[/:record] (proxied)",
                "meta": "/api/meta/:schema (proxied)",
                "diag": "/api/diag/cache (diagnostics)",
            }
        }
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();
    let upstream = &config::config().upstream;
    let stats = state.cache.stats().await;

    if state.data.is_configured() {
        (
            axum::http::StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "data_api_configured": true,
                    "meta_api_configured": upstream.meta_api_url.is_some(),
                    "cached_sessions": stats.size,
                }
            })),
        )
    } else {
        let error = ApiError::service_unavailable("data API base URL not configured");
        let mut body = error.to_json();
        body["data"] = json!({
            "status": "degraded",
            "timestamp": now,
            "data_api_configured": false,
            "meta_api_configured": upstream.meta_api_url.is_some(),
            "cached_sessions": stats.size,
        });
        (axum::http::StatusCode::SERVICE_UNAVAILABLE, Json(body))
    }
}

async fn not_found(uri: axum::http::Uri) -> ApiError {
    ApiError::not_found(format!("no route for {}", uri.path()))
}
