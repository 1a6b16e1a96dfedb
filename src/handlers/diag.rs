// handlers/diag.rs - diagnostics

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::state::AppState;

/// GET /api/diag/cache - credential cache snapshot (truncated key previews,
/// never full secrets).
pub async fn cache_stats(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.cache.stats().await;
    Json(json!({ "success": true, "data": stats }))
}
