//! Provider status and cache control endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tracing::info;

use newswire_providers::KeyStatus;
use newswire_services::{AggregatorError, ProviderInfo};

use crate::AppState;

#[derive(Debug, Serialize)]
struct ProviderEntry {
    #[serde(flatten)]
    info: ProviderInfo,
    /// Only present for providers that use keys
    #[serde(skip_serializing_if = "Option::is_none")]
    key_status: Option<KeyStatus>,
}

/// Create provider routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/providers", get(list_providers))
        .route("/providers/{id}/status", get(provider_status))
        .route("/cache/refresh", post(refresh_cache))
}

/// GET /api/providers - Enabled providers with their key status
async fn list_providers(State(state): State<AppState>) -> Json<Vec<ProviderEntry>> {
    let mut entries = Vec::new();
    for info in state.aggregator.providers() {
        let key_status = if info.requires_key {
            state.aggregator.get_status(&info.id).await.ok()
        } else {
            None
        };
        entries.push(ProviderEntry { info, key_status });
    }
    Json(entries)
}

/// GET /api/providers/{id}/status - Key status for one provider
async fn provider_status(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.aggregator.get_status(&id).await {
        Ok(status) => (StatusCode::OK, Json(status)).into_response(),
        Err(AggregatorError::UnknownProvider(id)) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("Unknown provider: {}", id) })),
        )
            .into_response(),
        Err(e) => super::news::unavailable(&e),
    }
}

/// POST /api/cache/refresh - Drop every cached feed
async fn refresh_cache(State(state): State<AppState>) -> Json<serde_json::Value> {
    let dropped = state.aggregator.refresh_cache();
    info!("Cache refreshed via API ({} entries dropped)", dropped);
    Json(serde_json::json!({ "dropped": dropped }))
}
