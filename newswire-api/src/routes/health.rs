//! Health check endpoints

use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use serde::Serialize;

use newswire_services::CacheStats;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    providers: usize,
    /// Providers that can currently be called (keyless, or with a usable key)
    usable_providers: usize,
    cache: CacheStats,
}

/// Health check handler
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let aggregator = &state.aggregator;
    let providers = aggregator.providers();

    let keyless = providers.iter().filter(|p| !p.requires_key).count();
    let keyed_usable = aggregator
        .provider_statuses()
        .await
        .iter()
        .filter(|s| s.has_usable_key)
        .count();
    let usable_providers = keyless + keyed_usable;

    let status = if usable_providers > 0 {
        "healthy"
    } else {
        "degraded"
    };

    let response = HealthResponse {
        status: status.to_string(),
        providers: providers.len(),
        usable_providers,
        cache: aggregator.cache().stats(),
    };

    let code = if status == "healthy" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (code, Json(response))
}

/// Simple liveness check (always returns OK if server is running)
async fn liveness() -> &'static str {
    "OK"
}

/// Create health routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/live", get(liveness))
}
