//! API route definitions

mod health;
mod news;
mod providers;
mod track;

use axum::Router;
use crate::AppState;

/// Create all API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(news::routes())
        .merge(providers::routes())
        .merge(track::routes())
}

/// Create health routes (served outside `/api`)
pub fn health_routes() -> Router<AppState> {
    health::routes()
}
