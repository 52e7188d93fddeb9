//! Reader interaction tracking

use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, post},
    Json, Router,
};
use serde::Deserialize;

use newswire_core::{Article, TrackingEvent};

use crate::AppState;

/// Body of POST /api/track
#[derive(Debug, Deserialize)]
pub struct TrackRequest {
    pub article: Article,
    pub event: TrackingEvent,
}

/// Create tracking routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/track", post(track))
        .route("/profile", delete(reset_profile))
}

/// POST /api/track - Record a read, bookmark, skip or share
async fn track(State(state): State<AppState>, Json(request): Json<TrackRequest>) -> StatusCode {
    state.aggregator.track(&request.article, request.event);
    StatusCode::NO_CONTENT
}

/// DELETE /api/profile - Forget the reader's preferences
async fn reset_profile(State(state): State<AppState>) -> StatusCode {
    state.aggregator.reset_profile();
    StatusCode::NO_CONTENT
}
