//! News feed endpoints

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::error;

use newswire_core::{Article, Category};
use newswire_services::AggregatorError;

use crate::AppState;

/// Query parameters for the main feed
#[derive(Debug, Deserialize)]
pub struct NewsQuery {
    /// Category name or alias; omitted means all categories
    pub category: Option<String>,
    /// Use the local/regional/global tier pipeline
    #[serde(default = "default_location")]
    pub location: bool,
}

/// Query parameters for search
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    #[serde(default = "default_location")]
    pub location: bool,
}

fn default_location() -> bool {
    true
}

#[derive(Debug, Serialize)]
struct NewsResponse {
    count: usize,
    articles: Vec<Article>,
}

impl From<Vec<Article>> for NewsResponse {
    fn from(articles: Vec<Article>) -> Self {
        Self {
            count: articles.len(),
            articles,
        }
    }
}

/// Create news routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/news", get(get_news))
        .route("/news/search", get(search_news))
}

/// GET /api/news - Aggregated feed, optionally for one category
async fn get_news(State(state): State<AppState>, Query(params): Query<NewsQuery>) -> Response {
    let category = match parse_category(params.category.as_deref()) {
        Ok(category) => category,
        Err(response) => return response,
    };

    match state
        .aggregator
        .fetch_aggregated_news(category, params.location)
        .await
    {
        Ok(articles) => (StatusCode::OK, Json(NewsResponse::from(articles))).into_response(),
        Err(e) => unavailable(&e),
    }
}

/// GET /api/news/search?q=... - Free-text search across providers
async fn search_news(State(state): State<AppState>, Query(params): Query<SearchQuery>) -> Response {
    let query = match params.q.as_deref().map(str::trim) {
        Some(q) if !q.is_empty() => q.to_string(),
        _ => return bad_request("Query parameter is required"),
    };

    match state.aggregator.search(&query, params.location).await {
        Ok(articles) => (StatusCode::OK, Json(NewsResponse::from(articles))).into_response(),
        Err(e) => unavailable(&e),
    }
}

/// Blank or missing means all categories
fn parse_category(raw: Option<&str>) -> Result<Option<Category>, Response> {
    match raw.map(str::trim) {
        None | Some("") | Some("all") => Ok(None),
        Some(name) => name
            .parse()
            .map(Some)
            .map_err(|_| bad_request(&format!("Unknown category: {}", name))),
    }
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": message })),
    )
        .into_response()
}

/// Aggregation failures are logged in full but reported generically
pub(crate) fn unavailable(e: &AggregatorError) -> Response {
    error!("News request failed: {}", e);
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(serde_json::json!({ "error": "News temporarily unavailable" })),
    )
        .into_response()
}
