//! Newswire API Server
//!
//! HTTP API server that serves the aggregated, personalized news feed.

mod routes;

use axum::{
    http::{header, Method},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use newswire_providers::{
    FetchClient, FetchClientConfig, FetchPolicy, KeyRotationStore, NewsProvider, RateLimiter,
    RestProvider, RestProviderConfig, RetryConfig, RssProvider,
};
use newswire_services::{ArticleCache, NewsAggregator, Ranker, ServiceConfig};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Minimum spacing between calls to the same keyed REST provider
const REST_MIN_INTERVAL: Duration = Duration::from_millis(500);

/// Backoff for transient upstream failures; two retries fit inside the
/// default per-provider deadline
const UPSTREAM_RETRY: RetryConfig = RetryConfig {
    max_attempts: 3,
    base_delay: Duration::from_millis(250),
};

/// How often expired cache entries are swept
const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<NewsAggregator>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env.local file
    if let Err(e) = dotenvy::from_filename(".env.local") {
        // Not an error if the file doesn't exist
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env.local: {}", e);
        }
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new("info,newswire_api=debug,newswire_services=debug")
            }),
        )
        .init();

    info!("Starting Newswire API");

    let config = ServiceConfig::from_env()?;
    info!(
        "Locale {}, providers [{}], fetch_all={}",
        config.aggregator.locale,
        config.providers.join(", "),
        config.aggregator.fetch_all
    );

    let client = FetchClient::new(FetchClientConfig::default(), UPSTREAM_RETRY);
    let providers = build_providers(&config, &client)?;
    if providers.is_empty() {
        anyhow::bail!("No known provider enabled in NEWSWIRE_PROVIDERS");
    }

    let mut keys = KeyRotationStore::new(config.key_source()?);
    for provider in &providers {
        keys = keys.with_display_name(provider.id(), provider.display_name());
    }
    let keys = Arc::new(keys);

    let policies = providers
        .into_iter()
        .map(|provider| {
            let mut policy = FetchPolicy::new(Arc::clone(&provider), Arc::clone(&keys));
            if provider.requires_key() {
                policy = policy.with_rate_limiter(Arc::new(RateLimiter::new(
                    REST_MIN_INTERVAL,
                    provider.display_name(),
                )));
            }
            Arc::new(policy)
        })
        .collect();

    let cache = Arc::new(ArticleCache::new(config.cache.clone()));
    let aggregator = Arc::new(
        NewsAggregator::new(policies, cache, config.aggregator.clone())
            .with_ranker(Ranker::new(config.ranking.clone())),
    );

    // Sweep expired cache entries in background
    aggregator.spawn_maintenance(MAINTENANCE_INTERVAL);

    let state = AppState { aggregator };

    // Configure CORS for frontend
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    // Build router
    let app = Router::new()
        .nest("/api", routes::api_routes())
        .merge(routes::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Adapters for the enabled provider ids, in configured order
fn build_providers(
    config: &ServiceConfig,
    client: &FetchClient,
) -> anyhow::Result<Vec<Arc<dyn NewsProvider>>> {
    let mut providers: Vec<Arc<dyn NewsProvider>> = Vec::new();

    for id in &config.providers {
        if id == "rss" {
            let table = Arc::new(config.load_feed_table()?);
            info!("RSS provider enabled with {} feeds", table.len());
            providers.push(Arc::new(RssProvider::new(client.clone(), table)));
            continue;
        }

        match RestProviderConfig::preset(id) {
            Some(preset) => {
                info!("{} provider enabled", preset.display_name);
                providers.push(Arc::new(RestProvider::new(preset, client.clone())));
            }
            None => warn!("Unknown provider '{}' in NEWSWIRE_PROVIDERS, skipping", id),
        }
    }

    Ok(providers)
}
