//! News Aggregator
//!
//! Single entry point for the feed. Checks the cache, otherwise fans out to
//! the enabled providers (one task per provider and tier, each with its own
//! deadline), merges whatever succeeded, then filters, dedupes, sorts and
//! optionally personalizes the list.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;
use thiserror::Error;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, instrument, warn};

use newswire_core::{Article, Category, Region, TrackingEvent, UserPreferenceProfile};
use newswire_providers::{FetchPolicy, FetchRequest, KeyStatus, NewsError};

use crate::cache::{ArticleCache, CacheKey};
use crate::config::AggregatorConfig;
use crate::pipeline;
use crate::ranking::{infer_category, Ranker};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AggregatorError {
    /// Every provider task failed or timed out
    #[error("No provider returned data ({attempted} attempted)")]
    NoData { attempted: usize },

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),
}

/// How one aggregation round picks providers and tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStrategy {
    /// Every enabled provider, local tier
    FetchAll,
    /// Every enabled provider for each tier: local, Europe (European
    /// readers only), global
    LocationTiers,
    /// Only the default provider, local tier
    DefaultProvider,
}

impl FetchStrategy {
    fn as_str(&self) -> &'static str {
        match self {
            FetchStrategy::FetchAll => "all",
            FetchStrategy::LocationTiers => "location",
            FetchStrategy::DefaultProvider => "default",
        }
    }
}

/// Provider listing for operators
#[derive(Debug, Clone, Serialize)]
pub struct ProviderInfo {
    pub id: String,
    pub display_name: String,
    pub requires_key: bool,
    pub is_default: bool,
}

/// Fan-out/fan-in aggregator over a set of fetch policies
pub struct NewsAggregator {
    /// Enabled providers, in priority order
    policies: Vec<Arc<FetchPolicy>>,
    cache: Arc<ArticleCache>,
    ranker: Ranker,
    profile: RwLock<UserPreferenceProfile>,
    config: AggregatorConfig,
}

impl NewsAggregator {
    pub fn new(policies: Vec<Arc<FetchPolicy>>, cache: Arc<ArticleCache>, config: AggregatorConfig) -> Self {
        info!(
            "Initializing NewsAggregator with {} provider(s), locale {}, fetch_all={}",
            policies.len(),
            config.locale,
            config.fetch_all
        );
        Self {
            policies,
            cache,
            ranker: Ranker::default(),
            profile: RwLock::new(UserPreferenceProfile::new()),
            config,
        }
    }

    pub fn with_ranker(mut self, ranker: Ranker) -> Self {
        self.ranker = ranker;
        self
    }

    /// Start from a previously persisted profile
    pub fn with_profile(self, profile: UserPreferenceProfile) -> Self {
        *self.profile.write() = profile;
        self
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    pub fn cache(&self) -> &ArticleCache {
        &self.cache
    }

    /// Aggregated feed for `category`.
    ///
    /// Per-provider failures only reduce the result; the call fails with
    /// [`AggregatorError::NoData`] only when every provider task failed.
    #[instrument(skip(self), fields(locale = %self.config.locale))]
    pub async fn fetch_aggregated_news(
        &self,
        category: Option<Category>,
        use_location_based: bool,
    ) -> Result<Vec<Article>, AggregatorError> {
        let strategy = self.strategy(use_location_based);
        let key = CacheKey::for_category(category, 1, &self.config.locale, strategy.as_str());
        let request = FetchRequest::new(self.config.locale.local_region(), &self.config.locale.language)
            .with_category(category);

        self.fetch_cached(key, request, strategy).await
    }

    /// Free-text search across providers, cached like category feeds
    #[instrument(skip(self), fields(locale = %self.config.locale))]
    pub async fn search(&self, query: &str, use_location_based: bool) -> Result<Vec<Article>, AggregatorError> {
        let strategy = self.strategy(use_location_based);
        let key = CacheKey::for_query(query, 1, &self.config.locale, strategy.as_str());
        let request = FetchRequest::new(self.config.locale.local_region(), &self.config.locale.language)
            .with_query(Some(query.to_string()));

        self.fetch_cached(key, request, strategy).await
    }

    /// Pick the strategy: fan-out flag, then location mode, then the default provider
    pub fn strategy(&self, use_location_based: bool) -> FetchStrategy {
        if self.config.fetch_all {
            FetchStrategy::FetchAll
        } else if use_location_based {
            FetchStrategy::LocationTiers
        } else {
            FetchStrategy::DefaultProvider
        }
    }

    async fn fetch_cached(
        &self,
        key: CacheKey,
        request: FetchRequest,
        strategy: FetchStrategy,
    ) -> Result<Vec<Article>, AggregatorError> {
        if let Some(cached) = self.cache.get(&key) {
            let articles = pipeline::filter_fresh(cached, Utc::now(), self.config.max_age);
            if !articles.is_empty() {
                debug!("Cache hit for {} ({} articles)", key, articles.len());
                return Ok(self.personalize(articles));
            }
            // Nothing left inside the feed window: treat as a miss
            debug!("Cache entry {} is stale for this feed, refetching", key);
            self.cache.clear(&key);
        }

        let articles = self.aggregate(&request, strategy).await?;
        self.cache.set(key, articles.clone());
        Ok(self.personalize(articles))
    }

    /// Fan out, fan in, then filter, dedupe and sort
    async fn aggregate(
        &self,
        request: &FetchRequest,
        strategy: FetchStrategy,
    ) -> Result<Vec<Article>, AggregatorError> {
        let tiers = self.tiers(strategy);
        let policies = self.policies_for(strategy);
        let deadline = match strategy {
            FetchStrategy::FetchAll => self.config.fanout_timeout,
            _ => Some(self.config.provider_timeout),
        };

        // Dropping the set aborts every task still in flight, so a caller
        // that stops waiting does not leak provider fetches.
        let mut tasks = JoinSet::new();
        for (tier, region) in tiers.iter().enumerate() {
            for policy in &policies {
                let policy = Arc::clone(policy);
                let request = request.for_region(region.clone());
                tasks.spawn(async move {
                    let provider = policy.provider_id().to_string();
                    let result = fetch_with_deadline(&policy, &request, deadline).await;
                    (tier, provider, result)
                });
            }
        }

        let attempted = tasks.len();
        let mut by_tier: Vec<Vec<Article>> = vec![Vec::new(); tiers.len()];
        let mut succeeded = 0usize;

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((tier, provider, Ok(articles))) => {
                    debug!("{} [{}] returned {} articles", provider, tiers[tier], articles.len());
                    succeeded += 1;
                    by_tier[tier].extend(articles);
                }
                Ok((tier, provider, Err(e))) => {
                    warn!("{} [{}] failed: {}", provider, tiers[tier], e);
                }
                Err(e) => {
                    warn!("Provider task aborted: {}", e);
                }
            }
        }

        if succeeded == 0 {
            error!("All {} provider task(s) failed", attempted);
            return Err(AggregatorError::NoData { attempted });
        }

        // Local first, then regional, then global: earlier tiers win duplicates
        let merged: Vec<Article> = by_tier.into_iter().flatten().collect();
        let fetched = merged.len();
        let articles = pipeline::process(merged, Utc::now(), self.config.max_age, self.config.undated);

        info!(
            "Aggregated {} articles ({} fetched) from {}/{} task(s) using {:?}",
            articles.len(),
            fetched,
            succeeded,
            attempted,
            strategy
        );
        Ok(articles)
    }

    fn tiers(&self, strategy: FetchStrategy) -> Vec<Region> {
        let locale = &self.config.locale;
        match strategy {
            FetchStrategy::LocationTiers => {
                let mut tiers = vec![locale.local_region()];
                if locale.is_european() {
                    tiers.push(Region::Europe);
                }
                tiers.push(Region::Global);
                tiers
            }
            FetchStrategy::FetchAll | FetchStrategy::DefaultProvider => vec![locale.local_region()],
        }
    }

    fn policies_for(&self, strategy: FetchStrategy) -> Vec<Arc<FetchPolicy>> {
        match strategy {
            FetchStrategy::DefaultProvider => self
                .policies
                .iter()
                .find(|p| p.provider_id() == self.config.default_provider)
                .or_else(|| self.policies.first())
                .map(Arc::clone)
                .into_iter()
                .collect(),
            FetchStrategy::FetchAll | FetchStrategy::LocationTiers => self.policies.clone(),
        }
    }

    fn personalize(&self, articles: Vec<Article>) -> Vec<Article> {
        if !self.config.personalize {
            return articles;
        }
        let profile = self.profile.read();
        self.ranker.rank(articles, &profile)
    }

    /// Key status for one provider
    pub async fn get_status(&self, provider: &str) -> Result<KeyStatus, AggregatorError> {
        let policy = self
            .policies
            .iter()
            .find(|p| p.provider_id() == provider)
            .ok_or_else(|| AggregatorError::UnknownProvider(provider.to_string()))?;
        Ok(policy.key_status().await)
    }

    /// Key status for every enabled provider that uses keys
    pub async fn provider_statuses(&self) -> Vec<KeyStatus> {
        let mut statuses = Vec::new();
        for policy in self.policies.iter().filter(|p| p.requires_key()) {
            statuses.push(policy.key_status().await);
        }
        statuses
    }

    pub fn providers(&self) -> Vec<ProviderInfo> {
        self.policies
            .iter()
            .map(|p| ProviderInfo {
                id: p.provider_id().to_string(),
                display_name: p.display_name().to_string(),
                requires_key: p.requires_key(),
                is_default: p.provider_id() == self.config.default_provider,
            })
            .collect()
    }

    /// Invalidate every cached feed. Returns the number of entries dropped.
    pub fn refresh_cache(&self) -> usize {
        let dropped = self.cache.clear_all();
        info!("Cache refresh requested, dropped {} entries", dropped);
        dropped
    }

    /// Record a reader interaction
    pub fn track(&self, article: &Article, event: TrackingEvent) {
        let category = infer_category(article);
        debug!("Tracking {:?} on {} ({})", event, article.id(), category);
        self.profile.write().record(article, category, event);
    }

    pub fn reset_profile(&self) {
        self.profile.write().reset();
        info!("Preference profile reset");
    }

    /// Snapshot of the current profile, for persistence
    pub fn profile(&self) -> UserPreferenceProfile {
        self.profile.read().clone()
    }

    /// Periodically drop expired cache entries
    pub fn spawn_maintenance(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let aggregator = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // first tick fires immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = aggregator.cache.clear_expired();
                if removed > 0 {
                    debug!("Maintenance removed {} cache entries", removed);
                }
            }
        })
    }
}

/// Run one policy, racing it against `deadline` when there is one
async fn fetch_with_deadline(
    policy: &FetchPolicy,
    request: &FetchRequest,
    deadline: Option<Duration>,
) -> Result<Vec<Article>, NewsError> {
    match deadline {
        Some(deadline) => tokio::time::timeout(deadline, policy.fetch_articles(request))
            .await
            .unwrap_or(Err(NewsError::Timeout)),
        None => policy.fetch_articles(request).await,
    }
}
