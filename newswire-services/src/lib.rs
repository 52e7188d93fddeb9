//! Service layer for the Newswire aggregator
//!
//! This crate orchestrates the provider layer: fan-out aggregation with
//! location tiers, the article cache, personalization and the
//! environment-driven configuration.

pub mod aggregator;
pub mod cache;
pub mod config;
pub mod pipeline;
pub mod ranking;

pub use aggregator::{AggregatorError, FetchStrategy, NewsAggregator, ProviderInfo};
pub use cache::{ArticleCache, CacheKey, CacheStats};
pub use config::{AggregatorConfig, CacheConfig, ConfigError, ServiceConfig, UndatedPolicy};
pub use ranking::{infer_category, Ranker, RankingWeights};
