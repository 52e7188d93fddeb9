//! Provider layer for the Newswire aggregator
//!
//! This crate provides:
//! - Provider adapters: a generic REST JSON adapter with presets
//!   (NewsAPI, GNews, The Guardian, Mediastack) and a table-driven RSS/Atom adapter
//! - Key rotation store with layered key sources
//! - HTTP fetch client with typed failures and bounded retry
//! - Per-provider fetch policy (rotate key and retry on auth/rate-limit errors)

pub mod dates;
pub mod error;
pub mod http;
pub mod keys;
pub mod normalize;
pub mod policy;
pub mod provider;
pub mod rate_limiter;
pub mod rest;
pub mod rss_client;
pub mod sources;

pub use error::NewsError;
pub use http::{FetchClient, FetchClientConfig, HttpRequest, RetryConfig};
pub use keys::{
    EnvKeySource, KeyRotationStore, KeySource, KeyStatus, LayeredKeySource, StaticKeySource,
    KEY_CACHE_VALIDITY,
};
pub use policy::FetchPolicy;
pub use provider::{FetchRequest, NewsProvider};
pub use rate_limiter::{RateLimiter, RateLimiterStats};
pub use rest::{AuthStyle, RestFlavor, RestProvider, RestProviderConfig};
pub use rss_client::RssProvider;
pub use sources::{FeedSource, FeedTable};
