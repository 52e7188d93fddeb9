//! Per-provider fetch policy
//!
//! Wraps one adapter with the key store: on an auth or rate-limit rejection
//! the key is rotated and the call retried, up to a fixed attempt budget.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use newswire_core::Article;

use crate::error::NewsError;
use crate::keys::{KeyRotationStore, KeyStatus};
use crate::provider::{FetchRequest, NewsProvider};
use crate::rate_limiter::RateLimiter;

/// Attempts per call before giving up with `RateLimitExceeded`
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Retry-with-rotation wrapper around a [`NewsProvider`]
pub struct FetchPolicy {
    provider: Arc<dyn NewsProvider>,
    keys: Arc<KeyRotationStore>,
    max_attempts: u32,
    rate_limiter: Option<Arc<RateLimiter>>,
}

impl FetchPolicy {
    pub fn new(provider: Arc<dyn NewsProvider>, keys: Arc<KeyRotationStore>) -> Self {
        Self {
            provider,
            keys,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            rate_limiter: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Space out calls to this provider
    pub fn with_rate_limiter(mut self, rate_limiter: Arc<RateLimiter>) -> Self {
        self.rate_limiter = Some(rate_limiter);
        self
    }

    pub fn provider_id(&self) -> &str {
        self.provider.id()
    }

    pub fn display_name(&self) -> &str {
        self.provider.display_name()
    }

    pub fn requires_key(&self) -> bool {
        self.provider.requires_key()
    }

    pub async fn key_status(&self) -> KeyStatus {
        self.keys.status(self.provider.id()).await
    }

    /// Fetch articles, rotating keys on 401/403/429.
    ///
    /// Any other error is returned immediately. After `max_attempts`
    /// rejected attempts the result is [`NewsError::RateLimitExceeded`].
    /// Concurrent calls rejected on the same key rotate it only once.
    #[instrument(skip(self), fields(provider = %self.provider.id(), region = %request.region))]
    pub async fn fetch_articles(&self, request: &FetchRequest) -> Result<Vec<Article>, NewsError> {
        let provider_id = self.provider.id();

        for attempt in 1..=self.max_attempts {
            let key = if self.provider.requires_key() {
                Some(self.keys.current_key(provider_id).await?)
            } else {
                None
            };

            if let Some(limiter) = &self.rate_limiter {
                limiter.acquire().await;
            }

            match self.provider.fetch(request, key.as_deref()).await {
                Ok(articles) => {
                    debug!(
                        "{} returned {} articles on attempt {}",
                        provider_id,
                        articles.len(),
                        attempt
                    );
                    return Ok(articles);
                }
                Err(e) if e.is_rotatable() => {
                    warn!(
                        "{} rejected key (attempt {}/{}): {}. Rotating",
                        provider_id, attempt, self.max_attempts, e
                    );
                    match key.as_deref() {
                        Some(failed) => {
                            self.keys.rotate_from(provider_id, failed).await;
                        }
                        None => self.keys.rotate(provider_id).await,
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Err(NewsError::RateLimitExceeded {
            provider: provider_id.to_string(),
            attempts: self.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::StaticKeySource;
    use async_trait::async_trait;
    use chrono::Utc;
    use newswire_core::{ArticleSource, Region};
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Replays scripted outcomes and records the key used for each call
    struct ScriptedProvider {
        outcomes: Mutex<VecDeque<Result<Vec<Article>, NewsError>>>,
        keys_seen: Mutex<Vec<Option<String>>>,
        requires_key: bool,
    }

    impl ScriptedProvider {
        fn new(outcomes: Vec<Result<Vec<Article>, NewsError>>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                keys_seen: Mutex::new(Vec::new()),
                requires_key: true,
            })
        }
    }

    #[async_trait]
    impl NewsProvider for ScriptedProvider {
        fn id(&self) -> &str {
            "newsapi"
        }

        fn display_name(&self) -> &str {
            "NewsAPI"
        }

        fn requires_key(&self) -> bool {
            self.requires_key
        }

        async fn fetch(
            &self,
            _request: &FetchRequest,
            api_key: Option<&str>,
        ) -> Result<Vec<Article>, NewsError> {
            self.keys_seen.lock().push(api_key.map(str::to_string));
            self.outcomes
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    fn keys(list: &str) -> Arc<KeyRotationStore> {
        Arc::new(KeyRotationStore::new(
            StaticKeySource::default().with_keys("newsapi", list),
        ))
    }

    fn request() -> FetchRequest {
        FetchRequest::new(Region::country("it"), "it")
    }

    fn article() -> Article {
        Article::new(ArticleSource::new("ANSA"), "Title", "https://ansa.it/1", Utc::now()).unwrap()
    }

    fn too_many_requests() -> Result<Vec<Article>, NewsError> {
        Err(NewsError::ServerError { status: 429 })
    }

    #[tokio::test]
    async fn test_three_rate_limits_cycle_keys_and_give_up() {
        let provider = ScriptedProvider::new(vec![
            too_many_requests(),
            too_many_requests(),
            too_many_requests(),
        ]);
        let store = keys("k1,k2,k3");
        let policy = FetchPolicy::new(provider.clone(), store.clone());

        let err = policy.fetch_articles(&request()).await.unwrap_err();
        assert_eq!(
            err,
            NewsError::RateLimitExceeded {
                provider: "newsapi".to_string(),
                attempts: 3
            }
        );

        let seen: Vec<_> = provider.keys_seen.lock().iter().flatten().cloned().collect();
        assert_eq!(seen, vec!["k1", "k2", "k3"]);
        assert_eq!(store.current_index("newsapi").await, 0);
    }

    /// Rejects every key except `accepted`, yielding between calls so
    /// concurrent fetches interleave
    struct KeyGatedProvider {
        accepted: &'static str,
    }

    #[async_trait]
    impl NewsProvider for KeyGatedProvider {
        fn id(&self) -> &str {
            "newsapi"
        }

        fn display_name(&self) -> &str {
            "NewsAPI"
        }

        async fn fetch(
            &self,
            _request: &FetchRequest,
            api_key: Option<&str>,
        ) -> Result<Vec<Article>, NewsError> {
            tokio::task::yield_now().await;
            if api_key == Some(self.accepted) {
                Ok(vec![article()])
            } else {
                too_many_requests()
            }
        }
    }

    #[tokio::test]
    async fn test_concurrent_rejections_rotate_once() {
        let store = keys("k1,k2,k3");
        let policy = Arc::new(FetchPolicy::new(
            Arc::new(KeyGatedProvider { accepted: "k2" }),
            store.clone(),
        ));

        let tiers = [Region::country("it"), Region::Europe, Region::Global];
        let mut handles = Vec::new();
        for region in tiers {
            let policy = Arc::clone(&policy);
            handles.push(tokio::spawn(async move {
                policy
                    .fetch_articles(&FetchRequest::new(region, "it"))
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap().len(), 1);
        }
        assert_eq!(store.current_key("newsapi").await.unwrap(), "k2");
    }

    #[tokio::test]
    async fn test_rotation_then_success() {
        let provider = ScriptedProvider::new(vec![
            Err(NewsError::ServerError { status: 401 }),
            Ok(vec![article()]),
        ]);
        let store = keys("k1,k2");
        let policy = FetchPolicy::new(provider.clone(), store.clone());

        let articles = policy.fetch_articles(&request()).await.unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(store.current_key("newsapi").await.unwrap(), "k2");
    }

    #[tokio::test]
    async fn test_other_errors_propagate_without_retry() {
        let provider = ScriptedProvider::new(vec![
            Err(NewsError::ServerError { status: 500 }),
            Ok(vec![article()]),
        ]);
        let store = keys("k1,k2");
        let policy = FetchPolicy::new(provider.clone(), store.clone());

        let err = policy.fetch_articles(&request()).await.unwrap_err();
        assert_eq!(err, NewsError::ServerError { status: 500 });
        assert_eq!(provider.keys_seen.lock().len(), 1);
        assert_eq!(store.current_index("newsapi").await, 0);
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_calling_provider() {
        let provider = ScriptedProvider::new(vec![Ok(vec![article()])]);
        let policy = FetchPolicy::new(provider.clone(), keys(""));

        let err = policy.fetch_articles(&request()).await.unwrap_err();
        assert!(matches!(err, NewsError::MissingKey(_)));
        assert!(provider.keys_seen.lock().is_empty());
    }

    #[tokio::test]
    async fn test_keyless_provider_skips_key_store() {
        let provider = Arc::new(ScriptedProvider {
            outcomes: Mutex::new(vec![Ok(vec![article()])].into()),
            keys_seen: Mutex::new(Vec::new()),
            requires_key: false,
        });
        let policy = FetchPolicy::new(provider.clone(), keys(""));

        let articles = policy.fetch_articles(&request()).await.unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(*provider.keys_seen.lock(), vec![None]);
    }
}
