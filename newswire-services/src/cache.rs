//! Article cache
//!
//! In-memory key -> article list store. An entry is served only while it is
//! younger than the TTL *and* still holds at least one article inside the
//! max-age window; otherwise it is evicted on read. When full, the entry
//! with the oldest insertion time makes room for the new one.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;
use tracing::debug;

use newswire_core::{Article, Category, Locale};

use crate::config::CacheConfig;
use crate::pipeline::filter_fresh;

/// Deterministic cache key: `subject|page|locale|mode`, where subject is the
/// category or `q:<query>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn for_category(category: Option<Category>, page: u32, locale: &Locale, mode: &str) -> Self {
        let subject = category.map_or("all", |c| c.as_str());
        Self(format!("{}|{}|{}|{}", subject, page, locale, mode))
    }

    pub fn for_query(query: &str, page: u32, locale: &Locale, mode: &str) -> Self {
        Self(format!(
            "q:{}|{}|{}|{}",
            query.trim().to_lowercase(),
            page,
            locale,
            mode
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug)]
struct CacheEntry {
    articles: Vec<Article>,
    inserted_at: Instant,
    /// Insertion counter, breaks ties between equal timestamps
    sequence: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    next_sequence: u64,
}

/// Cache counters
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// TTL + freshness gated article cache with oldest-first eviction
#[derive(Debug)]
pub struct ArticleCache {
    config: CacheConfig,
    state: Mutex<CacheState>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl ArticleCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            state: Mutex::new(CacheState::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Articles for `key`, re-filtered by the max-age window.
    /// Expired or fully stale entries are evicted and reported as absent.
    pub fn get(&self, key: &CacheKey) -> Option<Vec<Article>> {
        let mut state = self.state.lock();

        let Some(entry) = state.entries.get(key) else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        };

        if entry.inserted_at.elapsed() >= self.config.ttl {
            state.entries.remove(key);
            debug!("Cache entry {} expired", key);
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        let fresh = filter_fresh(entry.articles.clone(), Utc::now(), self.config.max_age);
        if fresh.is_empty() {
            state.entries.remove(key);
            debug!("Cache entry {} holds only stale articles", key);
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        self.hits.fetch_add(1, Ordering::Relaxed);
        Some(fresh)
    }

    /// Store `articles` under `key`. Empty lists are not cached.
    pub fn set(&self, key: CacheKey, articles: Vec<Article>) {
        if articles.is_empty() {
            debug!("Not caching empty result for {}", key);
            return;
        }

        let mut state = self.state.lock();
        if !state.entries.contains_key(&key) && state.entries.len() >= self.config.capacity {
            let oldest = state
                .entries
                .iter()
                .min_by_key(|(_, entry)| (entry.inserted_at, entry.sequence))
                .map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                state.entries.remove(&oldest);
                self.evictions.fetch_add(1, Ordering::Relaxed);
                debug!("Cache full, evicted {}", oldest);
            }
        }

        let sequence = state.next_sequence;
        state.next_sequence += 1;
        state.entries.insert(
            key,
            CacheEntry {
                articles,
                inserted_at: Instant::now(),
                sequence,
            },
        );
    }

    pub fn clear(&self, key: &CacheKey) {
        self.state.lock().entries.remove(key);
    }

    /// Drop entries past their TTL or holding only stale articles.
    /// Returns how many were removed.
    pub fn clear_expired(&self) -> usize {
        let now = Utc::now();
        let mut state = self.state.lock();
        let before = state.entries.len();

        state.entries.retain(|_, entry| {
            entry.inserted_at.elapsed() < self.config.ttl
                && entry
                    .articles
                    .iter()
                    .any(|article| article.is_fresh(now, self.config.max_age))
        });

        let removed = before - state.entries.len();
        if removed > 0 {
            debug!("Cleaned up {} expired cache entries", removed);
        }
        removed
    }

    /// Drop everything. Returns how many entries were removed.
    pub fn clear_all(&self) -> usize {
        let mut state = self.state.lock();
        let removed = state.entries.len();
        state.entries.clear();
        removed
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            capacity: self.config.capacity,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use newswire_core::ArticleSource;
    use std::time::Duration;

    fn article(url: &str, hours_ago: i64) -> Article {
        Article::new(
            ArticleSource::new("Test"),
            "Title",
            url,
            Utc::now() - ChronoDuration::hours(hours_ago),
        )
        .unwrap()
    }

    fn cache(capacity: usize) -> ArticleCache {
        ArticleCache::new(CacheConfig {
            capacity,
            ..CacheConfig::default()
        })
    }

    fn key(n: u32) -> CacheKey {
        CacheKey::for_category(Some(Category::General), n, &Locale::default(), "location")
    }

    #[test]
    fn test_key_format() {
        let locale = Locale::default();
        assert_eq!(
            CacheKey::for_category(Some(Category::Sports), 1, &locale, "location").as_str(),
            "sports|1|it-IT|location"
        );
        assert_eq!(
            CacheKey::for_category(None, 2, &locale, "all").as_str(),
            "all|2|it-IT|all"
        );
        assert_eq!(
            CacheKey::for_query(" Elezioni ", 1, &locale, "search").as_str(),
            "q:elezioni|1|it-IT|search"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_then_get() {
        let cache = cache(10);
        cache.set(key(1), vec![article("https://a/1", 1)]);

        let hit = cache.get(&key(1)).unwrap();
        assert_eq!(hit.len(), 1);
        assert_eq!(cache.stats().hits, 1);
        assert!(cache.get(&key(2)).is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiry_evicts() {
        let cache = cache(10);
        cache.set(key(1), vec![article("https://a/1", 1)]);

        tokio::time::advance(Duration::from_secs(6 * 60 * 60 - 1)).await;
        assert!(cache.get(&key(1)).is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.get(&key(1)).is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_refilters_by_max_age() {
        let cache = cache(10);
        cache.set(key(1), vec![article("https://a/1", 1), article("https://a/2", 24 * 8)]);
        cache.set(key(2), vec![article("https://b/1", 24 * 8)]);

        let hit = cache.get(&key(1)).unwrap();
        assert_eq!(hit.len(), 1);
        assert_eq!(hit[0].url, "https://a/1");

        assert!(cache.get(&key(2)).is_none());
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_eviction_removes_oldest_insert() {
        let cache = cache(3);
        for n in 1..=3 {
            cache.set(key(n), vec![article("https://a/1", 1)]);
            tokio::time::advance(Duration::from_secs(1)).await;
        }
        // reading does not refresh position
        assert!(cache.get(&key(1)).is_some());

        cache.set(key(4), vec![article("https://a/1", 1)]);
        assert_eq!(cache.len(), 3);
        assert!(cache.get(&key(1)).is_none());
        assert!(cache.get(&key(2)).is_some());
        assert!(cache.get(&key(4)).is_some());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_eviction_tiebreak_uses_insertion_order() {
        let cache = cache(2);
        cache.set(key(1), vec![article("https://a/1", 1)]);
        cache.set(key(2), vec![article("https://a/1", 1)]);
        cache.set(key(3), vec![article("https://a/1", 1)]);

        assert!(cache.get(&key(1)).is_none());
        assert!(cache.get(&key(2)).is_some());
        assert!(cache.get(&key(3)).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwrite_does_not_evict() {
        let cache = cache(2);
        cache.set(key(1), vec![article("https://a/1", 1)]);
        cache.set(key(2), vec![article("https://a/1", 1)]);
        cache.set(key(2), vec![article("https://a/2", 1)]);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&key(2)).unwrap()[0].url, "https://a/2");
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_expired_and_clear_all() {
        let cache = cache(10);
        cache.set(key(1), vec![article("https://a/1", 1)]);
        cache.set(key(2), vec![article("https://a/2", 24 * 8)]);
        cache.set(key(3), Vec::new());

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.clear_expired(), 1);
        assert_eq!(cache.len(), 1);

        cache.clear(&key(1));
        assert!(cache.is_empty());

        cache.set(key(4), vec![article("https://a/1", 1)]);
        assert_eq!(cache.clear_all(), 1);
    }
}
