//! API key rotation store
//!
//! Holds an ordered key list per provider and the index of the key in use.
//! Lists are loaded lazily from a layered [`KeySource`] and cached for a
//! validity window. All access goes through one async mutex, so loading,
//! rotating and reading the current key never interleave.

use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::NewsError;

/// How long a loaded key list is trusted before re-reading the source
pub const KEY_CACHE_VALIDITY: Duration = Duration::from_secs(5 * 60);

/// Where comma-separated key lists come from
pub trait KeySource: Send + Sync {
    /// Raw comma-separated key list for `provider`, if this source has one
    fn load(&self, provider: &str) -> Option<String>;
}

/// Reads `<PROVIDER>_API_KEYS` from the process environment
#[derive(Debug, Clone, Default)]
pub struct EnvKeySource;

impl EnvKeySource {
    pub fn variable_name(provider: &str) -> String {
        let normalized: String = provider
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
            .collect();
        format!("{}_API_KEYS", normalized)
    }
}

impl KeySource for EnvKeySource {
    fn load(&self, provider: &str) -> Option<String> {
        std::env::var(Self::variable_name(provider)).ok()
    }
}

/// Fixed provider -> key list map, typically the bundled config file
#[derive(Debug, Clone, Default)]
pub struct StaticKeySource {
    values: HashMap<String, String>,
}

impl StaticKeySource {
    pub fn new(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    /// Parse a JSON object of the form `{ "newsapi": "k1,k2" }`
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    pub fn with_keys(mut self, provider: &str, keys: &str) -> Self {
        self.values.insert(provider.to_string(), keys.to_string());
        self
    }
}

impl KeySource for StaticKeySource {
    fn load(&self, provider: &str) -> Option<String> {
        self.values.get(provider).cloned()
    }
}

/// Ordered chain of sources. The first non-blank value wins.
#[derive(Default)]
pub struct LayeredKeySource {
    layers: Vec<Box<dyn KeySource>>,
}

impl LayeredKeySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layer(mut self, source: impl KeySource + 'static) -> Self {
        self.layers.push(Box::new(source));
        self
    }
}

impl KeySource for LayeredKeySource {
    fn load(&self, provider: &str) -> Option<String> {
        self.layers
            .iter()
            .filter_map(|layer| layer.load(provider))
            .find(|value| !value.trim().is_empty())
    }
}

/// Snapshot of a provider's credentials, safe to show to operators
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyStatus {
    pub provider: String,
    pub display_name: String,
    pub total_keys: usize,
    pub current_index: usize,
    /// First characters of the key in use
    pub masked_key: Option<String>,
    pub has_usable_key: bool,
}

#[derive(Debug)]
struct KeySet {
    keys: Vec<String>,
    index: usize,
    loaded_at: Instant,
}

/// Per-provider key lists with rotation
pub struct KeyRotationStore {
    source: Box<dyn KeySource>,
    validity: Duration,
    display_names: HashMap<String, String>,
    sets: Mutex<HashMap<String, KeySet>>,
}

impl KeyRotationStore {
    pub fn new(source: impl KeySource + 'static) -> Self {
        Self {
            source: Box::new(source),
            validity: KEY_CACHE_VALIDITY,
            display_names: HashMap::new(),
            sets: Mutex::new(HashMap::new()),
        }
    }

    /// Override the key cache validity window
    pub fn with_validity(mut self, validity: Duration) -> Self {
        self.validity = validity;
        self
    }

    /// Name used in errors and status output
    pub fn with_display_name(mut self, provider: &str, display_name: &str) -> Self {
        self.display_names
            .insert(provider.to_string(), display_name.to_string());
        self
    }

    pub fn display_name<'a>(&'a self, provider: &'a str) -> &'a str {
        self.display_names
            .get(provider)
            .map(String::as_str)
            .unwrap_or(provider)
    }

    /// Key currently selected for `provider`
    pub async fn current_key(&self, provider: &str) -> Result<String, NewsError> {
        let mut sets = self.sets.lock().await;
        let set = self.ensure_loaded(&mut sets, provider);

        if set.keys.is_empty() {
            return Err(NewsError::MissingKey(self.display_name(provider).to_string()));
        }
        let key = &set.keys[set.index % set.keys.len()];
        if key.trim().is_empty() {
            return Err(NewsError::MissingKey(self.display_name(provider).to_string()));
        }
        Ok(key.clone())
    }

    /// Advance to the next key, wrapping around. No-op for an empty list.
    pub async fn rotate(&self, provider: &str) {
        let mut sets = self.sets.lock().await;
        let set = self.ensure_loaded(&mut sets, provider);

        if set.keys.is_empty() {
            debug!("No keys to rotate for {}", provider);
            return;
        }
        set.index = (set.index + 1) % set.keys.len();
        info!(
            "Rotated {} key to index {}/{}",
            provider,
            set.index,
            set.keys.len()
        );
    }

    /// Advance past `failed_key` only if it is still the current key.
    ///
    /// Concurrent callers that failed on the same key rotate once between
    /// them. Returns whether the index moved.
    pub async fn rotate_from(&self, provider: &str, failed_key: &str) -> bool {
        let mut sets = self.sets.lock().await;
        let set = self.ensure_loaded(&mut sets, provider);

        if set.keys.is_empty() {
            debug!("No keys to rotate for {}", provider);
            return false;
        }
        if set.keys[set.index % set.keys.len()] != failed_key {
            debug!("{} key already rotated past {}", provider, mask_key(failed_key));
            return false;
        }
        set.index = (set.index + 1) % set.keys.len();
        info!(
            "Rotated {} key to index {}/{}",
            provider,
            set.index,
            set.keys.len()
        );
        true
    }

    /// All keys configured for `provider`
    pub async fn available_keys(&self, provider: &str) -> Vec<String> {
        let mut sets = self.sets.lock().await;
        self.ensure_loaded(&mut sets, provider).keys.clone()
    }

    pub async fn current_index(&self, provider: &str) -> usize {
        let mut sets = self.sets.lock().await;
        self.ensure_loaded(&mut sets, provider).index
    }

    pub async fn status(&self, provider: &str) -> KeyStatus {
        let mut sets = self.sets.lock().await;
        let set = self.ensure_loaded(&mut sets, provider);
        let current = (!set.keys.is_empty()).then(|| &set.keys[set.index % set.keys.len()]);

        KeyStatus {
            provider: provider.to_string(),
            display_name: self.display_name(provider).to_string(),
            total_keys: set.keys.len(),
            current_index: set.index,
            masked_key: current.map(|k| mask_key(k)),
            has_usable_key: current.is_some_and(|k| !k.trim().is_empty()),
        }
    }

    /// Drop the cached list so the next access re-reads the source
    pub async fn invalidate(&self, provider: &str) {
        self.sets.lock().await.remove(provider);
    }

    /// Load or refresh the key list while the caller holds the lock
    fn ensure_loaded<'a>(
        &self,
        sets: &'a mut HashMap<String, KeySet>,
        provider: &str,
    ) -> &'a mut KeySet {
        let stale = sets
            .get(provider)
            .map_or(true, |set| set.loaded_at.elapsed() >= self.validity);

        if stale {
            let keys = parse_key_list(self.source.load(provider).as_deref().unwrap_or_default());
            let previous_index = sets.get(provider).map(|set| set.index).unwrap_or(0);
            let index = if keys.is_empty() { 0 } else { previous_index % keys.len() };

            debug!("Loaded {} key(s) for {}", keys.len(), provider);
            sets.insert(
                provider.to_string(),
                KeySet {
                    keys,
                    index,
                    loaded_at: Instant::now(),
                },
            );
        }

        sets.entry(provider.to_string()).or_insert_with(|| KeySet {
            keys: Vec::new(),
            index: 0,
            loaded_at: Instant::now(),
        })
    }
}

/// Split a comma-separated list, dropping blank entries
pub fn parse_key_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .collect()
}

/// Show only the first four characters of a key
pub fn mask_key(key: &str) -> String {
    if key.chars().count() <= 4 {
        "****".to_string()
    } else {
        format!("{}…", key.chars().take(4).collect::<String>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn store(keys: &str) -> KeyRotationStore {
        KeyRotationStore::new(StaticKeySource::default().with_keys("newsapi", keys))
            .with_display_name("newsapi", "NewsAPI")
    }

    /// Counts loads and serves whatever value is currently set
    struct CountingSource {
        loads: Arc<AtomicUsize>,
        value: Arc<parking_lot::Mutex<String>>,
    }

    impl KeySource for CountingSource {
        fn load(&self, _provider: &str) -> Option<String> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Some(self.value.lock().clone())
        }
    }

    #[test]
    fn test_parse_key_list() {
        assert_eq!(parse_key_list(" k1, k2 ,,k3,"), vec!["k1", "k2", "k3"]);
        assert!(parse_key_list("  ").is_empty());
    }

    #[test]
    fn test_mask_key() {
        assert_eq!(mask_key("abcdef123"), "abcd…");
        assert_eq!(mask_key("abc"), "****");
    }

    #[test]
    fn test_env_variable_name() {
        assert_eq!(EnvKeySource::variable_name("newsapi"), "NEWSAPI_API_KEYS");
        assert_eq!(EnvKeySource::variable_name("rapid-api"), "RAPID_API_API_KEYS");
    }

    #[test]
    fn test_layered_source_prefers_first_non_blank() {
        let source = LayeredKeySource::new()
            .layer(StaticKeySource::default().with_keys("gnews", "  "))
            .layer(StaticKeySource::default().with_keys("gnews", "fallback"));
        assert_eq!(source.load("gnews").as_deref(), Some("fallback"));
        assert_eq!(source.load("guardian"), None);
    }

    #[test]
    fn test_static_source_from_json() {
        let source = StaticKeySource::from_json(r#"{"newsapi":"a,b"}"#).unwrap();
        assert_eq!(source.load("newsapi").as_deref(), Some("a,b"));
    }

    #[tokio::test]
    async fn test_rotation_cycles_back_to_start() {
        let store = store("k1,k2,k3");
        assert_eq!(store.current_key("newsapi").await.unwrap(), "k1");

        for _ in 0..3 {
            store.rotate("newsapi").await;
        }
        assert_eq!(store.current_index("newsapi").await, 0);
        assert_eq!(store.current_key("newsapi").await.unwrap(), "k1");

        store.rotate("newsapi").await;
        assert_eq!(store.current_key("newsapi").await.unwrap(), "k2");
    }

    #[tokio::test]
    async fn test_empty_set_raises_missing_key() {
        let store = store("");
        for _ in 0..3 {
            store.rotate("newsapi").await;
            let err = store.current_key("newsapi").await.unwrap_err();
            assert_eq!(err, NewsError::MissingKey("NewsAPI".to_string()));
        }
        assert!(store.available_keys("newsapi").await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_provider_is_missing_key() {
        let err = store("k1").current_key("gnews").await.unwrap_err();
        assert_eq!(err, NewsError::MissingKey("gnews".to_string()));
    }

    #[tokio::test]
    async fn test_status_masks_current_key() {
        let store = store("secret-one,secret-two");
        store.rotate("newsapi").await;

        let status = store.status("newsapi").await;
        assert_eq!(status.display_name, "NewsAPI");
        assert_eq!(status.total_keys, 2);
        assert_eq!(status.current_index, 1);
        assert_eq!(status.masked_key.as_deref(), Some("secr…"));
        assert!(status.has_usable_key);

        let empty = KeyRotationStore::new(StaticKeySource::default()).status("x").await;
        assert!(!empty.has_usable_key);
        assert_eq!(empty.masked_key, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_cached_for_validity_window() {
        let loads = Arc::new(AtomicUsize::new(0));
        let value = Arc::new(parking_lot::Mutex::new("k1,k2".to_string()));
        let store = KeyRotationStore::new(CountingSource {
            loads: loads.clone(),
            value: value.clone(),
        });

        store.current_key("newsapi").await.unwrap();
        store.rotate("newsapi").await;
        store.current_key("newsapi").await.unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 1);

        *value.lock() = "k1,k2,k3".to_string();
        tokio::time::advance(KEY_CACHE_VALIDITY + Duration::from_secs(1)).await;

        // Reloaded list keeps the rotation position
        assert_eq!(store.current_key("newsapi").await.unwrap(), "k2");
        assert_eq!(store.available_keys("newsapi").await.len(), 3);
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_rotate_from_ignores_stale_failures() {
        let store = store("k1,k2,k3");

        assert!(store.rotate_from("newsapi", "k1").await);
        // A second caller that also failed on k1 must not skip k2
        assert!(!store.rotate_from("newsapi", "k1").await);
        assert_eq!(store.current_key("newsapi").await.unwrap(), "k2");

        assert!(store.rotate_from("newsapi", "k2").await);
        assert!(store.rotate_from("newsapi", "k3").await);
        assert_eq!(store.current_index("newsapi").await, 0);

        assert!(!store.rotate_from("missing", "k1").await);
    }

    #[tokio::test]
    async fn test_concurrent_rotations_stay_consistent() {
        let store = Arc::new(store("a,b,c,d"));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move { store.rotate("newsapi").await }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        // 8 rotations over 4 keys land back on the first key
        assert_eq!(store.current_key("newsapi").await.unwrap(), "a");
    }
}
