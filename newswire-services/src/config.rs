//! Service configuration
//!
//! Every tunable has a default; `ServiceConfig::from_env` overrides them from
//! `NEWSWIRE_*` variables.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use newswire_core::Locale;
use newswire_providers::{EnvKeySource, FeedTable, LayeredKeySource, StaticKeySource};

use crate::ranking::RankingWeights;

/// Built-in provider ids, in fan-out order
pub const DEFAULT_PROVIDERS: &[&str] = &["newsapi", "gnews", "guardian", "mediastack", "rss"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?}")]
    InvalidValue { name: String, value: String },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ConfigError {
    fn invalid(name: &str, value: &str) -> Self {
        ConfigError::InvalidValue {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

/// What to do with articles whose publication date had to be inferred
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UndatedPolicy {
    /// Keep them, stamped with the fetch time
    #[default]
    Include,
    /// Drop them before the freshness filter
    Exclude,
}

impl FromStr for UndatedPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "include" => Ok(UndatedPolicy::Include),
            "exclude" => Ok(UndatedPolicy::Exclude),
            _ => Err(ConfigError::invalid("NEWSWIRE_UNDATED", s)),
        }
    }
}

/// Aggregation tunables
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    pub locale: Locale,
    /// Fan out to every enabled provider instead of the location pipeline
    pub fetch_all: bool,
    /// Provider used when neither fan-out nor location mode applies
    pub default_provider: String,
    /// Freshness window for the main feed
    pub max_age: chrono::Duration,
    /// Per-provider deadline in location and default modes
    pub provider_timeout: Duration,
    /// Per-provider deadline in fetch-all mode. `None` = no deadline; tasks
    /// are still cancelled when the caller goes away.
    pub fanout_timeout: Option<Duration>,
    pub personalize: bool,
    pub undated: UndatedPolicy,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            locale: Locale::default(),
            fetch_all: false,
            default_provider: "rss".to_string(),
            max_age: chrono::Duration::hours(24),
            provider_timeout: Duration::from_secs(3),
            fanout_timeout: None,
            personalize: true,
            undated: UndatedPolicy::Include,
        }
    }
}

/// Cache tunables
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub ttl: Duration,
    /// Articles older than this are dropped on read
    pub max_age: chrono::Duration,
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(6 * 60 * 60),
            max_age: chrono::Duration::days(7),
            capacity: 100,
        }
    }
}

/// Everything the binary needs to wire the service
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub aggregator: AggregatorConfig,
    pub cache: CacheConfig,
    pub ranking: RankingWeights,
    /// Enabled provider ids, in fan-out order
    pub providers: Vec<String>,
    pub feeds_file: Option<PathBuf>,
    pub keys_file: Option<PathBuf>,
    pub server_port: u16,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            aggregator: AggregatorConfig::default(),
            cache: CacheConfig::default(),
            ranking: RankingWeights::default(),
            providers: DEFAULT_PROVIDERS.iter().map(|p| p.to_string()).collect(),
            feeds_file: None,
            keys_file: None,
            server_port: 3001,
        }
    }
}

impl ServiceConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through `lookup`; blank values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(value) = get("NEWSWIRE_LOCALE") {
            config.aggregator.locale = value
                .parse()
                .map_err(|_| ConfigError::invalid("NEWSWIRE_LOCALE", &value))?;
        }
        if let Some(value) = get("NEWSWIRE_FETCH_ALL") {
            config.aggregator.fetch_all = parse_bool("NEWSWIRE_FETCH_ALL", &value)?;
        }
        if let Some(value) = get("NEWSWIRE_PROVIDERS") {
            config.providers = value
                .split(',')
                .map(|p| p.trim().to_ascii_lowercase())
                .filter(|p| !p.is_empty())
                .collect();
        }
        if let Some(value) = get("NEWSWIRE_DEFAULT_PROVIDER") {
            config.aggregator.default_provider = value.to_ascii_lowercase();
        }
        if let Some(value) = get("NEWSWIRE_MAX_AGE_HOURS") {
            config.aggregator.max_age = parse_hours("NEWSWIRE_MAX_AGE_HOURS", &value)?;
        }
        if let Some(value) = get("NEWSWIRE_CACHE_TTL_SECS") {
            config.cache.ttl = Duration::from_secs(parse_num("NEWSWIRE_CACHE_TTL_SECS", &value)?);
        }
        if let Some(value) = get("NEWSWIRE_CACHE_MAX_AGE_HOURS") {
            config.cache.max_age = parse_hours("NEWSWIRE_CACHE_MAX_AGE_HOURS", &value)?;
        }
        if let Some(value) = get("NEWSWIRE_CACHE_CAPACITY") {
            let capacity: usize = parse_num("NEWSWIRE_CACHE_CAPACITY", &value)?;
            if capacity == 0 {
                return Err(ConfigError::invalid("NEWSWIRE_CACHE_CAPACITY", &value));
            }
            config.cache.capacity = capacity;
        }
        if let Some(value) = get("NEWSWIRE_PROVIDER_TIMEOUT_MS") {
            config.aggregator.provider_timeout =
                Duration::from_millis(parse_num("NEWSWIRE_PROVIDER_TIMEOUT_MS", &value)?);
        }
        if let Some(value) = get("NEWSWIRE_FANOUT_TIMEOUT_MS") {
            config.aggregator.fanout_timeout =
                Some(Duration::from_millis(parse_num("NEWSWIRE_FANOUT_TIMEOUT_MS", &value)?));
        }
        if let Some(value) = get("NEWSWIRE_PERSONALIZE") {
            config.aggregator.personalize = parse_bool("NEWSWIRE_PERSONALIZE", &value)?;
        }
        if let Some(value) = get("NEWSWIRE_UNDATED") {
            config.aggregator.undated = value.parse()?;
        }
        config.feeds_file = get("NEWSWIRE_FEEDS_FILE").map(PathBuf::from);
        config.keys_file = get("NEWSWIRE_KEYS_FILE").map(PathBuf::from);
        if let Some(value) = get("SERVER_PORT") {
            config.server_port = parse_num("SERVER_PORT", &value)?;
        }

        Ok(config)
    }

    /// Feed table from `feeds_file`, or the built-in one
    pub fn load_feed_table(&self) -> Result<FeedTable, ConfigError> {
        match &self.feeds_file {
            Some(path) => {
                let json = read_file(path)?;
                FeedTable::from_json(&json).map_err(|source| ConfigError::Json {
                    path: path.clone(),
                    source,
                })
            }
            None => Ok(FeedTable::builtin()),
        }
    }

    /// Key sources in priority order: environment, then `keys_file`
    pub fn key_source(&self) -> Result<LayeredKeySource, ConfigError> {
        let layered = LayeredKeySource::new().layer(EnvKeySource);
        match &self.keys_file {
            Some(path) => {
                let json = read_file(path)?;
                let bundled = StaticKeySource::from_json(&json).map_err(|source| ConfigError::Json {
                    path: path.clone(),
                    source,
                })?;
                Ok(layered.layer(bundled))
            }
            None => Ok(layered),
        }
    }
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(name, value)),
    }
}

fn parse_num<T: FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::invalid(name, value))
}

/// Non-negative whole hours within chrono's range
fn parse_hours(name: &str, value: &str) -> Result<chrono::Duration, ConfigError> {
    let hours: i64 = parse_num(name, value)?;
    if hours < 0 {
        return Err(ConfigError::invalid(name, value));
    }
    chrono::Duration::try_hours(hours).ok_or_else(|| ConfigError::invalid(name, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.aggregator.locale, Locale::new("it", "IT"));
        assert!(!config.aggregator.fetch_all);
        assert_eq!(config.aggregator.max_age, chrono::Duration::hours(24));
        assert_eq!(config.aggregator.provider_timeout, Duration::from_secs(3));
        assert_eq!(config.aggregator.fanout_timeout, None);
        assert_eq!(config.cache.ttl, Duration::from_secs(21600));
        assert_eq!(config.cache.max_age, chrono::Duration::days(7));
        assert_eq!(config.cache.capacity, 100);
        assert_eq!(config.providers.len(), DEFAULT_PROVIDERS.len());
        assert_eq!(config.server_port, 3001);
    }

    #[test]
    fn test_overrides() {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("NEWSWIRE_LOCALE", "de-DE"),
            ("NEWSWIRE_FETCH_ALL", "yes"),
            ("NEWSWIRE_PROVIDERS", "NewsAPI, rss,"),
            ("NEWSWIRE_FANOUT_TIMEOUT_MS", "1500"),
            ("NEWSWIRE_UNDATED", "Exclude"),
            ("NEWSWIRE_PERSONALIZE", "0"),
            ("SERVER_PORT", "8080"),
            ("NEWSWIRE_FEEDS_FILE", "  "),
        ]))
        .unwrap();

        assert_eq!(config.aggregator.locale, Locale::new("de", "DE"));
        assert!(config.aggregator.fetch_all);
        assert_eq!(config.providers, vec!["newsapi", "rss"]);
        assert_eq!(config.aggregator.fanout_timeout, Some(Duration::from_millis(1500)));
        assert_eq!(config.aggregator.undated, UndatedPolicy::Exclude);
        assert!(!config.aggregator.personalize);
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.feeds_file, None);
    }

    #[test]
    fn test_invalid_values_rejected() {
        for (name, value) in [
            ("NEWSWIRE_LOCALE", "klingon"),
            ("NEWSWIRE_FETCH_ALL", "maybe"),
            ("NEWSWIRE_CACHE_CAPACITY", "0"),
            ("NEWSWIRE_MAX_AGE_HOURS", "-x"),
            ("NEWSWIRE_UNDATED", "sometimes"),
        ] {
            let err = ServiceConfig::from_lookup(lookup(&[(name, value)])).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidValue { .. }), "{}", name);
        }
    }

    #[test]
    fn test_age_windows_must_be_representable() {
        for name in ["NEWSWIRE_MAX_AGE_HOURS", "NEWSWIRE_CACHE_MAX_AGE_HOURS"] {
            for value in ["-1", "9223372036854775807"] {
                let err = ServiceConfig::from_lookup(lookup(&[(name, value)])).unwrap_err();
                assert!(
                    matches!(&err, ConfigError::InvalidValue { name: n, value: v } if n == name && v == value),
                    "{}={}",
                    name,
                    value
                );
            }
        }

        let config = ServiceConfig::from_lookup(lookup(&[
            ("NEWSWIRE_MAX_AGE_HOURS", "0"),
            ("NEWSWIRE_CACHE_MAX_AGE_HOURS", "48"),
        ]))
        .unwrap();
        assert_eq!(config.aggregator.max_age, chrono::Duration::zero());
        assert_eq!(config.cache.max_age, chrono::Duration::hours(48));
    }

    #[test]
    fn test_missing_feeds_file_is_io_error() {
        let config = ServiceConfig {
            feeds_file: Some(PathBuf::from("/nonexistent/newswire-feeds.json")),
            ..ServiceConfig::default()
        };
        assert!(matches!(config.load_feed_table(), Err(ConfigError::Io { .. })));
        assert!(!ServiceConfig::default().load_feed_table().unwrap().is_empty());
    }
}
