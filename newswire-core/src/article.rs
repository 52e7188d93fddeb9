//! Canonical article model shared by every provider

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::CoreError;

/// Metadata key set by adapters that could not parse a publication date
pub const DATE_INFERRED_KEY: &str = "date_inferred";

/// Publisher of an article
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleSource {
    /// Provider-specific source identifier (e.g. NewsAPI's "bbc-news")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Human-readable source name
    pub name: String,
}

impl ArticleSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
        }
    }

    pub fn with_id(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            name: name.into(),
        }
    }
}

/// A news article normalized from any provider.
///
/// The URL is the identity: two articles whose URLs compare equal ignoring
/// ASCII case are the same article, whatever their other fields say.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub source: ArticleSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub published_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Provider-specific annotations (language, region, section, ...)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl Article {
    /// Create an article with the required fields. Fails on a blank title.
    pub fn new(
        source: ArticleSource,
        title: impl Into<String>,
        url: impl Into<String>,
        published_at: DateTime<Utc>,
    ) -> Result<Self, CoreError> {
        let title = title.into().trim().to_string();
        if title.is_empty() {
            return Err(CoreError::EmptyTitle);
        }

        Ok(Self {
            source,
            author: None,
            title,
            description: None,
            url: url.into().trim().to_string(),
            image_url: None,
            published_at,
            content: None,
            metadata: BTreeMap::new(),
        })
    }

    pub fn with_author(mut self, author: Option<String>) -> Self {
        self.author = non_blank(author);
        self
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = non_blank(description);
        self
    }

    pub fn with_image_url(mut self, image_url: Option<String>) -> Self {
        self.image_url = non_blank(image_url);
        self
    }

    pub fn with_content(mut self, content: Option<String>) -> Self {
        self.content = non_blank(content);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Mark the publication date as a fallback rather than a parsed value
    pub fn with_inferred_date(self) -> Self {
        self.with_metadata(DATE_INFERRED_KEY, "true")
    }

    /// Key used for deduplication and bookmark lookup
    pub fn identity_key(&self) -> String {
        self.url.trim().to_ascii_lowercase()
    }

    /// Short stable identifier derived from the identity key
    pub fn id(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.identity_key().as_bytes());
        hex::encode(&hasher.finalize()[..8])
    }

    pub fn has_inferred_date(&self) -> bool {
        self.metadata
            .get(DATE_INFERRED_KEY)
            .is_some_and(|v| v == "true")
    }

    /// Age relative to `now`. Negative for articles dated in the future.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.published_at)
    }

    /// Whether the article falls inside the freshness window
    pub fn is_fresh(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        self.age(now) <= max_age
    }

    /// Title and description joined, lowercased, for keyword matching
    pub fn searchable_text(&self) -> String {
        let mut text = self.title.to_lowercase();
        if let Some(description) = &self.description {
            text.push(' ');
            text.push_str(&description.to_lowercase());
        }
        text
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
