//! Reader preference profile mutated by explicit tracking events

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::{Article, Category};

const READ_WEIGHT: f64 = 1.0;
const BOOKMARK_WEIGHT: f64 = 2.0;
const SHARE_WEIGHT: f64 = 1.5;
const SKIP_WEIGHT: f64 = -1.0;

/// Something the reader did with an article
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TrackingEvent {
    Read {
        #[serde(default)]
        reading_time_secs: u64,
    },
    Bookmark,
    Skip,
    Share,
}

impl TrackingEvent {
    /// Fixed affinity delta applied to the article's category and source
    pub fn weight(&self) -> f64 {
        match self {
            TrackingEvent::Read { .. } => READ_WEIGHT,
            TrackingEvent::Bookmark => BOOKMARK_WEIGHT,
            TrackingEvent::Share => SHARE_WEIGHT,
            TrackingEvent::Skip => SKIP_WEIGHT,
        }
    }
}

/// Per-reader affinities and history. Lives from install to explicit reset.
///
/// URL sets store identity keys (lowercased URLs) so lookups follow the same
/// case-insensitive rule as deduplication.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserPreferenceProfile {
    #[serde(default)]
    pub category_scores: HashMap<Category, f64>,
    #[serde(default)]
    pub source_scores: HashMap<String, f64>,
    #[serde(default)]
    pub read_urls: HashSet<String>,
    #[serde(default)]
    pub bookmarked_urls: HashSet<String>,
    #[serde(default)]
    pub skipped_urls: HashSet<String>,
    #[serde(default)]
    pub total_reading_time_secs: u64,
}

impl UserPreferenceProfile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a tracking event for `article`, whose category was inferred by the caller
    pub fn record(&mut self, article: &Article, category: Category, event: TrackingEvent) {
        let weight = event.weight();
        *self.category_scores.entry(category).or_insert(0.0) += weight;
        *self
            .source_scores
            .entry(source_key(&article.source.name))
            .or_insert(0.0) += weight;

        let key = article.identity_key();
        match event {
            TrackingEvent::Read { reading_time_secs } => {
                self.total_reading_time_secs += reading_time_secs;
                self.read_urls.insert(key);
            }
            TrackingEvent::Bookmark => {
                self.bookmarked_urls.insert(key);
            }
            TrackingEvent::Skip => {
                self.skipped_urls.insert(key);
            }
            TrackingEvent::Share => {}
        }
    }

    pub fn category_score(&self, category: Category) -> f64 {
        self.category_scores.get(&category).copied().unwrap_or(0.0)
    }

    pub fn source_score(&self, source_name: &str) -> f64 {
        self.source_scores
            .get(&source_key(source_name))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn has_read(&self, article: &Article) -> bool {
        self.read_urls.contains(&article.identity_key())
    }

    pub fn has_skipped(&self, article: &Article) -> bool {
        self.skipped_urls.contains(&article.identity_key())
    }

    pub fn is_bookmarked(&self, article: &Article) -> bool {
        self.bookmarked_urls.contains(&article.identity_key())
    }

    /// Forget everything
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

fn source_key(name: &str) -> String {
    name.trim().to_lowercase()
}
