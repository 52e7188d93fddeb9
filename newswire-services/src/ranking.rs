//! Personalization and ranking
//!
//! Scores articles against the reader's [`UserPreferenceProfile`] and
//! reorders the list. The lowest-scored slice of the list is shuffled so the
//! reader keeps seeing content outside their usual interests.

use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use rand::Rng;

use newswire_core::{Article, Category, UserPreferenceProfile};

/// Keywords used to infer an article's category from its title and description
const CATEGORY_KEYWORDS: &[(Category, &[&str])] = &[
    (
        Category::Technology,
        &[
            "tech", "ai", "intelligenza artificiale", "software", "app", "smartphone", "apple",
            "google", "microsoft", "cyber", "digitale", "startup", "chip",
        ],
    ),
    (
        Category::Sports,
        &[
            "calcio", "serie a", "football", "soccer", "tennis", "sport", "champions", "juventus",
            "inter", "milan", "formula 1", "olimpiadi", "partita", "campionato",
        ],
    ),
    (
        Category::Business,
        &[
            "economia", "economy", "borsa", "mercati", "market", "inflazione", "inflation", "pil",
            "gdp", "banca", "bank", "azioni", "stocks", "spread",
        ],
    ),
    (
        Category::Politics,
        &[
            "governo", "government", "parlamento", "parliament", "elezioni", "election",
            "ministro", "minister", "premier", "senato", "senate", "partito",
        ],
    ),
    (
        Category::Health,
        &[
            "salute", "health", "medicina", "ospedale", "hospital", "virus", "vaccino", "vaccine",
            "malattia", "sanità",
        ],
    ),
    (
        Category::Science,
        &[
            "scienza", "science", "ricerca", "research", "spazio", "space", "nasa", "esa",
            "clima", "climate", "fisica",
        ],
    ),
    (
        Category::Entertainment,
        &[
            "cinema", "film", "musica", "music", "serie tv", "festival", "sanremo", "concerto",
            "celebrity", "netflix",
        ],
    ),
    (
        Category::World,
        &[
            "ucraina", "ukraine", "russia", "cina", "china", "usa", "onu", "nato", "guerra", "war",
            "medio oriente",
        ],
    ),
];

/// Score weights. Defaults: 40% category, 20% source, 20% freshness,
/// 20% novelty, with the bottom 20% of slots reserved for a shuffled tail.
#[derive(Debug, Clone, PartialEq)]
pub struct RankingWeights {
    pub category: f64,
    pub source: f64,
    pub freshness: f64,
    pub novelty: f64,
    /// Subtracted for URLs the reader skipped
    pub skip_penalty: f64,
    /// Profile score that maps to full affinity
    pub affinity_scale: f64,
    /// Freshness decays linearly to zero over this window
    pub freshness_window: Duration,
    /// Fraction of slots at the bottom filled by the shuffled tail
    pub diverse_fraction: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            category: 0.4,
            source: 0.2,
            freshness: 0.2,
            novelty: 0.2,
            skip_penalty: 0.5,
            affinity_scale: 10.0,
            freshness_window: Duration::days(7),
            diverse_fraction: 0.2,
        }
    }
}

/// Category inferred from keyword hits in title and description.
/// The category with most hits wins; ties go to the earlier table row.
pub fn infer_category(article: &Article) -> Category {
    let text = article.searchable_text();
    let words: Vec<&str> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    let hits = |keyword: &str| -> bool {
        if keyword.contains(' ') {
            text.contains(keyword)
        } else {
            words.contains(&keyword)
        }
    };

    let mut best = (Category::General, 0usize);
    for (category, keywords) in CATEGORY_KEYWORDS {
        let count = keywords.iter().filter(|k| hits(k)).count();
        if count > best.1 {
            best = (*category, count);
        }
    }
    best.0
}

/// Scores and orders articles for one reader
#[derive(Debug, Clone, Default)]
pub struct Ranker {
    weights: RankingWeights,
}

impl Ranker {
    pub fn new(weights: RankingWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &RankingWeights {
        &self.weights
    }

    pub fn score(&self, article: &Article, profile: &UserPreferenceProfile, now: DateTime<Utc>) -> f64 {
        let w = &self.weights;

        let category = self.affinity(profile.category_score(infer_category(article)));
        let source = self.affinity(profile.source_score(&article.source.name));
        let freshness = self.freshness(article, now);
        let novelty = if profile.has_read(article) { 0.0 } else { 1.0 };
        let penalty = if profile.has_skipped(article) { w.skip_penalty } else { 0.0 };

        w.category * category + w.source * source + w.freshness * freshness + w.novelty * novelty
            - penalty
    }

    /// Rank with a thread-local RNG for the diverse tail
    pub fn rank(&self, articles: Vec<Article>, profile: &UserPreferenceProfile) -> Vec<Article> {
        self.rank_with_rng(articles, profile, Utc::now(), &mut rand::rng())
    }

    /// Order by descending score, then shuffle the bottom `diverse_fraction`
    /// of slots
    pub fn rank_with_rng<R: Rng + ?Sized>(
        &self,
        articles: Vec<Article>,
        profile: &UserPreferenceProfile,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Vec<Article> {
        let mut scored: Vec<(f64, Article)> = articles
            .into_iter()
            .map(|article| (self.score(&article, profile, now), article))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        let mut ranked: Vec<Article> = scored.into_iter().map(|(_, article)| article).collect();
        let diverse = self.diverse_slots(ranked.len());
        if diverse > 1 {
            let head = ranked.len() - diverse;
            ranked[head..].shuffle(rng);
        }
        ranked
    }

    /// Number of bottom slots given to the shuffled tail
    pub fn diverse_slots(&self, len: usize) -> usize {
        let fraction = self.weights.diverse_fraction.clamp(0.0, 1.0);
        (len as f64 * fraction).floor() as usize
    }

    /// Profile score mapped to [0, 1], 0.5 being neutral
    fn affinity(&self, raw: f64) -> f64 {
        let scale = self.weights.affinity_scale.max(f64::EPSILON);
        ((raw / scale).clamp(-1.0, 1.0) + 1.0) / 2.0
    }

    fn freshness(&self, article: &Article, now: DateTime<Utc>) -> f64 {
        let window = self.weights.freshness_window.num_seconds().max(1) as f64;
        let age = article.age(now).num_seconds().max(0) as f64;
        (1.0 - age / window).clamp(0.0, 1.0)
    }
}
