//! List pipeline applied after fan-in: undated policy, freshness, dedupe, sort

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};

use newswire_core::Article;

use crate::config::UndatedPolicy;

/// Drop articles older than `max_age`
pub fn filter_fresh(articles: Vec<Article>, now: DateTime<Utc>, max_age: Duration) -> Vec<Article> {
    articles
        .into_iter()
        .filter(|article| article.is_fresh(now, max_age))
        .collect()
}

/// Apply the policy for articles whose date was inferred
pub fn filter_undated(articles: Vec<Article>, policy: UndatedPolicy) -> Vec<Article> {
    match policy {
        UndatedPolicy::Include => articles,
        UndatedPolicy::Exclude => articles
            .into_iter()
            .filter(|article| !article.has_inferred_date())
            .collect(),
    }
}

/// Remove duplicates by case-insensitive URL. First occurrence wins and the
/// relative order of survivors is preserved.
pub fn dedupe(articles: Vec<Article>) -> Vec<Article> {
    let mut seen = HashSet::with_capacity(articles.len());
    articles
        .into_iter()
        .filter(|article| seen.insert(article.identity_key()))
        .collect()
}

/// Newest first. Stable: equal timestamps keep their incoming order.
pub fn sort_newest_first(articles: &mut [Article]) {
    articles.sort_by(|a, b| b.published_at.cmp(&a.published_at));
}

/// Full post-fan-in pipeline
pub fn process(
    articles: Vec<Article>,
    now: DateTime<Utc>,
    max_age: Duration,
    undated: UndatedPolicy,
) -> Vec<Article> {
    let articles = filter_undated(articles, undated);
    let articles = filter_fresh(articles, now, max_age);
    let mut articles = dedupe(articles);
    sort_newest_first(&mut articles);
    articles
}
