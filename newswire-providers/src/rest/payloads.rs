//! Typed JSON payloads for the REST presets

use chrono::{DateTime, Utc};
use serde::Deserialize;

use newswire_core::{Article, ArticleSource};

use crate::normalize::{build_article, clean_text, source_from_url};

// ============================================================================
// NewsAPI
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsApiResponse {
    #[serde(default)]
    pub articles: Vec<NewsApiArticle>,
}

#[derive(Debug, Deserialize)]
pub struct NewsApiSource {
    pub id: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsApiArticle {
    pub source: Option<NewsApiSource>,
    pub author: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub url_to_image: Option<String>,
    pub published_at: Option<String>,
    pub content: Option<String>,
}

impl NewsApiResponse {
    pub fn into_articles(self, now: DateTime<Utc>) -> Vec<Article> {
        self.articles
            .into_iter()
            // NewsAPI keeps tombstones for deleted stories
            .filter(|a| a.title.as_deref() != Some("[Removed]"))
            .filter_map(|a| {
                let source = match a.source {
                    Some(NewsApiSource { id: Some(id), name }) => {
                        let name = name.unwrap_or_else(|| id.clone());
                        ArticleSource::with_id(id, name)
                    }
                    Some(NewsApiSource { id: None, name }) => {
                        ArticleSource::new(name.unwrap_or_else(|| "NewsAPI".to_string()))
                    }
                    None => ArticleSource::new("NewsAPI"),
                };
                Some(
                    build_article(
                        source,
                        a.title.as_deref(),
                        a.url.as_deref(),
                        a.published_at.as_deref(),
                        now,
                    )?
                    .with_author(a.author)
                    .with_description(clean_text(a.description.as_deref()))
                    .with_image_url(a.url_to_image)
                    .with_content(a.content),
                )
            })
            .collect()
    }
}

// ============================================================================
// GNews
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct GNewsResponse {
    #[serde(default)]
    pub articles: Vec<GNewsArticle>,
}

#[derive(Debug, Deserialize)]
pub struct GNewsSource {
    pub name: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GNewsArticle {
    pub title: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    pub url: Option<String>,
    pub image: Option<String>,
    pub published_at: Option<String>,
    pub source: Option<GNewsSource>,
}

impl GNewsResponse {
    pub fn into_articles(self, now: DateTime<Utc>) -> Vec<Article> {
        self.articles
            .into_iter()
            .filter_map(|a| {
                let name = a
                    .source
                    .and_then(|s| s.name.or_else(|| s.url.as_deref().and_then(source_from_url)))
                    .unwrap_or_else(|| "GNews".to_string());
                Some(
                    build_article(
                        ArticleSource::new(name),
                        a.title.as_deref(),
                        a.url.as_deref(),
                        a.published_at.as_deref(),
                        now,
                    )?
                    .with_description(clean_text(a.description.as_deref()))
                    .with_image_url(a.image)
                    .with_content(a.content),
                )
            })
            .collect()
    }
}

// ============================================================================
// The Guardian
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct GuardianResponse {
    pub response: GuardianBody,
}

#[derive(Debug, Deserialize)]
pub struct GuardianBody {
    #[serde(default)]
    pub results: Vec<GuardianResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardianResult {
    pub section_name: Option<String>,
    pub web_title: Option<String>,
    pub web_url: Option<String>,
    pub web_publication_date: Option<String>,
    pub fields: Option<GuardianFields>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardianFields {
    pub trail_text: Option<String>,
    pub thumbnail: Option<String>,
    pub byline: Option<String>,
    pub body_text: Option<String>,
}

impl GuardianResponse {
    pub fn into_articles(self, now: DateTime<Utc>) -> Vec<Article> {
        self.response
            .results
            .into_iter()
            .filter_map(|r| {
                let fields = r.fields.unwrap_or_default();
                let mut article = build_article(
                    ArticleSource::with_id("the-guardian", "The Guardian"),
                    r.web_title.as_deref(),
                    r.web_url.as_deref(),
                    r.web_publication_date.as_deref(),
                    now,
                )?
                .with_author(fields.byline)
                .with_description(clean_text(fields.trail_text.as_deref()))
                .with_image_url(fields.thumbnail)
                .with_content(fields.body_text);
                if let Some(section) = r.section_name {
                    article = article.with_metadata("section", section);
                }
                Some(article)
            })
            .collect()
    }
}

// ============================================================================
// Mediastack
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct MediastackResponse {
    #[serde(default)]
    pub data: Vec<MediastackArticle>,
}

#[derive(Debug, Deserialize)]
pub struct MediastackArticle {
    pub author: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub source: Option<String>,
    pub image: Option<String>,
    pub category: Option<String>,
    pub country: Option<String>,
    pub published_at: Option<String>,
}

impl MediastackResponse {
    pub fn into_articles(self, now: DateTime<Utc>) -> Vec<Article> {
        self.data
            .into_iter()
            .filter_map(|a| {
                let name = a.source.unwrap_or_else(|| "Mediastack".to_string());
                let mut article = build_article(
                    ArticleSource::new(name),
                    a.title.as_deref(),
                    a.url.as_deref(),
                    a.published_at.as_deref(),
                    now,
                )?
                .with_author(a.author)
                .with_description(clean_text(a.description.as_deref()))
                .with_image_url(a.image);
                if let Some(category) = a.category {
                    article = article.with_metadata("category", category);
                }
                if let Some(country) = a.country {
                    article = article.with_metadata("country", country);
                }
                Some(article)
            })
            .collect()
    }
}
