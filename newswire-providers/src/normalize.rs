//! Helpers shared by adapters when turning payload fields into [`Article`]s

use chrono::{DateTime, Utc};
use tracing::debug;

use newswire_core::{Article, ArticleSource};

use crate::dates::{date_from_url, parse_published_at};

/// Metadata key naming the adapter an article came from
pub const PROVIDER_KEY: &str = "provider";
/// Metadata key for the tier the article was fetched for
pub const REGION_KEY: &str = "region";
/// Metadata key for the request language
pub const LANGUAGE_KEY: &str = "language";

/// Build an article from raw payload fields.
///
/// Entries without a title or URL are dropped. When the date cannot be
/// parsed (or found in the URL) the article is stamped with `now` and
/// flagged as inferred.
pub fn build_article(
    source: ArticleSource,
    title: Option<&str>,
    url: Option<&str>,
    raw_date: Option<&str>,
    now: DateTime<Utc>,
) -> Option<Article> {
    let url = url.map(str::trim).filter(|u| !u.is_empty())?;
    let title = strip_html(title?);

    let parsed = raw_date
        .and_then(parse_published_at)
        .or_else(|| date_from_url(url));

    let article = match Article::new(source, title, url, parsed.unwrap_or(now)) {
        Ok(article) => article,
        Err(e) => {
            debug!("Skipping entry {}: {}", url, e);
            return None;
        }
    };

    Some(if parsed.is_some() {
        article
    } else {
        article.with_inferred_date()
    })
}

/// Strip tags, decode the common entities and collapse whitespace
pub fn strip_html(html: &str) -> String {
    let mut result = String::with_capacity(html.len());
    let mut in_tag = false;

    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(c),
            _ => {}
        }
    }

    result
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#039;", "'")
        .replace("&amp;", "&")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Strip HTML from an optional field, dropping it if nothing is left
pub fn clean_text(raw: Option<&str>) -> Option<String> {
    raw.map(strip_html).filter(|s| !s.is_empty())
}

/// Display name for a publisher derived from the article host
/// (`https://www.ansa.it/x` -> `Ansa`)
pub fn source_from_url(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    let name = host.strip_prefix("www.").unwrap_or(host).split('.').next()?;

    let mut chars = name.chars();
    let first = chars.next()?;
    Some(first.to_uppercase().chain(chars).collect())
}
