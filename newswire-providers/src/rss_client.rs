//! RSS/Atom feed adapter
//!
//! One configurable adapter reads every feed listed in the [`FeedTable`] for
//! the requested tier and category. Feeds are fetched concurrently and parsed
//! as RSS first, then Atom.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use regex::Regex;
use tracing::{debug, warn};

use newswire_core::{Article, ArticleSource};

use crate::error::NewsError;
use crate::http::{FetchClient, HttpRequest};
use crate::normalize::{build_article, clean_text, LANGUAGE_KEY, PROVIDER_KEY, REGION_KEY};
use crate::provider::{FetchRequest, NewsProvider};
use crate::sources::{FeedSource, FeedTable};

/// Feeds fetched at once per request
pub const FEED_CONCURRENCY: usize = 8;

/// Metadata key naming the feed an article was read from
pub const FEED_KEY: &str = "feed";

/// Table-driven feed provider
pub struct RssProvider {
    id: String,
    display_name: String,
    client: FetchClient,
    table: Arc<FeedTable>,
    concurrency: usize,
}

impl RssProvider {
    pub fn new(client: FetchClient, table: Arc<FeedTable>) -> Self {
        Self {
            id: "rss".to_string(),
            display_name: "RSS feeds".to_string(),
            client,
            table,
            concurrency: FEED_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn table(&self) -> &FeedTable {
        &self.table
    }

    async fn fetch_labelled<'a>(
        &self,
        feed: &'a FeedSource,
        now: DateTime<Utc>,
    ) -> (&'a FeedSource, Result<Vec<Article>, NewsError>) {
        (feed, self.fetch_feed(feed, now).await)
    }

    async fn fetch_feed(
        &self,
        feed: &FeedSource,
        now: DateTime<Utc>,
    ) -> Result<Vec<Article>, NewsError> {
        // Feeds have no key to rotate, so transient failures get backoff here
        let bytes = self
            .client
            .fetch_bytes_with_retry(&HttpRequest::get(&feed.url))
            .await?;
        parse_feed(&bytes, feed, now)
    }
}

#[async_trait]
impl NewsProvider for RssProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn requires_key(&self) -> bool {
        false
    }

    async fn fetch(
        &self,
        request: &FetchRequest,
        _api_key: Option<&str>,
    ) -> Result<Vec<Article>, NewsError> {
        let feeds = self
            .table
            .feeds_for(&request.region, request.category_or_general());
        if feeds.is_empty() {
            debug!("No feeds configured for {} / {}", request.region, request.category_or_general());
            return Ok(Vec::new());
        }

        let now = Utc::now();
        let fetches: Vec<_> = feeds.iter().map(|feed| self.fetch_labelled(feed, now)).collect();
        let results: Vec<_> = stream::iter(fetches)
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut articles = Vec::new();
        let mut last_error = None;
        let mut succeeded = 0usize;

        for (feed, result) in results {
            match result {
                Ok(items) => {
                    debug!("Fetched {} items from {}", items.len(), feed.name);
                    succeeded += 1;
                    articles.extend(items.into_iter().map(|article| {
                        article
                            .with_metadata(PROVIDER_KEY, self.id.as_str())
                            .with_metadata(REGION_KEY, request.region.as_key())
                            .with_metadata(LANGUAGE_KEY, request.language.as_str())
                            .with_metadata(FEED_KEY, feed.name.as_str())
                    }));
                }
                Err(e) => {
                    warn!("Failed to fetch feed {}: {}", feed.name, e);
                    last_error = Some(e);
                }
            }
        }

        if succeeded == 0 {
            if let Some(e) = last_error {
                return Err(e);
            }
        }

        if let Some(query) = &request.query {
            let needle = query.to_lowercase();
            articles.retain(|article| article.searchable_text().contains(&needle));
        }

        Ok(articles)
    }
}

/// Parse feed bytes as RSS, falling back to Atom
pub fn parse_feed(
    bytes: &[u8],
    feed: &FeedSource,
    now: DateTime<Utc>,
) -> Result<Vec<Article>, NewsError> {
    if let Ok(channel) = rss::Channel::read_from(bytes) {
        return Ok(parse_rss_channel(&channel, feed, now));
    }

    if let Ok(atom_feed) = atom_syndication::Feed::read_from(bytes) {
        return Ok(parse_atom_feed(&atom_feed, feed, now));
    }

    Err(NewsError::Decoding(format!("Failed to parse feed: {}", feed.url)))
}

fn parse_rss_channel(channel: &rss::Channel, feed: &FeedSource, now: DateTime<Utc>) -> Vec<Article> {
    channel
        .items()
        .iter()
        .filter_map(|item| {
            let dublin_core = item.dublin_core_ext();
            let raw_date = item
                .pub_date()
                .or_else(|| dublin_core.and_then(|dc| dc.dates().first().map(String::as_str)));
            let author = item
                .author()
                .or_else(|| dublin_core.and_then(|dc| dc.creators().first().map(String::as_str)))
                .map(str::to_string);

            let description_html = item.description().unwrap_or_default();

            // Image sources, in order: image enclosure, media:content,
            // media:thumbnail, first <img> in the description
            let image_url = item
                .enclosure()
                .filter(|e| e.mime_type().starts_with("image/"))
                .map(|e| e.url().to_string())
                .or_else(|| extract_media_content(item))
                .or_else(|| extract_image_from_html(description_html))
                .or_else(|| item.content().and_then(extract_image_from_html));

            Some(
                build_article(
                    ArticleSource::new(feed.name.as_str()),
                    item.title(),
                    item.link(),
                    raw_date,
                    now,
                )?
                .with_author(author)
                .with_description(clean_text(Some(description_html)))
                .with_image_url(image_url)
                .with_content(clean_text(item.content())),
            )
        })
        .collect()
}

fn parse_atom_feed(
    atom_feed: &atom_syndication::Feed,
    feed: &FeedSource,
    now: DateTime<Utc>,
) -> Vec<Article> {
    atom_feed
        .entries()
        .iter()
        .filter_map(|entry| {
            let url = entry
                .links()
                .iter()
                .find(|l| l.rel() == "alternate")
                .or_else(|| entry.links().first())
                .map(|l| l.href());
            let raw_date = entry
                .published()
                .unwrap_or_else(|| entry.updated())
                .to_rfc3339();

            let summary_html = entry.summary().map(|s| s.as_str()).unwrap_or_default();
            let content_html = entry.content().and_then(|c| c.value()).unwrap_or_default();
            let description = clean_text(Some(summary_html)).or_else(|| clean_text(Some(content_html)));
            let image_url = extract_image_from_html(content_html)
                .or_else(|| extract_image_from_html(summary_html));

            Some(
                build_article(
                    ArticleSource::new(feed.name.as_str()),
                    Some(entry.title().as_str()),
                    url,
                    Some(&raw_date),
                    now,
                )?
                .with_author(entry.authors().first().map(|p| p.name().to_string()))
                .with_description(description)
                .with_image_url(image_url)
                .with_content(clean_text(Some(content_html))),
            )
        })
        .collect()
}

/// First `<img src="...">` in an HTML fragment, skipping tracking pixels
fn extract_image_from_html(html: &str) -> Option<String> {
    static IMG: OnceLock<Option<Regex>> = OnceLock::new();
    let pattern = IMG
        .get_or_init(|| Regex::new(r#"<img[^>]+src=["']([^"']+)["']"#).ok())
        .as_ref()?;

    let url = pattern.captures(html)?.get(1)?.as_str();
    if url.contains("1x1") || url.contains("pixel") || url.contains("spacer") {
        return None;
    }
    Some(url.to_string())
}

/// Image from `media:content` (image medium or type) or `media:thumbnail`
fn extract_media_content(item: &rss::Item) -> Option<String> {
    let media = item.extensions().get("media")?;

    let content = media.get("content").into_iter().flatten().find_map(|content| {
        let attrs = content.attrs();
        let url = attrs.get("url")?;
        let medium = attrs.get("medium").map(String::as_str);
        let mime = attrs.get("type").map(String::as_str).unwrap_or_default();
        let looks_like_image = [".jpg", ".jpeg", ".png", ".webp"]
            .iter()
            .any(|ext| url.to_ascii_lowercase().ends_with(ext));

        (medium == Some("image") || mime.starts_with("image/") || looks_like_image).then(|| url.clone())
    });

    content.or_else(|| {
        media
            .get("thumbnail")
            .into_iter()
            .flatten()
            .find_map(|thumbnail| thumbnail.attrs().get("url").cloned())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{FetchClientConfig, RetryConfig};
    use chrono::TimeZone;
    use newswire_core::{Category, Region};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/" xmlns:content="http://purl.org/rss/1.0/modules/content/">
  <channel>
    <title>ANSA</title>
    <link>https://www.ansa.it</link>
    <description>Ultime notizie</description>
    <item>
      <title>Governo, via libera alla manovra</title>
      <link>https://www.ansa.it/politica/1</link>
      <description>&lt;p&gt;Il Consiglio dei ministri &lt;b&gt;approva&lt;/b&gt;&lt;/p&gt;</description>
      <pubDate>Wed, 01 May 2024 10:00:00 +0200</pubDate>
      <media:content url="https://www.ansa.it/img/1.jpg" medium="image"/>
      <content:encoded><![CDATA[<p>Testo completo</p>]]></content:encoded>
    </item>
    <item>
      <title>Senza data</title>
      <link>https://www.ansa.it/cronaca/2</link>
      <description>&lt;img src="https://www.ansa.it/img/2.png"/&gt; Cronaca</description>
    </item>
    <item>
      <description>No title, dropped</description>
      <link>https://www.ansa.it/3</link>
    </item>
  </channel>
</rss>"#;

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Il Post</title>
  <id>urn:ilpost</id>
  <updated>2024-05-01T09:00:00Z</updated>
  <entry>
    <title>Un articolo Atom</title>
    <id>urn:ilpost:1</id>
    <link rel="alternate" href="https://www.ilpost.it/2024/05/01/articolo/"/>
    <updated>2024-05-01T09:00:00Z</updated>
    <author><name>Redazione</name></author>
    <summary>Sommario</summary>
  </entry>
</feed>"#;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn client() -> FetchClient {
        let retry = RetryConfig {
            max_attempts: 3,
            base_delay: std::time::Duration::from_millis(10),
        };
        FetchClient::new(FetchClientConfig::default(), retry)
    }

    #[test]
    fn test_parse_rss() {
        let feed = FeedSource::new("ANSA", "https://www.ansa.it/rss.xml");
        let articles = parse_feed(RSS.as_bytes(), &feed, now()).unwrap();
        assert_eq!(articles.len(), 2);

        let first = &articles[0];
        assert_eq!(first.source.name, "ANSA");
        assert_eq!(first.published_at, Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap());
        assert_eq!(first.description.as_deref(), Some("Il Consiglio dei ministri approva"));
        assert_eq!(first.image_url.as_deref(), Some("https://www.ansa.it/img/1.jpg"));
        assert_eq!(first.content.as_deref(), Some("Testo completo"));

        let second = &articles[1];
        assert!(second.has_inferred_date());
        assert_eq!(second.published_at, now());
        assert_eq!(second.image_url.as_deref(), Some("https://www.ansa.it/img/2.png"));
    }

    #[test]
    fn test_parse_atom() {
        let feed = FeedSource::new("Il Post", "https://www.ilpost.it/feed/");
        let articles = parse_feed(ATOM.as_bytes(), &feed, now()).unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].url, "https://www.ilpost.it/2024/05/01/articolo/");
        assert_eq!(articles[0].author.as_deref(), Some("Redazione"));
        assert_eq!(articles[0].description.as_deref(), Some("Sommario"));
        assert!(!articles[0].has_inferred_date());
    }

    #[test]
    fn test_parse_garbage_is_decoding_error() {
        let feed = FeedSource::new("Broken", "https://example.com/feed");
        let err = parse_feed(b"<html>not a feed</html>", &feed, now()).unwrap_err();
        assert!(matches!(err, NewsError::Decoding(_)));
    }

    #[test]
    fn test_tracking_pixels_ignored() {
        assert_eq!(extract_image_from_html(r#"<img src="https://t.co/pixel.gif">"#), None);
        assert_eq!(
            extract_image_from_html(r#"<p><img class="x" src='https://a.it/b.jpg'></p>"#).as_deref(),
            Some("https://a.it/b.jpg")
        );
    }

    async fn provider_with(server: &MockServer, paths: &[&str]) -> RssProvider {
        let italy = Region::country("it");
        let feeds = paths
            .iter()
            .map(|p| FeedSource::new(p, &format!("{}{}", server.uri(), p)))
            .collect();
        let table = FeedTable::new().with_feeds(&italy, Category::General, feeds);
        RssProvider::new(client(), Arc::new(table))
    }

    #[tokio::test]
    async fn test_one_failing_feed_does_not_fail_adapter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200).set_body_string(RSS))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/down"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let provider = provider_with(&server, &["/ok", "/down"]).await;
        let request = FetchRequest::new(Region::country("it"), "it");
        let articles = provider.fetch(&request, None).await.unwrap();

        assert_eq!(articles.len(), 2);
        assert!(articles
            .iter()
            .all(|a| a.metadata.get(FEED_KEY).map(String::as_str) == Some("/ok")));
        assert!(articles
            .iter()
            .all(|a| a.metadata.get(PROVIDER_KEY).map(String::as_str) == Some("rss")));
    }

    #[tokio::test]
    async fn test_all_feeds_failing_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let provider = provider_with(&server, &["/a", "/b"]).await;
        let request = FetchRequest::new(Region::country("it"), "it");
        let err = provider.fetch(&request, None).await.unwrap_err();
        assert_eq!(err, NewsError::ServerError { status: 503 });
    }

    #[tokio::test]
    async fn test_unconfigured_tier_returns_nothing() {
        let server = MockServer::start().await;
        let provider = provider_with(&server, &["/a"]).await;

        let request = FetchRequest::new(Region::Global, "it");
        assert!(provider.fetch(&request, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_query_filters_feed_items() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(RSS))
            .mount(&server)
            .await;

        let provider = provider_with(&server, &["/ok"]).await;
        let request = FetchRequest::new(Region::country("it"), "it")
            .with_query(Some("MANOVRA".to_string()));
        let articles = provider.fetch(&request, None).await.unwrap();

        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].url, "https://www.ansa.it/politica/1");
    }

    #[tokio::test]
    async fn test_transient_feed_failure_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_string(RSS))
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider_with(&server, &["/flaky"]).await;
        let request = FetchRequest::new(Region::country("it"), "it");
        let articles = provider.fetch(&request, None).await.unwrap();

        assert_eq!(articles.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_feed_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider_with(&server, &["/gone"]).await;
        let request = FetchRequest::new(Region::country("it"), "it");
        let err = provider.fetch(&request, None).await.unwrap_err();
        assert_eq!(err, NewsError::ServerError { status: 404 });
    }
}
