//! Generic REST JSON adapter
//!
//! One adapter type covers every JSON provider. A [`RestProviderConfig`]
//! selects the wire flavor (endpoint shape, query parameter names, payload
//! type) and the authentication style; presets exist for the supported
//! services.

pub mod payloads;

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use newswire_core::{Article, Category, Region, EUROPEAN_COUNTRIES};

use crate::error::NewsError;
use crate::http::{FetchClient, HttpRequest};
use crate::normalize::{LANGUAGE_KEY, PROVIDER_KEY, REGION_KEY};
use crate::provider::{FetchRequest, NewsProvider};

use payloads::{GNewsResponse, GuardianResponse, MediastackResponse, NewsApiResponse};

const DEFAULT_PAGE_SIZE: u32 = 20;

/// How the API key is attached to a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStyle {
    /// `?<name>=<key>`
    QueryParam(String),
    /// `X-RapidAPI-Key` / `X-RapidAPI-Host` headers
    RapidApi { host: String },
    /// Keyless endpoint
    None,
}

/// Wire format of a REST provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestFlavor {
    NewsApi,
    GNews,
    Guardian,
    Mediastack,
}

/// Configuration for one REST provider
#[derive(Debug, Clone)]
pub struct RestProviderConfig {
    pub id: String,
    pub display_name: String,
    /// Base URL without trailing slash, e.g. `https://newsapi.org/v2`
    pub base_url: String,
    pub auth: AuthStyle,
    pub flavor: RestFlavor,
    pub page_size: u32,
}

impl RestProviderConfig {
    pub fn newsapi() -> Self {
        Self {
            id: "newsapi".to_string(),
            display_name: "NewsAPI".to_string(),
            base_url: "https://newsapi.org/v2".to_string(),
            auth: AuthStyle::QueryParam("apiKey".to_string()),
            flavor: RestFlavor::NewsApi,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn gnews() -> Self {
        Self {
            id: "gnews".to_string(),
            display_name: "GNews".to_string(),
            base_url: "https://gnews.io/api/v4".to_string(),
            auth: AuthStyle::QueryParam("apikey".to_string()),
            flavor: RestFlavor::GNews,
            page_size: 10,
        }
    }

    pub fn guardian() -> Self {
        Self {
            id: "guardian".to_string(),
            display_name: "The Guardian".to_string(),
            base_url: "https://content.guardianapis.com".to_string(),
            auth: AuthStyle::QueryParam("api-key".to_string()),
            flavor: RestFlavor::Guardian,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn mediastack() -> Self {
        Self {
            id: "mediastack".to_string(),
            display_name: "Mediastack".to_string(),
            base_url: "http://api.mediastack.com/v1".to_string(),
            auth: AuthStyle::QueryParam("access_key".to_string()),
            flavor: RestFlavor::Mediastack,
            page_size: 25,
        }
    }

    /// Preset by provider id
    pub fn preset(id: &str) -> Option<Self> {
        match id {
            "newsapi" => Some(Self::newsapi()),
            "gnews" => Some(Self::gnews()),
            "guardian" => Some(Self::guardian()),
            "mediastack" => Some(Self::mediastack()),
            _ => None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Route through RapidAPI: key and host travel as headers
    pub fn with_rapidapi(mut self, host: impl Into<String>) -> Self {
        self.auth = AuthStyle::RapidApi { host: host.into() };
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}

/// REST JSON provider adapter
pub struct RestProvider {
    config: RestProviderConfig,
    client: FetchClient,
}

impl RestProvider {
    pub fn new(config: RestProviderConfig, client: FetchClient) -> Self {
        Self { config, client }
    }

    pub fn config(&self) -> &RestProviderConfig {
        &self.config
    }

    /// Build the provider-specific request, auth included
    pub fn build_request(
        &self,
        request: &FetchRequest,
        api_key: Option<&str>,
    ) -> Result<HttpRequest, NewsError> {
        let http = match self.config.flavor {
            RestFlavor::NewsApi => self.newsapi_request(request),
            RestFlavor::GNews => self.gnews_request(request),
            RestFlavor::Guardian => self.guardian_request(request),
            RestFlavor::Mediastack => self.mediastack_request(request),
        };

        let key = || {
            api_key
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .ok_or_else(|| NewsError::MissingKey(self.config.display_name.clone()))
        };

        match &self.config.auth {
            AuthStyle::None => Ok(http),
            AuthStyle::QueryParam(name) => Ok(http.query(name, key()?)),
            AuthStyle::RapidApi { host } => Ok(http
                .header("X-RapidAPI-Key", key()?)
                .header("X-RapidAPI-Host", host.as_str())),
        }
    }

    fn newsapi_request(&self, request: &FetchRequest) -> HttpRequest {
        let base = &self.config.base_url;
        let paging = |http: HttpRequest| {
            http.query("pageSize", self.config.page_size.to_string())
                .query("page", request.page.to_string())
        };

        // Free-text and pan-European requests need /everything;
        // /top-headlines only filters by country and category.
        let query = request.query.clone().or_else(|| match request.region {
            Region::Europe => Some(europe_query(&request.language).to_string()),
            _ => None,
        });

        match query {
            Some(q) => paging(
                HttpRequest::get(format!("{}/everything", base))
                    .query("q", q)
                    .query("language", request.language.as_str())
                    .query("sortBy", "publishedAt"),
            ),
            None => paging(
                HttpRequest::get(format!("{}/top-headlines", base))
                    .query_opt("country", request.region.country_code())
                    .query("category", newsapi_category(request.category_or_general())),
            ),
        }
    }

    fn gnews_request(&self, request: &FetchRequest) -> HttpRequest {
        let base = &self.config.base_url;
        let http = match &request.query {
            Some(q) => HttpRequest::get(format!("{}/search", base))
                .query("q", q.as_str())
                .query("sortby", "publishedAt"),
            None => {
                // No regional filter on GNews; "world" is the closest tier
                let category = match request.region {
                    Region::Europe => "world",
                    _ => gnews_category(request.category_or_general()),
                };
                HttpRequest::get(format!("{}/top-headlines", base)).query("category", category)
            }
        };

        http.query_opt("country", request.region.country_code())
            .query("lang", request.language.as_str())
            .query("max", self.config.page_size.to_string())
            .query("page", request.page.to_string())
    }

    fn guardian_request(&self, request: &FetchRequest) -> HttpRequest {
        let query = request.query.clone().or_else(|| match &request.region {
            Region::Country(code) => Some(code.to_ascii_lowercase()),
            Region::Europe => Some("europe".to_string()),
            Region::Global => None,
        });

        HttpRequest::get(format!("{}/search", self.config.base_url))
            .query_opt("q", query)
            .query_opt("section", request.category.and_then(guardian_section))
            .query("order-by", "newest")
            .query("show-fields", "trailText,thumbnail,byline,bodyText")
            .query("page-size", self.config.page_size.to_string())
            .query("page", request.page.to_string())
    }

    fn mediastack_request(&self, request: &FetchRequest) -> HttpRequest {
        let countries = match &request.region {
            Region::Country(code) => Some(code.to_ascii_lowercase()),
            Region::Europe => Some(
                EUROPEAN_COUNTRIES
                    .iter()
                    .map(|c| c.to_ascii_lowercase())
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            Region::Global => None,
        };
        let offset = (request.page.saturating_sub(1)) * self.config.page_size;

        HttpRequest::get(format!("{}/news", self.config.base_url))
            .query_opt("countries", countries)
            .query_opt("categories", request.category.map(mediastack_category))
            .query_opt("keywords", request.query.clone())
            .query("languages", request.language.as_str())
            .query("sort", "published_desc")
            .query("limit", self.config.page_size.to_string())
            .query("offset", offset.to_string())
    }

    fn annotate(&self, articles: Vec<Article>, request: &FetchRequest) -> Vec<Article> {
        articles
            .into_iter()
            .map(|article| {
                article
                    .with_metadata(PROVIDER_KEY, self.config.id.as_str())
                    .with_metadata(REGION_KEY, request.region.as_key())
                    .with_metadata(LANGUAGE_KEY, request.language.as_str())
            })
            .collect()
    }
}

#[async_trait]
impl NewsProvider for RestProvider {
    fn id(&self) -> &str {
        &self.config.id
    }

    fn display_name(&self) -> &str {
        &self.config.display_name
    }

    fn requires_key(&self) -> bool {
        self.config.auth != AuthStyle::None
    }

    async fn fetch(
        &self,
        request: &FetchRequest,
        api_key: Option<&str>,
    ) -> Result<Vec<Article>, NewsError> {
        let http = self.build_request(request, api_key)?;
        let now = Utc::now();

        let articles = match self.config.flavor {
            RestFlavor::NewsApi => self
                .client
                .fetch_json_with_retry::<NewsApiResponse>(&http)
                .await?
                .into_articles(now),
            RestFlavor::GNews => self
                .client
                .fetch_json_with_retry::<GNewsResponse>(&http)
                .await?
                .into_articles(now),
            RestFlavor::Guardian => self
                .client
                .fetch_json_with_retry::<GuardianResponse>(&http)
                .await?
                .into_articles(now),
            RestFlavor::Mediastack => self
                .client
                .fetch_json_with_retry::<MediastackResponse>(&http)
                .await?
                .into_articles(now),
        };

        debug!(
            "{} ({}) normalized {} articles",
            self.config.display_name,
            request.region,
            articles.len()
        );
        Ok(self.annotate(articles, request))
    }
}

fn europe_query(language: &str) -> &'static str {
    match language {
        "it" | "de" | "es" | "pt" | "nl" | "pl" => "europa",
        _ => "europe",
    }
}

fn newsapi_category(category: Category) -> &'static str {
    match category {
        Category::Business => "business",
        Category::Technology => "technology",
        Category::Science => "science",
        Category::Health => "health",
        Category::Sports => "sports",
        Category::Entertainment => "entertainment",
        Category::General | Category::World | Category::Politics => "general",
    }
}

fn gnews_category(category: Category) -> &'static str {
    match category {
        Category::General => "general",
        Category::World => "world",
        Category::Politics => "nation",
        Category::Business => "business",
        Category::Technology => "technology",
        Category::Science => "science",
        Category::Health => "health",
        Category::Sports => "sports",
        Category::Entertainment => "entertainment",
    }
}

fn guardian_section(category: Category) -> Option<&'static str> {
    match category {
        Category::General => None,
        Category::World => Some("world"),
        Category::Politics => Some("politics"),
        Category::Business => Some("business"),
        Category::Technology => Some("technology"),
        Category::Science => Some("science"),
        Category::Health => Some("society"),
        Category::Sports => Some("sport"),
        Category::Entertainment => Some("culture"),
    }
}

fn mediastack_category(category: Category) -> &'static str {
    match category {
        Category::Business => "business",
        Category::Technology => "technology",
        Category::Science => "science",
        Category::Health => "health",
        Category::Sports => "sports",
        Category::Entertainment => "entertainment",
        Category::General | Category::World | Category::Politics => "general",
    }
}
