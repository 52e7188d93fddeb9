//! Provider adapter abstraction

use async_trait::async_trait;

use newswire_core::{Article, Category, Region};

use crate::error::NewsError;

/// What to fetch: category or free-text query, geographic tier, language and page
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchRequest {
    pub category: Option<Category>,
    pub query: Option<String>,
    pub region: Region,
    /// ISO 639-1 language code
    pub language: String,
    /// 1-based page number
    pub page: u32,
}

impl FetchRequest {
    pub fn new(region: Region, language: &str) -> Self {
        Self {
            category: None,
            query: None,
            region,
            language: language.to_ascii_lowercase(),
            page: 1,
        }
    }

    pub fn with_category(mut self, category: Option<Category>) -> Self {
        self.category = category;
        self
    }

    pub fn with_query(mut self, query: Option<String>) -> Self {
        self.query = query.map(|q| q.trim().to_string()).filter(|q| !q.is_empty());
        self
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    /// Same request for another tier
    pub fn for_region(&self, region: Region) -> Self {
        Self {
            region,
            ..self.clone()
        }
    }

    /// Category to use when the provider needs one
    pub fn category_or_general(&self) -> Category {
        self.category.unwrap_or(Category::General)
    }
}

/// One external news source.
///
/// Adapters build the provider-specific request and normalize the payload.
/// Retries and key rotation live in [`FetchPolicy`](crate::FetchPolicy), not here.
#[async_trait]
pub trait NewsProvider: Send + Sync {
    /// Stable identifier, also the key-store lookup name
    fn id(&self) -> &str;

    fn display_name(&self) -> &str;

    /// Whether calls need a key from the rotation store
    fn requires_key(&self) -> bool {
        true
    }

    async fn fetch(
        &self,
        request: &FetchRequest,
        api_key: Option<&str>,
    ) -> Result<Vec<Article>, NewsError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builders() {
        let request = FetchRequest::new(Region::country("it"), "IT")
            .with_category(Some(Category::Sports))
            .with_query(Some("   ".to_string()))
            .with_page(0);

        assert_eq!(request.language, "it");
        assert_eq!(request.query, None);
        assert_eq!(request.page, 1);

        let global = request.for_region(Region::Global);
        assert_eq!(global.region, Region::Global);
        assert_eq!(global.category, Some(Category::Sports));
    }
}
