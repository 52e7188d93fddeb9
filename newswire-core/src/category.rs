//! News categories shared by providers, the source table and ranking

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::CoreError;

/// Editorial category of an article or a fetch request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    General,
    World,
    Politics,
    Business,
    Technology,
    Science,
    Health,
    Sports,
    Entertainment,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::General,
        Category::World,
        Category::Politics,
        Category::Business,
        Category::Technology,
        Category::Science,
        Category::Health,
        Category::Sports,
        Category::Entertainment,
    ];

    /// Lowercase identifier used in URLs, cache keys and provider requests
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::General => "general",
            Category::World => "world",
            Category::Politics => "politics",
            Category::Business => "business",
            Category::Technology => "technology",
            Category::Science => "science",
            Category::Health => "health",
            Category::Sports => "sports",
            Category::Entertainment => "entertainment",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Category::General => "Top Stories",
            Category::World => "World",
            Category::Politics => "Politics",
            Category::Business => "Business",
            Category::Technology => "Technology",
            Category::Science => "Science",
            Category::Health => "Health",
            Category::Sports => "Sports",
            Category::Entertainment => "Entertainment",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "general" | "top" | "headlines" => Ok(Category::General),
            "world" | "international" => Ok(Category::World),
            "politics" => Ok(Category::Politics),
            "business" | "economy" | "finance" => Ok(Category::Business),
            "technology" | "tech" => Ok(Category::Technology),
            "science" => Ok(Category::Science),
            "health" => Ok(Category::Health),
            "sports" | "sport" => Ok(Category::Sports),
            "entertainment" | "culture" => Ok(Category::Entertainment),
            _ => Err(CoreError::unknown_category(s)),
        }
    }
}
