//! Reader locale and the geographic tiers used for prioritization

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::CoreError;

/// ISO 3166-1 alpha-2 codes treated as "European" for the regional tier
/// (EU members plus EEA, UK and Switzerland)
pub const EUROPEAN_COUNTRIES: &[&str] = &[
    "AT", "BE", "BG", "HR", "CY", "CZ", "DK", "EE", "FI", "FR", "DE", "GR", "HU", "IE", "IT",
    "LV", "LT", "LU", "MT", "NL", "PL", "PT", "RO", "SK", "SI", "ES", "SE", "IS", "LI", "NO",
    "CH", "GB",
];

/// Reader locale, e.g. `it-IT`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locale {
    /// ISO 639-1 language code, lowercase
    pub language: String,
    /// ISO 3166-1 alpha-2 country code, uppercase
    pub country: String,
}

impl Locale {
    pub fn new(language: &str, country: &str) -> Self {
        Self {
            language: language.to_ascii_lowercase(),
            country: country.to_ascii_uppercase(),
        }
    }

    pub fn is_european(&self) -> bool {
        EUROPEAN_COUNTRIES.contains(&self.country.as_str())
    }

    /// Local tier for this reader
    pub fn local_region(&self) -> Region {
        Region::Country(self.country.clone())
    }
}

impl Default for Locale {
    fn default() -> Self {
        Self::new("it", "IT")
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.language, self.country)
    }
}

impl std::str::FromStr for Locale {
    type Err = CoreError;

    /// Accepts `it-IT`, `it_IT`, or a bare language (`it`, country = language)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let mut parts = trimmed.split(['-', '_']);

        let language = parts.next().unwrap_or_default();
        let country = parts.next().unwrap_or(language);

        let valid = |code: &str| code.len() == 2 && code.chars().all(|c| c.is_ascii_alphabetic());
        if !valid(language) || !valid(country) || parts.next().is_some() {
            return Err(CoreError::invalid_locale(trimmed));
        }

        Ok(Self::new(language, country))
    }
}

/// Geographic scope of a fetch, ordered local -> regional -> global
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    /// A single country (ISO 3166-1 alpha-2, uppercase)
    Country(String),
    /// Pan-European / EU coverage
    Europe,
    /// No geographic restriction
    Global,
}

impl Region {
    pub fn country(code: &str) -> Self {
        Region::Country(code.to_ascii_uppercase())
    }

    /// Lowercase country code, when the region is a single country
    pub fn country_code(&self) -> Option<String> {
        match self {
            Region::Country(code) => Some(code.to_ascii_lowercase()),
            _ => None,
        }
    }

    /// Stable key used in cache keys and logs
    pub fn as_key(&self) -> String {
        match self {
            Region::Country(code) => code.to_ascii_lowercase(),
            Region::Europe => "eu".to_string(),
            Region::Global => "global".to_string(),
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_key())
    }
}
