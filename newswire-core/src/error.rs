//! Error types for the core model

use thiserror::Error;

/// Errors raised while constructing core values
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid locale: {0}")]
    InvalidLocale(String),

    #[error("Article title must not be empty")]
    EmptyTitle,

    #[error("Unknown category: {0}")]
    UnknownCategory(String),
}

impl CoreError {
    pub fn invalid_locale(value: impl Into<String>) -> Self {
        CoreError::InvalidLocale(value.into())
    }

    pub fn unknown_category(value: impl Into<String>) -> Self {
        CoreError::UnknownCategory(value.into())
    }
}
