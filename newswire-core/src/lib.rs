//! Core types for the Newswire news aggregator
//!
//! This crate defines the shared data structures used across the workspace:
//! the canonical article model, categories, locales and the reader's
//! preference profile.

pub mod article;
pub mod category;
pub mod error;
pub mod locale;
pub mod preferences;

pub use article::{Article, ArticleSource, DATE_INFERRED_KEY};
pub use category::Category;
pub use error::CoreError;
pub use locale::{Locale, Region, EUROPEAN_COUNTRIES};
pub use preferences::{TrackingEvent, UserPreferenceProfile};
