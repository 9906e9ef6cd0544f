//! Lemma-Search: a site crawler with a lemma-based inverted index
//!
//! This crate crawls a configured set of web sites, reduces page text to
//! normalized Russian lemmas, keeps an incrementally maintained inverted index
//! of lemma occurrences per page, and answers conjunctive free-text queries
//! ranked by relevance with highlighted snippets.

pub mod config;
pub mod crawler;
pub mod indexer;
pub mod morphology;
pub mod output;
pub mod search;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Lemma-Search operations
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Morphology error: {0}")]
    Morphology(#[from] morphology::MorphologyError),

    #[error("Index error: {0}")]
    Index(#[from] indexer::IndexError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Page {0} does not belong to any configured site")]
    PageOutsideConfiguredSites(String),

    #[error("Page {path} of {site} is being indexed by a running crawl")]
    PageBusy { site: String, path: String },
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL: {0}")]
    MissingHost(String),
}

/// Result type alias for Lemma-Search operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::Coordinator;
pub use indexer::IndexMaintainer;
pub use morphology::{DictionaryMorphology, LemmaExtractor, Morphology};
pub use search::{SearchEngine, SearchQuery, SearchResponse};
pub use state::{IndexingFlag, SiteStatus};
pub use storage::{SqliteStorage, Storage};
