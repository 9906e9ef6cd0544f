//! Search request, response and error types

use crate::storage::StorageError;
use thiserror::Error;

/// Errors returned by a search
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Empty search query")]
    EmptyQuery,

    #[error("Site not found: {0}")]
    SiteNotFound(String),

    #[error("Indexing of {0} is not finished")]
    IndexingNotFinished(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// A search request
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    /// Free-text query
    pub query: String,
    /// Base URL of the only site to search, or `None` for all sites
    pub site: Option<String>,
    /// Zero-based page number
    pub offset: usize,
    /// Page size; the configured default applies when `None`
    pub limit: Option<usize>,
}

impl SearchQuery {
    /// Creates a query over all sites, first page, default page size
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            site: None,
            offset: 0,
            limit: None,
        }
    }

    pub fn site(mut self, site: impl Into<String>) -> Self {
        self.site = Some(site.into());
        self
    }

    pub fn page(mut self, offset: usize, limit: usize) -> Self {
        self.offset = offset;
        self.limit = Some(limit);
        self
    }

    /// Position of the first result of the requested page among all results
    pub fn first_row(&self, default_limit: usize) -> usize {
        self.offset.saturating_mul(self.limit.unwrap_or(default_limit))
    }
}

/// One matching sentence of a page
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    /// Base URL of the site
    pub site: String,
    pub site_name: String,
    /// Site-relative path of the page
    pub uri: String,
    pub title: String,
    /// The sentence with every matched word wrapped in `<b>...</b>`
    pub snippet: String,
    /// Relative relevance of the page
    pub relevance: f64,
    /// Number of words in the sentence that matched a query lemma
    pub words_found: usize,
}

/// A page of search results
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResponse {
    /// Number of results before pagination
    pub count: usize,
    pub data: Vec<SearchResult>,
}
