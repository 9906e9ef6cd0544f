//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::state::SiteStatus;
use crate::storage::{IndexEntry, LemmaRecord, PageRecord, SiteRecord};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Site not found: {0}")]
    SiteNotFound(i64),

    #[error("Page not found: {0}")]
    PageNotFound(i64),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Every method is a single atomic operation against the backend. Backends
/// must be shareable across threads; crawl tasks and index workers call into
/// the same instance concurrently.
pub trait Storage: Send + Sync {
    // ===== Sites =====

    /// Lists every site record
    fn find_all_sites(&self) -> StorageResult<Vec<SiteRecord>>;

    /// Gets a site by ID
    fn find_site(&self, site_id: i64) -> StorageResult<Option<SiteRecord>>;

    /// Gets a site by its base URL
    fn find_site_by_url(&self, url: &str) -> StorageResult<Option<SiteRecord>>;

    /// Inserts a new site record with the current time as its status time
    fn insert_site(&self, name: &str, url: &str, status: SiteStatus)
        -> StorageResult<SiteRecord>;

    /// Sets the status and last error of a site and refreshes its status time
    fn update_site_status(
        &self,
        site_id: i64,
        status: SiteStatus,
        last_error: Option<&str>,
    ) -> StorageResult<()>;

    /// Refreshes the status time of a site
    fn touch_site(&self, site_id: i64) -> StorageResult<()>;

    /// Deletes a site together with its pages, lemmas and index entries
    fn delete_site(&self, site_id: i64) -> StorageResult<()>;

    // ===== Pages =====

    /// Gets a page by site and site-relative path
    fn find_page(&self, site_id: i64, path: &str) -> StorageResult<Option<PageRecord>>;

    /// Gets a page by ID
    fn find_page_by_id(&self, page_id: i64) -> StorageResult<Option<PageRecord>>;

    /// Inserts a page, or overwrites code and content of the page already
    /// stored for `(site_id, path)`
    fn upsert_page(
        &self,
        site_id: i64,
        path: &str,
        code: i32,
        content: &str,
    ) -> StorageResult<PageRecord>;

    /// Overwrites code and content of an existing page
    fn update_page(&self, page_id: i64, code: i32, content: &str) -> StorageResult<()>;

    /// Counts pages of one site, or of all sites when `site_id` is `None`
    fn count_pages(&self, site_id: Option<i64>) -> StorageResult<u64>;

    // ===== Lemmas =====

    /// Gets the lemma row for `(site_id, lemma)`
    fn find_lemma(&self, site_id: i64, lemma: &str) -> StorageResult<Option<LemmaRecord>>;

    /// Gets a lemma by ID
    fn find_lemma_by_id(&self, lemma_id: i64) -> StorageResult<Option<LemmaRecord>>;

    /// Inserts a new lemma row
    ///
    /// Fails with `StorageError::ConstraintViolation` if the lemma already
    /// exists for the site.
    fn insert_lemma(&self, site_id: i64, lemma: &str, frequency: i64)
        -> StorageResult<LemmaRecord>;

    /// Atomically adds `delta` (possibly negative) to a lemma's frequency
    fn adjust_lemma_frequency(&self, lemma_id: i64, delta: i64) -> StorageResult<()>;

    /// Counts lemmas of one site, or of all sites when `site_id` is `None`
    fn count_lemmas(&self, site_id: Option<i64>) -> StorageResult<u64>;

    // ===== Index entries =====

    /// Lists the index entries of a page
    fn find_entries_by_page(&self, page_id: i64) -> StorageResult<Vec<IndexEntry>>;

    /// Lists the index entries of a lemma
    fn find_entries_by_lemma(&self, lemma_id: i64) -> StorageResult<Vec<IndexEntry>>;

    /// Gets the index entry for `(page_id, lemma_id)`
    fn find_entry(&self, page_id: i64, lemma_id: i64) -> StorageResult<Option<IndexEntry>>;

    /// Creates the entry for `(page_id, lemma_id)` or adds `occurrences` to it
    fn upsert_entry(&self, page_id: i64, lemma_id: i64, occurrences: i64) -> StorageResult<()>;

    /// Deletes every index entry of a page, returning how many were removed
    fn delete_entries_by_page(&self, page_id: i64) -> StorageResult<u64>;

    // ===== Composite index mutations =====

    /// Adds `occurrences` to an existing lemma's frequency and to its entry
    /// for the page, as one atomic mutation
    fn attach_lemma(&self, page_id: i64, lemma_id: i64, occurrences: i64) -> StorageResult<()>;

    /// Inserts a new lemma with frequency `occurrences` together with its
    /// entry for the page, as one atomic mutation
    ///
    /// Fails with `StorageError::ConstraintViolation` if another writer
    /// inserted the lemma first.
    fn insert_lemma_with_entry(
        &self,
        site_id: i64,
        page_id: i64,
        lemma: &str,
        occurrences: i64,
    ) -> StorageResult<LemmaRecord>;

    /// Subtracts each of the page's entry occurrences from its lemma's
    /// frequency and deletes the page's entries, as one atomic mutation
    ///
    /// Returns the entries that were removed.
    fn retract_page(&self, page_id: i64) -> StorageResult<Vec<IndexEntry>>;
}
