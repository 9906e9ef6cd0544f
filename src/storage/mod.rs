//! Storage module for persisting sites, pages and the inverted index
//!
//! This module handles all database operations for the engine, including:
//! - SQLite database initialization and schema management
//! - Site and page record persistence
//! - Lemma rows with their frequency counters
//! - Index entries linking pages to lemmas with occurrence counts

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::state::SiteStatus;
use crate::EngineError;

use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(EngineError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, EngineError> {
    Ok(SqliteStorage::new(path)?)
}

/// Represents a configured site in the database
#[derive(Debug, Clone, PartialEq)]
pub struct SiteRecord {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub status: SiteStatus,
    pub last_error: Option<String>,
    pub status_time: String,
}

/// Represents a fetched page
///
/// `code` holds the HTTP status, or a mapped code for transport failures
/// (`-1` when nothing more specific applies). Failed pages have empty content.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRecord {
    pub id: i64,
    pub site_id: i64,
    pub path: String,
    pub code: i32,
    pub content: String,
}

/// Represents a lemma known to a site
#[derive(Debug, Clone, PartialEq)]
pub struct LemmaRecord {
    pub id: i64,
    pub site_id: i64,
    pub lemma: String,
    pub frequency: i64,
}

/// Represents the occurrences of one lemma on one page
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub id: i64,
    pub page_id: i64,
    pub lemma_id: i64,
    pub occurrences: i64,
}
