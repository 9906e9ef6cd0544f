//! Incremental inverted-index maintenance
//!
//! Indexing a page adds each of its lemma counts to the site-wide lemma
//! frequency and to the page's index entry. Refreshing a page first retracts
//! what the page contributed before, so a lemma's frequency always equals the
//! sum of its entries' occurrences.

use crate::morphology::LemmaExtractor;
use crate::storage::{PageRecord, Storage, StorageError};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;

/// Errors raised while maintaining the index
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Index worker failed: {0}")]
    Worker(String),
}

/// What an index pass wrote for one page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexSummary {
    /// Distinct lemmas on the page
    pub lemmas: usize,
    /// Total indexed tokens on the page
    pub occurrences: u64,
}

/// Keeps lemma rows and index entries in step with stored pages
#[derive(Clone)]
pub struct IndexMaintainer {
    storage: Arc<dyn Storage>,
    extractor: LemmaExtractor,
}

impl IndexMaintainer {
    pub fn new(storage: Arc<dyn Storage>, extractor: LemmaExtractor) -> Self {
        Self { storage, extractor }
    }

    /// Indexes a page that has no index entries yet
    ///
    /// # Arguments
    ///
    /// * `content` - The page markup
    /// * `page` - The stored page record
    ///
    /// # Returns
    ///
    /// * `Ok(IndexSummary)` - Lemma and token counts written for the page
    /// * `Err(IndexError)` - A storage operation failed
    pub async fn index_page(
        &self,
        content: &str,
        page: &PageRecord,
    ) -> Result<IndexSummary, IndexError> {
        let extractor = self.extractor.clone();
        let content = content.to_string();
        let lemmas = tokio::task::spawn_blocking(move || extractor.extract_lemmas(&content))
            .await
            .map_err(|e| IndexError::Worker(e.to_string()))?;

        let summary = IndexSummary {
            lemmas: lemmas.len(),
            occurrences: lemmas.values().map(|count| u64::from(*count)).sum(),
        };

        let mut workers = JoinSet::new();
        for (lemma, count) in lemmas {
            let storage = Arc::clone(&self.storage);
            let site_id = page.site_id;
            let page_id = page.id;
            workers.spawn_blocking(move || {
                upsert_lemma(storage.as_ref(), site_id, page_id, &lemma, i64::from(count))
            });
        }

        let mut first_error = None;
        while let Some(joined) = workers.join_next().await {
            let result = match joined {
                Ok(result) => result.map_err(IndexError::from),
                Err(e) => Err(IndexError::Worker(e.to_string())),
            };
            if let Err(e) = result {
                tracing::error!("Failed to index page {}: {}", page.path, e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                tracing::debug!(
                    "Indexed {} ({} lemmas, {} tokens)",
                    page.path,
                    summary.lemmas,
                    summary.occurrences
                );
                Ok(summary)
            }
        }
    }

    /// Re-indexes a page whose content changed
    ///
    /// The page's previous contribution is retracted first, so refreshing
    /// with unchanged content leaves every frequency and entry as it was.
    pub async fn refresh_index(
        &self,
        content: &str,
        page: &PageRecord,
    ) -> Result<IndexSummary, IndexError> {
        self.retract(page).await?;
        self.index_page(content, page).await
    }

    /// Removes a page's contribution to the index
    pub async fn retract(&self, page: &PageRecord) -> Result<usize, IndexError> {
        let storage = Arc::clone(&self.storage);
        let page_id = page.id;
        let removed = tokio::task::spawn_blocking(move || storage.retract_page(page_id))
            .await
            .map_err(|e| IndexError::Worker(e.to_string()))??;

        if !removed.is_empty() {
            tracing::debug!("Retracted {} index entries of {}", removed.len(), page.path);
        }
        Ok(removed.len())
    }
}

/// Adds one lemma count of a page to the index
///
/// A concurrent insert of the same lemma surfaces as a constraint violation;
/// the lookup is then repeated and finds the winner's row.
fn upsert_lemma(
    storage: &dyn Storage,
    site_id: i64,
    page_id: i64,
    lemma: &str,
    count: i64,
) -> Result<(), StorageError> {
    loop {
        if let Some(existing) = storage.find_lemma(site_id, lemma)? {
            return storage.attach_lemma(page_id, existing.id, count);
        }

        match storage.insert_lemma_with_entry(site_id, page_id, lemma, count) {
            Ok(_) => return Ok(()),
            Err(StorageError::ConstraintViolation(_)) => {
                tracing::debug!("Lemma {:?} inserted concurrently, retrying", lemma);
            }
            Err(e) => return Err(e),
        }
    }
}
