//! Recursive crawl of one site
//!
//! Each discovered page is handled by its own task:
//!
//! ```text
//! Start -> Fetched -> LinksExtracted -> Persisted -> Done
//! Start -> Failed
//! any state -> Aborted (indexing flag cleared)
//! ```
//!
//! A task claims its path before fetching and spawns one task per unseen
//! child link once the page is persisted, then waits for all of them.

use crate::crawler::fetcher::{FetchResult, PageFetcher, UNKNOWN_FAILURE};
use crate::crawler::parser::{parse_html, ParsedPage};
use crate::crawler::visited::VisitedPaths;
use crate::indexer::IndexMaintainer;
use crate::state::IndexingFlag;
use crate::storage::{PageRecord, SiteRecord, Storage};
use crate::url::page_url;
use crate::EngineError;
use futures::future::{join_all, BoxFuture, FutureExt};
use std::sync::Arc;

/// How a crawl task ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The path was already claimed or the indexing flag was cleared
    Aborted,
    /// The page was stored with a failure code
    Failed { code: i32 },
    /// The page was stored and indexed, and `children` child tasks ran
    Done { children: usize },
}

/// A fetched and parsed page
struct FetchedPage {
    code: i32,
    parsed: ParsedPage,
}

/// Everything the tasks of one site crawl share
pub struct SiteCrawl {
    site: SiteRecord,
    storage: Arc<dyn Storage>,
    fetcher: PageFetcher,
    indexer: IndexMaintainer,
    visited: VisitedPaths,
    flag: IndexingFlag,
}

impl SiteCrawl {
    pub fn new(
        site: SiteRecord,
        storage: Arc<dyn Storage>,
        fetcher: PageFetcher,
        indexer: IndexMaintainer,
        visited: VisitedPaths,
        flag: IndexingFlag,
    ) -> Self {
        Self {
            site,
            storage,
            fetcher,
            indexer,
            visited,
            flag,
        }
    }

    pub fn site(&self) -> &SiteRecord {
        &self.site
    }

    pub fn visited(&self) -> &VisitedPaths {
        &self.visited
    }

    /// Fetches a path of the site and extracts its content and links
    async fn fetch_page(&self, path: &str) -> Result<FetchedPage, (i32, String)> {
        let url = page_url(&self.site.url, path);

        match self.fetcher.fetch(&url).await {
            FetchResult::Success {
                status_code, body, ..
            } => {
                let parsed = parse_html(&body).map_err(|reason| (UNKNOWN_FAILURE, reason))?;
                Ok(FetchedPage {
                    code: i32::from(status_code),
                    parsed,
                })
            }
            FetchResult::Failure { code, reason } => Err((code, reason)),
        }
    }

    /// Stores a page that failed to fetch, with empty content
    fn persist_failure(&self, path: &str, code: i32, reason: &str) {
        tracing::warn!(
            "Failed to fetch {}{}: {} (code {})",
            self.site.url,
            path,
            reason,
            code
        );

        if let Err(e) = self.storage.upsert_page(self.site.id, path, code, "") {
            tracing::error!("Failed to store page {}{}: {}", self.site.url, path, e);
        }
        self.touch_site();
    }

    fn touch_site(&self) {
        if let Err(e) = self.storage.touch_site(self.site.id) {
            tracing::error!("Failed to update status time of {}: {}", self.site.url, e);
        }
    }

    /// Re-fetches one path of the site and updates the stored page and index
    ///
    /// Does not recurse into links. A failed fetch of an already stored page
    /// replaces its content with nothing and retracts its index entries.
    ///
    /// # Arguments
    ///
    /// * `path` - The site-relative path to refresh
    ///
    /// # Returns
    ///
    /// * `Ok(PageRecord)` - The page as now stored
    /// * `Err(EngineError)` - A storage or index operation failed
    pub async fn refresh_page(&self, path: &str) -> Result<PageRecord, EngineError> {
        let existing = self.storage.find_page(self.site.id, path)?;
        let fetched = self.fetch_page(path).await;

        let page = match (fetched, existing) {
            (Ok(fetched), Some(existing)) => {
                let content = fetched.parsed.content;
                self.storage.update_page(existing.id, fetched.code, &content)?;
                let page = PageRecord {
                    code: fetched.code,
                    content,
                    ..existing
                };
                self.indexer.refresh_index(&page.content, &page).await?;
                page
            }
            (Ok(fetched), None) => {
                let page = self.storage.upsert_page(
                    self.site.id,
                    path,
                    fetched.code,
                    &fetched.parsed.content,
                )?;
                self.indexer.index_page(&page.content, &page).await?;
                page
            }
            (Err((code, reason)), Some(existing)) => {
                tracing::warn!(
                    "Refresh of {}{} failed: {} (code {})",
                    self.site.url,
                    path,
                    reason,
                    code
                );
                self.storage.update_page(existing.id, code, "")?;
                let page = PageRecord {
                    code,
                    content: String::new(),
                    ..existing
                };
                self.indexer.retract(&page).await?;
                page
            }
            (Err((code, reason)), None) => {
                tracing::warn!(
                    "Refresh of {}{} failed: {} (code {})",
                    self.site.url,
                    path,
                    reason,
                    code
                );
                self.storage.upsert_page(self.site.id, path, code, "")?
            }
        };

        self.storage.touch_site(self.site.id)?;
        tracing::info!("Refreshed {}{} (code {})", self.site.url, path, page.code);

        Ok(page)
    }
}

/// Entry point for crawl tasks
pub struct CrawlTask;

impl CrawlTask {
    /// Crawls a path and, recursively, every unseen page it links to
    ///
    /// The returned future is boxed so that tasks can spawn tasks of their
    /// own kind.
    pub fn crawl(ctx: Arc<SiteCrawl>, path: String) -> BoxFuture<'static, TaskOutcome> {
        async move {
            if !ctx.flag.is_running() || !ctx.visited.claim(&path) {
                return TaskOutcome::Aborted;
            }

            let fetched = match ctx.fetch_page(&path).await {
                Ok(fetched) => fetched,
                Err((code, reason)) => {
                    if !ctx.flag.is_running() {
                        return TaskOutcome::Aborted;
                    }
                    ctx.persist_failure(&path, code, &reason);
                    return TaskOutcome::Failed { code };
                }
            };

            if !ctx.flag.is_running() {
                return TaskOutcome::Aborted;
            }

            let page = match ctx.storage.upsert_page(
                ctx.site.id,
                &path,
                fetched.code,
                &fetched.parsed.content,
            ) {
                Ok(page) => page,
                Err(e) => {
                    tracing::error!("Failed to store page {}{}: {}", ctx.site.url, path, e);
                    return TaskOutcome::Failed {
                        code: fetched.code,
                    };
                }
            };
            ctx.touch_site();
            tracing::debug!("Stored {}{} (code {})", ctx.site.url, path, page.code);

            if let Err(e) = ctx.indexer.index_page(&page.content, &page).await {
                tracing::error!("Failed to index {}{}: {}", ctx.site.url, path, e);
            }

            let children: Vec<String> = fetched
                .parsed
                .links
                .into_iter()
                .filter(|link| !ctx.visited.contains(link))
                .collect();

            if children.is_empty() || !ctx.flag.is_running() {
                return TaskOutcome::Done { children: 0 };
            }

            let handles: Vec<_> = children
                .into_iter()
                .map(|child| tokio::spawn(CrawlTask::crawl(Arc::clone(&ctx), child)))
                .collect();
            let spawned = handles.len();

            for joined in join_all(handles).await {
                if let Err(e) = joined {
                    tracing::error!("Crawl task of {} panicked: {}", ctx.site.url, e);
                }
            }

            TaskOutcome::Done { children: spawned }
        }
        .boxed()
    }
}
