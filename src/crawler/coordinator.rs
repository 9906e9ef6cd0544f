//! Crawler coordinator - crawl orchestration across configured sites
//!
//! This module coordinates full crawl runs and single-page refreshes,
//! including:
//! - Replacing the stored records of configured sites
//! - Running one crawl task tree per site
//! - Recording each site's final status
//! - Coordinating single-page refreshes with a running crawl

use crate::config::Config;
use crate::crawler::fetcher::PageFetcher;
use crate::crawler::task::{CrawlTask, SiteCrawl};
use crate::crawler::visited::VisitedPaths;
use crate::indexer::IndexMaintainer;
use crate::morphology::LemmaExtractor;
use crate::state::{IndexingFlag, SiteStatus};
use crate::storage::{PageRecord, SiteRecord, Storage};
use crate::url::site_relative_path;
use crate::EngineError;
use dashmap::DashMap;
use std::any::Any;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Error recorded for sites whose crawl was stopped by the operator
pub const STOPPED_BY_USER: &str = "Indexing stopped by user";

/// Final state of one site after a crawl run
#[derive(Debug, Clone, PartialEq)]
pub struct SiteOutcome {
    pub name: String,
    pub url: String,
    pub status: SiteStatus,
    pub last_error: Option<String>,
    /// Paths claimed during the run
    pub pages: usize,
}

/// Summary of a crawl run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrawlReport {
    pub sites: Vec<SiteOutcome>,
}

impl CrawlReport {
    /// Total number of paths claimed across all sites
    pub fn total_pages(&self) -> usize {
        self.sites.iter().map(|site| site.pages).sum()
    }
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    storage: Arc<dyn Storage>,
    fetcher: PageFetcher,
    indexer: IndexMaintainer,
    /// Visited sets of site crawls in progress, keyed by site URL
    active: Arc<DashMap<String, VisitedPaths>>,
    /// Refreshes hold the read side, a crawl resetting the site the write side
    site_locks: DashMap<String, Arc<RwLock<()>>>,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The validated configuration
    /// * `storage` - The shared storage backend
    /// * `extractor` - The lemma extractor used for indexing
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(EngineError)` - Failed to build the HTTP client
    pub fn new(
        config: Config,
        storage: Arc<dyn Storage>,
        extractor: LemmaExtractor,
    ) -> Result<Self, EngineError> {
        let fetcher = PageFetcher::new(&config.indexing)?;
        let indexer = IndexMaintainer::new(Arc::clone(&storage), extractor);

        Ok(Self {
            config: Arc::new(config),
            storage,
            fetcher,
            indexer,
            active: Arc::new(DashMap::new()),
            site_locks: DashMap::new(),
        })
    }

    fn site_lock(&self, site_url: &str) -> Arc<RwLock<()>> {
        Arc::clone(self.site_locks.entry(site_url.to_string()).or_default().value())
    }

    /// Returns true while a crawl of the site is in progress
    pub fn is_crawling(&self, site_url: &str) -> bool {
        self.active.contains_key(site_url)
    }

    /// Runs a full crawl of every configured site
    ///
    /// # Run Flow
    ///
    /// 1. Wait for running refreshes of configured sites, then delete stored
    ///    sites matching a configured URL (with all their data)
    /// 2. Insert one `Indexing` record per configured site
    /// 3. Crawl every site concurrently, starting from its root page
    /// 4. Mark each site `Indexed` when its crawl completes while the flag is
    ///    still set, otherwise `Failed`
    /// 5. Clear the flag once every site finished
    ///
    /// The caller owns single-flight: set the flag with
    /// `IndexingFlag::try_begin` before calling. A cleared flag makes every
    /// task abort at once.
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlReport)` - Final status of every site
    /// * `Err(EngineError)` - Site records could not be reset
    pub async fn start_crawl(&self, flag: &IndexingFlag) -> Result<CrawlReport, EngineError> {
        let mut guards = Vec::with_capacity(self.config.sites.len());
        for entry in &self.config.sites {
            guards.push(self.site_lock(&entry.url).write_owned().await);
        }

        let sites = match self.reset_sites() {
            Ok(sites) => sites,
            Err(e) => {
                flag.finish();
                return Err(e);
            }
        };
        let sites: Vec<(SiteRecord, VisitedPaths)> = sites
            .into_iter()
            .map(|site| {
                let visited = VisitedPaths::new();
                self.active.insert(site.url.clone(), visited.clone());
                (site, visited)
            })
            .collect();
        // Refreshes queued behind the reset now see the new site records
        drop(guards);
        tracing::info!("Starting crawl of {} sites", sites.len());

        let mut handles = Vec::with_capacity(sites.len());
        for (site, visited) in sites {
            let ctx = Arc::new(SiteCrawl::new(
                site.clone(),
                Arc::clone(&self.storage),
                self.fetcher.clone(),
                self.indexer.clone(),
                visited.clone(),
                flag.clone(),
            ));
            let storage = Arc::clone(&self.storage);
            let active = Arc::clone(&self.active);
            let flag = flag.clone();

            let handle = tokio::spawn(async move {
                tracing::info!("Crawling {} ({})", ctx.site().name, ctx.site().url);
                CrawlTask::crawl(Arc::clone(&ctx), String::new()).await;

                let outcome = if flag.is_running() {
                    (SiteStatus::Indexed, None)
                } else {
                    (SiteStatus::Failed, Some(STOPPED_BY_USER.to_string()))
                };
                active.remove(&ctx.site().url);
                finish_site(storage.as_ref(), ctx.site(), outcome.0, outcome.1.as_deref());
                outcome
            });
            handles.push((site, visited, handle));
        }

        let mut report = CrawlReport::default();
        for (site, visited, handle) in handles {
            let (status, last_error) = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    let message = if e.is_panic() {
                        panic_message(e.into_panic())
                    } else {
                        e.to_string()
                    };
                    tracing::error!("Crawl of {} aborted: {}", site.url, message);
                    self.active.remove(&site.url);
                    finish_site(self.storage.as_ref(), &site, SiteStatus::Failed, Some(&message));
                    (SiteStatus::Failed, Some(message))
                }
            };

            report.sites.push(SiteOutcome {
                name: site.name,
                url: site.url,
                status,
                last_error,
                pages: visited.len(),
            });
        }

        flag.finish();
        tracing::info!(
            "Crawl finished: {} sites, {} pages",
            report.sites.len(),
            report.total_pages()
        );

        Ok(report)
    }

    /// Replaces the stored records of every configured site
    fn reset_sites(&self) -> Result<Vec<SiteRecord>, EngineError> {
        for entry in &self.config.sites {
            if let Some(existing) = self.storage.find_site_by_url(&entry.url)? {
                tracing::debug!("Deleting previous data of {}", existing.url);
                self.storage.delete_site(existing.id)?;
            }
        }

        for entry in &self.config.sites {
            self.storage
                .insert_site(&entry.name, &entry.url, SiteStatus::Indexing)?;
        }

        Ok(self
            .storage
            .find_all_sites()?
            .into_iter()
            .filter(|site| self.config.is_configured(&site.url))
            .collect())
    }

    /// Re-fetches and re-indexes a single page of a configured site
    ///
    /// # Arguments
    ///
    /// * `page_url` - Absolute URL of the page
    /// * `flag` - The process-wide indexing flag
    ///
    /// # Returns
    ///
    /// * `Ok(PageRecord)` - The page as now stored
    /// * `Err(EngineError::PageOutsideConfiguredSites)` - No configured site
    ///   owns the URL
    /// * `Err(EngineError::PageBusy)` - A running crawl already claimed the page
    pub async fn refresh_single_page(
        &self,
        page_url: &str,
        flag: &IndexingFlag,
    ) -> Result<PageRecord, EngineError> {
        let (entry, path) = self
            .config
            .sites
            .iter()
            .filter_map(|site| site_relative_path(&site.url, page_url).map(|path| (site, path)))
            .max_by_key(|(site, _)| site.url.len())
            .ok_or_else(|| EngineError::PageOutsideConfiguredSites(page_url.to_string()))?;

        // Held until the page is stored so a starting crawl cannot delete the site under us
        let _guard = self.site_lock(&entry.url).read_owned().await;

        let site = match self.storage.find_site_by_url(&entry.url)? {
            Some(site) => site,
            None => self
                .storage
                .insert_site(&entry.name, &entry.url, SiteStatus::Indexing)?,
        };

        let running = self.active.get(&entry.url).map(|visited| visited.value().clone());
        if let Some(visited) = &running {
            if !visited.claim(&path) {
                return Err(EngineError::PageBusy {
                    site: entry.url.clone(),
                    path,
                });
            }
            tracing::debug!("Refreshing {} alongside running crawl", page_url);
        }

        let ctx = SiteCrawl::new(
            site.clone(),
            Arc::clone(&self.storage),
            self.fetcher.clone(),
            self.indexer.clone(),
            running.unwrap_or_default(),
            flag.clone(),
        );
        let page = ctx.refresh_page(&path).await?;

        if !self.is_crawling(&entry.url) {
            self.storage
                .update_site_status(site.id, SiteStatus::Indexed, None)?;
        }

        Ok(page)
    }
}

fn finish_site(storage: &dyn Storage, site: &SiteRecord, status: SiteStatus, error: Option<&str>) {
    match storage.update_site_status(site.id, status, error) {
        Ok(()) => match error {
            Some(error) => tracing::warn!("Site {} {}: {}", site.url, status, error),
            None => tracing::info!("Site {} {}", site.url, status),
        },
        Err(e) => tracing::error!("Failed to record status of {}: {}", site.url, e),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "crawl task panicked".to_string()
    }
}
