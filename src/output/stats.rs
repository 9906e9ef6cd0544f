//! Statistics generation from the index database
//!
//! This module provides functionality for extracting and displaying
//! per-site indexing statistics from the storage layer.

use crate::state::SiteStatus;
use crate::storage::Storage;
use crate::EngineError;

/// Totals across all sites
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TotalStatistics {
    pub sites: u64,
    pub pages: u64,
    pub lemmas: u64,
    /// True while a crawl run is in progress
    pub indexing: bool,
}

/// Statistics of one stored site
#[derive(Debug, Clone, PartialEq)]
pub struct SiteStatistics {
    pub url: String,
    pub name: String,
    pub status: SiteStatus,
    pub status_time: String,
    pub error: Option<String>,
    pub pages: u64,
    pub lemmas: u64,
}

/// Index statistics summary
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statistics {
    pub total: TotalStatistics,
    pub sites: Vec<SiteStatistics>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
/// * `indexing` - Whether a crawl run is currently in progress
///
/// # Returns
///
/// * `Ok(Statistics)` - Successfully loaded statistics
/// * `Err(EngineError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage, indexing: bool) -> Result<Statistics, EngineError> {
    let mut sites = Vec::new();
    for site in storage.find_all_sites()? {
        sites.push(SiteStatistics {
            pages: storage.count_pages(Some(site.id))?,
            lemmas: storage.count_lemmas(Some(site.id))?,
            url: site.url,
            name: site.name,
            status: site.status,
            status_time: site.status_time,
            error: site.last_error,
        });
    }

    Ok(Statistics {
        total: TotalStatistics {
            sites: sites.len() as u64,
            pages: storage.count_pages(None)?,
            lemmas: storage.count_lemmas(None)?,
            indexing,
        },
        sites,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &Statistics) {
    println!("=== Index Statistics ===\n");

    println!("Overview:");
    println!("  Sites: {}", stats.total.sites);
    println!("  Pages: {}", stats.total.pages);
    println!("  Lemmas: {}", stats.total.lemmas);
    println!(
        "  Indexing: {}",
        if stats.total.indexing { "running" } else { "idle" }
    );
    println!();

    for site in &stats.sites {
        println!("{} ({})", site.name, site.url);
        println!("  Status: {} since {}", site.status, site.status_time);
        println!("  Pages: {}", site.pages);
        println!("  Lemmas: {}", site.lemmas);
        if let Some(error) = &site.error {
            println!("  Error: {}", error);
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStorage;

    #[test]
    fn test_load_statistics() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        let first = storage
            .insert_site("First", "https://first.ru", SiteStatus::Indexed)
            .unwrap();
        let second = storage
            .insert_site("Second", "https://second.ru", SiteStatus::Indexing)
            .unwrap();
        storage
            .update_site_status(second.id, SiteStatus::Failed, Some("Indexing stopped by user"))
            .unwrap();

        let page = storage.upsert_page(first.id, "", 200, "<body>дом</body>").unwrap();
        storage.upsert_page(first.id, "/missing", 404, "").unwrap();
        storage.insert_lemma_with_entry(first.id, page.id, "дом", 1).unwrap();

        let stats = load_statistics(&storage, false).unwrap();

        assert_eq!(stats.total.sites, 2);
        assert_eq!(stats.total.pages, 2);
        assert_eq!(stats.total.lemmas, 1);
        assert!(!stats.total.indexing);

        assert_eq!(stats.sites[0].name, "First");
        assert_eq!(stats.sites[0].pages, 2);
        assert_eq!(stats.sites[0].lemmas, 1);
        assert_eq!(stats.sites[1].status, SiteStatus::Failed);
        assert_eq!(stats.sites[1].error.as_deref(), Some("Indexing stopped by user"));
        assert_eq!(stats.sites[1].pages, 0);
    }

    #[test]
    fn test_empty_database() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        let stats = load_statistics(&storage, true).unwrap();
        assert_eq!(stats.total.sites, 0);
        assert!(stats.total.indexing);
        assert!(stats.sites.is_empty());
    }
}
