//! Output module for reporting crawl, search and index results
//!
//! This module handles:
//! - Collecting and printing index statistics
//! - Printing crawl run summaries
//! - Printing search result pages

pub mod stats;

pub use stats::{load_statistics, print_statistics, SiteStatistics, Statistics, TotalStatistics};

use crate::crawler::CrawlReport;
use crate::search::SearchResponse;
use chrono::{DateTime, Utc};

/// Prints the summary of a finished crawl run
///
/// # Arguments
///
/// * `report` - The final status of every site
/// * `started_at` - When the run started
pub fn print_crawl_report(report: &CrawlReport, started_at: DateTime<Utc>) {
    let duration = Utc::now() - started_at;

    println!("=== Crawl Summary ===\n");
    println!("Started: {}", started_at.to_rfc3339());
    println!("Duration: {}s", duration.num_seconds());
    println!("Pages visited: {}", report.total_pages());
    println!();

    for site in &report.sites {
        match &site.last_error {
            Some(error) => println!(
                "  {} ({}): {} after {} pages - {}",
                site.name, site.url, site.status, site.pages, error
            ),
            None => println!(
                "  {} ({}): {} ({} pages)",
                site.name, site.url, site.status, site.pages
            ),
        }
    }
}

/// Prints one page of search results
pub fn print_search_response(response: &SearchResponse, offset: usize) {
    println!("Found {} results\n", response.count);

    for (index, result) in response.data.iter().enumerate() {
        println!(
            "{}. {} - {}{}",
            offset + index + 1,
            result.title,
            result.site,
            result.uri
        );
        println!(
            "   relevance {:.3}, {} words: {}",
            result.relevance, result.words_found, result.snippet
        );
    }
}
