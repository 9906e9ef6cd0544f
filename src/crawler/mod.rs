//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with failure classification
//! - HTML parsing and link extraction
//! - Per-site deduplication of visited paths
//! - Recursive crawl tasks and overall crawl coordination

mod coordinator;
mod fetcher;
mod parser;
mod task;
mod visited;

pub use coordinator::{Coordinator, CrawlReport, SiteOutcome, STOPPED_BY_USER};
pub use fetcher::{
    classify_transport_error, is_supported_content_type, map_status, FetchResult, PageFetcher,
};
pub use parser::{extract_title, parse_html, ParsedPage};
pub use task::{CrawlTask, SiteCrawl, TaskOutcome};
pub use visited::VisitedPaths;
