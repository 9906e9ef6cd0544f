//! State module for tracking indexing progress
//!
//! # Components
//!
//! - `SiteStatus`: Lifecycle of a site record (indexing, indexed, failed)
//! - `IndexingFlag`: Process-wide cooperative stop signal for crawl runs

mod control;
mod site_status;

// Re-export main types
pub use control::IndexingFlag;
pub use site_status::SiteStatus;
