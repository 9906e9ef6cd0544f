//! Per-site record of claimed page paths

use dashmap::DashSet;
use std::sync::Arc;

/// Paths claimed by one site crawl
///
/// A path is claimed before it is fetched, so two tasks discovering the same
/// link never both fetch it. Cloning shares the set.
#[derive(Debug, Clone, Default)]
pub struct VisitedPaths {
    paths: Arc<DashSet<String>>,
}

impl VisitedPaths {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims a path for fetching
    ///
    /// Returns true for exactly one caller per path.
    pub fn claim(&self, path: &str) -> bool {
        self.paths.insert(path.to_string())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}
