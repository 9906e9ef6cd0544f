//! Cooperative stop signal shared by every task of a crawl run

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Process-wide indexing flag
///
/// While the flag is set a crawl run is in progress and its tasks keep
/// working. Clearing it is the only way to stop a run: every crawl task reads
/// the flag before fetching, before persisting and before spawning children.
/// Cloning yields another handle to the same flag.
#[derive(Debug, Clone, Default)]
pub struct IndexingFlag {
    running: Arc<AtomicBool>,
}

impl IndexingFlag {
    /// Creates a cleared flag (no run in progress)
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a flag that is already set, as if a run had just begun
    pub fn running() -> Self {
        let flag = Self::new();
        flag.running.store(true, Ordering::SeqCst);
        flag
    }

    /// Atomically marks a run as started
    ///
    /// Returns false if a run is already in progress, which keeps crawl runs
    /// single-flight per process.
    pub fn try_begin(&self) -> bool {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Returns true while a run is in progress and has not been stopped
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Requests that the current run stop at its next guard point
    ///
    /// Returns false if no run was in progress.
    pub fn stop(&self) -> bool {
        self.running.swap(false, Ordering::SeqCst)
    }

    /// Signals that the run finished
    pub fn finish(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_flight() {
        let flag = IndexingFlag::new();
        assert!(!flag.is_running());
        assert!(flag.try_begin());
        assert!(!flag.try_begin());
        assert!(flag.is_running());

        flag.finish();
        assert!(flag.try_begin());
    }

    #[test]
    fn test_stop_is_visible_through_clones() {
        let flag = IndexingFlag::running();
        let handle = flag.clone();

        assert!(handle.stop());
        assert!(!flag.is_running());
        assert!(!handle.stop());
    }
}
