//! Dispatch counters.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// A snapshot of the router's dispatch counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    /// Events a pipeline processed successfully.
    pub processed: u64,
    /// Events whose pipeline failed or panicked.
    pub failed: u64,
    /// Events no entry matched.
    pub unmatched: u64,
    /// Events dequeued after the router stopped.
    pub discarded: u64,
    /// Test requests that produced an output.
    pub tests_completed: u64,
    /// Test requests that resolved with an error.
    pub tests_failed: u64,
    /// Test requests cancelled by shutdown.
    pub tests_cancelled: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) processed: AtomicU64,
    pub(crate) failed: AtomicU64,
    pub(crate) unmatched: AtomicU64,
    pub(crate) discarded: AtomicU64,
    pub(crate) tests_completed: AtomicU64,
    pub(crate) tests_failed: AtomicU64,
    pub(crate) tests_cancelled: AtomicU64,
}

/// Increment a counter.
pub(crate) fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl Counters {
    pub(crate) fn snapshot(&self) -> DispatchStats {
        let read = |c: &AtomicU64| c.load(Ordering::Relaxed);
        DispatchStats {
            processed: read(&self.processed),
            failed: read(&self.failed),
            unmatched: read(&self.unmatched),
            discarded: read(&self.discarded),
            tests_completed: read(&self.tests_completed),
            tests_failed: read(&self.tests_failed),
            tests_cancelled: read(&self.tests_cancelled),
        }
    }
}
