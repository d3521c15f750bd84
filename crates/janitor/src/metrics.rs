use std::sync::atomic::{AtomicU64, Ordering};

/// Running totals for everything the janitor removed or failed to do.
#[derive(Debug, Default)]
pub struct JanitorMetrics {
    pub uploads_removed: AtomicU64,
    pub dead_dumps_removed: AtomicU64,
    pub evicted_bundles_removed: AtomicU64,
    /// Sub-task runs that ended in an error.
    pub errors: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JanitorMetricsSnapshot {
    pub uploads_removed: u64,
    pub dead_dumps_removed: u64,
    pub evicted_bundles_removed: u64,
    pub errors: u64,
}

impl JanitorMetrics {
    pub fn snapshot(&self) -> JanitorMetricsSnapshot {
        JanitorMetricsSnapshot {
            uploads_removed: self.uploads_removed.load(Ordering::Relaxed),
            dead_dumps_removed: self.dead_dumps_removed.load(Ordering::Relaxed),
            evicted_bundles_removed: self.evicted_bundles_removed.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }
}
