//! Cache statistics tracking

use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics for cache effectiveness monitoring
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Requests for fingerprints with no cache entry
    misses: AtomicU64,
    /// Requests whose start fell inside the cached window
    overlaps: AtomicU64,
    /// Requests with an entry whose window did not overlap
    disjoints: AtomicU64,
    /// Merges applied to the store
    merges: AtomicU64,
    /// Buckets removed by post-merge pruning
    pruned_buckets: AtomicU64,
    /// Raw events received from upstream
    fetched_events: AtomicU64,
    /// Upstream pages requested
    upstream_pages: AtomicU64,
    /// Upstream fetches that failed
    upstream_errors: AtomicU64,
    /// Current number of entries
    entry_count: AtomicU64,
}

impl CacheStats {
    /// Create new cache statistics
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_overlap(&self) {
        self.overlaps.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_disjoint(&self) {
        self.disjoints.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a merge and the buckets it pruned
    pub fn record_merge(&self, pruned: u64) {
        self.merges.fetch_add(1, Ordering::Relaxed);
        self.pruned_buckets.fetch_add(pruned, Ordering::Relaxed);
    }

    /// Record a completed upstream fetch
    pub fn record_fetch(&self, pages: u64, events: u64) {
        self.upstream_pages.fetch_add(pages, Ordering::Relaxed);
        self.fetched_events.fetch_add(events, Ordering::Relaxed);
    }

    pub fn record_upstream_error(&self) {
        self.upstream_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Update entry count
    pub fn set_entry_count(&self, count: u64) {
        self.entry_count.store(count, Ordering::Relaxed);
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn overlaps(&self) -> u64 {
        self.overlaps.load(Ordering::Relaxed)
    }

    pub fn disjoints(&self) -> u64 {
        self.disjoints.load(Ordering::Relaxed)
    }

    pub fn merges(&self) -> u64 {
        self.merges.load(Ordering::Relaxed)
    }

    pub fn pruned_buckets(&self) -> u64 {
        self.pruned_buckets.load(Ordering::Relaxed)
    }

    pub fn fetched_events(&self) -> u64 {
        self.fetched_events.load(Ordering::Relaxed)
    }

    pub fn upstream_pages(&self) -> u64 {
        self.upstream_pages.load(Ordering::Relaxed)
    }

    pub fn upstream_errors(&self) -> u64 {
        self.upstream_errors.load(Ordering::Relaxed)
    }

    pub fn entry_count(&self) -> u64 {
        self.entry_count.load(Ordering::Relaxed)
    }

    /// Total resolutions (misses + overlaps + disjoints)
    pub fn total_requests(&self) -> u64 {
        self.misses() + self.overlaps() + self.disjoints()
    }

    /// Fraction of resolutions that reused cached data (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.total_requests() as f64;
        if total == 0.0 {
            0.0
        } else {
            self.overlaps() as f64 / total
        }
    }

    /// Reset all counters except the entry count
    pub fn reset(&self) {
        self.misses.store(0, Ordering::Relaxed);
        self.overlaps.store(0, Ordering::Relaxed);
        self.disjoints.store(0, Ordering::Relaxed);
        self.merges.store(0, Ordering::Relaxed);
        self.pruned_buckets.store(0, Ordering::Relaxed);
        self.fetched_events.store(0, Ordering::Relaxed);
        self.upstream_pages.store(0, Ordering::Relaxed);
        self.upstream_errors.store(0, Ordering::Relaxed);
    }
}

impl Clone for CacheStats {
    fn clone(&self) -> Self {
        Self {
            misses: AtomicU64::new(self.misses()),
            overlaps: AtomicU64::new(self.overlaps()),
            disjoints: AtomicU64::new(self.disjoints()),
            merges: AtomicU64::new(self.merges()),
            pruned_buckets: AtomicU64::new(self.pruned_buckets()),
            fetched_events: AtomicU64::new(self.fetched_events()),
            upstream_pages: AtomicU64::new(self.upstream_pages()),
            upstream_errors: AtomicU64::new(self.upstream_errors()),
            entry_count: AtomicU64::new(self.entry_count()),
        }
    }
}
