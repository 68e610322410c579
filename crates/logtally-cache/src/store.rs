//! Fingerprint-keyed cache store

use crate::config::CacheConfig;
use crate::entry::CacheEntry;
use crate::stats::CacheStats;
use ahash::AHashMap;
use dashmap::DashMap;
use logtally_core::{Fingerprint, MinuteCount, TimeRange};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

/// Thread-safe mapping from query fingerprint to cache entry.
///
/// `get` and `set` are individually atomic. A read-modify-write of one
/// fingerprint must run inside [`CacheStore::with_fingerprint_lock`], which
/// serializes mutation per fingerprint while leaving other fingerprints
/// free to proceed.
pub struct CacheStore {
    entries: RwLock<AHashMap<Fingerprint, CacheEntry>>,
    /// Lock registry, one mutex per fingerprint ever touched
    locks: DashMap<Fingerprint, Arc<Mutex<()>>>,
    config: CacheConfig,
    stats: Arc<CacheStats>,
}

impl CacheStore {
    /// Create a new store with the given configuration
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: RwLock::new(AHashMap::new()),
            locks: DashMap::new(),
            config,
            stats: Arc::new(CacheStats::new()),
        }
    }

    /// Create a store with default configuration
    pub fn with_defaults() -> Self {
        Self::new(CacheConfig::default())
    }

    /// Check if caching is enabled
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Look up an entry. Never creates one.
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<CacheEntry> {
        self.entries.read().get(fingerprint).cloned()
    }

    /// Insert or replace the entry for a fingerprint
    pub fn set(&self, fingerprint: Fingerprint, entry: CacheEntry) {
        let entry_count = {
            let mut entries = self.entries.write();
            entries.insert(fingerprint, entry);
            entries.len() as u64
        };
        self.stats.set_entry_count(entry_count);
    }

    /// Run `f` while holding the mutation lock for `fingerprint`.
    ///
    /// The lock is synchronous; `f` must not block on I/O.
    pub fn with_fingerprint_lock<R>(&self, fingerprint: &Fingerprint, f: impl FnOnce() -> R) -> R {
        let lock = self
            .locks
            .entry(fingerprint.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock();
        f()
    }

    /// Ascending counts for `range`, if the cached window covers all of it.
    ///
    /// Returns `None` when the fingerprint is absent or its validity window
    /// does not span `range`, since missing buckets could not then be read
    /// as zero counts.
    pub fn extract_window(
        &self,
        fingerprint: &Fingerprint,
        range: TimeRange,
    ) -> Option<Vec<MinuteCount>> {
        let entries = self.entries.read();
        let entry = entries.get(fingerprint)?;
        if entry.start_time > range.start || entry.end_time < range.end {
            return None;
        }
        Some(entry.series.range(range).collect())
    }

    /// Remove the entry for a fingerprint, and its lock unless a caller
    /// still holds it
    pub fn invalidate(&self, fingerprint: &Fingerprint) -> bool {
        let (removed, entry_count) = {
            let mut entries = self.entries.write();
            let removed = entries.remove(fingerprint).is_some();
            (removed, entries.len() as u64)
        };
        self.locks
            .remove_if(fingerprint, |_, lock| Arc::strong_count(lock) == 1);
        self.stats.set_entry_count(entry_count);
        removed
    }

    /// Drop every entry and every idle lock
    pub fn clear(&self) {
        self.entries.write().clear();
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        self.stats.set_entry_count(0);
    }

    /// Fingerprints currently cached, sorted
    pub fn fingerprints(&self) -> Vec<Fingerprint> {
        let mut keys: Vec<_> = self.entries.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Get cache statistics
    pub fn stats(&self) -> Arc<CacheStats> {
        Arc::clone(&self.stats)
    }

    /// Get current number of entries
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Get the cache configuration
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("enabled", &self.config.enabled)
            .field("safety_margin_minutes", &self.config.safety_margin_minutes)
            .field("current_entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use logtally_core::Timestamp;
    use std::thread;

    fn ts(m: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2024, 3, 1, 10, m, 0).unwrap()
    }

    fn entry_with(query: &str, counts: &[(u32, u64)]) -> CacheEntry {
        let mut entry = CacheEntry::new(Fingerprint::new(query), TimeRange::new(ts(0), ts(30)));
        for (m, n) in counts {
            entry.series.set_count(ts(*m), *n);
        }
        entry
    }

    #[test]
    fn test_get_does_not_create() {
        let store = CacheStore::with_defaults();
        let fingerprint = Fingerprint::new("errors");

        assert!(store.get(&fingerprint).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_set_replaces_wholesale() {
        let store = CacheStore::with_defaults();
        let fingerprint = Fingerprint::new("errors");

        store.set(fingerprint.clone(), entry_with("errors", &[(1, 5), (2, 6)]));
        store.set(fingerprint.clone(), entry_with("errors", &[(3, 1)]));

        let entry = store.get(&fingerprint).unwrap();
        assert_eq!(entry.series.ordered_keys().collect::<Vec<_>>(), vec![ts(3)]);
        assert_eq!(store.len(), 1);
        assert_eq!(store.stats().entry_count(), 1);
    }

    #[test]
    fn test_get_returns_a_copy() {
        let store = CacheStore::with_defaults();
        let fingerprint = Fingerprint::new("errors");
        store.set(fingerprint.clone(), entry_with("errors", &[(1, 5)]));

        let mut copy = store.get(&fingerprint).unwrap();
        copy.series.set_count(ts(1), 99);

        assert_eq!(store.get(&fingerprint).unwrap().series.get(ts(1)), Some(5));
    }

    #[test]
    fn test_case_insensitive_keys() {
        let store = CacheStore::with_defaults();
        store.set(Fingerprint::new("Status:Error"), entry_with("errors", &[(1, 1)]));

        assert!(store.get(&Fingerprint::new("status:error")).is_some());
        assert!(store.get(&Fingerprint::new("STATUS:ERROR")).is_some());
    }

    #[test]
    fn test_extract_clips_to_range() {
        let store = CacheStore::with_defaults();
        let fingerprint = Fingerprint::new("errors");
        store.set(fingerprint.clone(), entry_with("errors", &[(1, 1), (5, 2), (9, 3)]));

        let points = store.extract_window(&fingerprint, TimeRange::new(ts(2), ts(9)));
        assert_eq!(points, Some(vec![MinuteCount::new(ts(5), 2)]));

        assert!(store
            .extract_window(&Fingerprint::new("missing"), TimeRange::new(ts(0), ts(9)))
            .is_none());
    }

    #[test]
    fn test_extract_requires_covering_window() {
        let store = CacheStore::with_defaults();
        let fingerprint = Fingerprint::new("errors");
        // Window is [10:00, 10:30)
        store.set(fingerprint.clone(), entry_with("errors", &[(1, 1)]));

        assert!(store
            .extract_window(&fingerprint, TimeRange::new(ts(0), ts(30)))
            .is_some());
        assert!(store
            .extract_window(&fingerprint, TimeRange::new(ts(20), ts(40)))
            .is_none());

        let earlier = TimeRange::new(ts(0) - chrono::TimeDelta::minutes(5), ts(10));
        assert!(store.extract_window(&fingerprint, earlier).is_none());
    }

    #[test]
    fn test_invalidate_and_clear() {
        let store = CacheStore::with_defaults();
        for q in ["a", "b", "c"] {
            store.set(Fingerprint::new(q), entry_with(q, &[(1, 1)]));
        }
        assert_eq!(store.fingerprints().len(), 3);

        assert!(store.invalidate(&Fingerprint::new("b")));
        assert!(!store.invalidate(&Fingerprint::new("b")));
        assert_eq!(store.len(), 2);

        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.stats().entry_count(), 0);
    }

    #[test]
    fn test_invalidate_and_clear_release_idle_locks() {
        let store = CacheStore::with_defaults();
        for q in ["a", "b", "c"] {
            let fingerprint = Fingerprint::new(q);
            store.with_fingerprint_lock(&fingerprint, || {
                store.set(fingerprint.clone(), entry_with(q, &[(1, 1)]));
            });
        }
        assert_eq!(store.locks.len(), 3);

        store.invalidate(&Fingerprint::new("a"));
        assert_eq!(store.locks.len(), 2);

        store.clear();
        assert!(store.locks.is_empty());
    }

    #[test]
    fn test_invalidate_keeps_lock_in_use() {
        let store = CacheStore::with_defaults();
        let fingerprint = Fingerprint::new("errors");

        store.with_fingerprint_lock(&fingerprint, || {
            store.set(fingerprint.clone(), entry_with("errors", &[(1, 1)]));
            store.invalidate(&fingerprint);
            store.clear();
        });

        // The holder finished after invalidation, so its lock survived until then
        assert_eq!(store.locks.len(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_fingerprint_lock_serializes_read_modify_write() {
        let store = Arc::new(CacheStore::with_defaults());
        let fingerprint = Fingerprint::new("errors");
        store.set(fingerprint.clone(), entry_with("errors", &[(0, 0)]));

        let mut handles = vec![];
        for _ in 0..8 {
            let store = Arc::clone(&store);
            let fingerprint = fingerprint.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    store.with_fingerprint_lock(&fingerprint, || {
                        let mut entry = store.get(&fingerprint).unwrap();
                        entry.series.increment(ts(0));
                        store.set(fingerprint.clone(), entry);
                    });
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.get(&fingerprint).unwrap().series.get(ts(0)), Some(800));
    }

    #[test]
    fn test_concurrent_access_different_fingerprints() {
        let store = Arc::new(CacheStore::with_defaults());
        let mut handles = vec![];

        for i in 0..10 {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                let query = format!("service:{}", i);
                let fingerprint = Fingerprint::new(&query);
                store.with_fingerprint_lock(&fingerprint, || {
                    store.set(fingerprint.clone(), entry_with(&query, &[(1, i)]));
                });
                store.get(&fingerprint)
            }));
        }

        for handle in handles {
            assert!(handle.join().unwrap().is_some());
        }
        assert_eq!(store.len(), 10);
    }
}
