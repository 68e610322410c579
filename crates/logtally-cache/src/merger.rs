//! Fold fetched events into a cache entry

use crate::entry::CacheEntry;
use crate::store::CacheStore;
use ahash::AHashMap;
use logtally_core::{truncate_to_minute, Fingerprint, LogEvent, TimeRange, Timestamp};
use tracing::{debug, warn};

/// Summary of a single merge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeReport {
    /// Raw events folded in
    pub events: usize,
    /// Distinct minutes overwritten
    pub touched_minutes: usize,
    /// Buckets dropped for falling before the new window start
    pub pruned: usize,
    /// Validity window the entry now carries
    pub window: TimeRange,
    /// False when the cached minutes the fetch relied on were gone, in
    /// which case `window` only covers the fetched range
    pub complete: bool,
}

/// Applies fetched batches to the cache store
#[derive(Debug)]
pub struct Merger<'a> {
    store: &'a CacheStore,
}

impl<'a> Merger<'a> {
    pub fn new(store: &'a CacheStore) -> Self {
        Self { store }
    }

    /// Merge a batch fetched over `fetched` for `fingerprint` and advance
    /// its window to `window`, creating the entry if needed.
    ///
    /// When `fetched` starts after `window`, the minutes in between must
    /// still be cached. Another merge may have pruned them since the range
    /// was resolved; the entry then only claims `fetched` and the report is
    /// marked incomplete. The read-modify-write runs under the fingerprint's
    /// lock.
    pub fn merge(
        &self,
        fingerprint: &Fingerprint,
        events: &[LogEvent],
        window: TimeRange,
        fetched: TimeRange,
    ) -> MergeReport {
        let report = self.store.with_fingerprint_lock(fingerprint, || {
            let current = self.store.get(fingerprint);
            let complete = fetched.start <= window.start
                || current.as_ref().is_some_and(|entry| {
                    entry.start_time <= window.start && entry.end_time >= fetched.start
                });
            let applied = if complete { window } else { fetched };

            let mut entry =
                current.unwrap_or_else(|| CacheEntry::new(fingerprint.clone(), applied));
            let mut report = apply_batch(&mut entry, events, applied);
            report.complete = complete;
            self.store.set(fingerprint.clone(), entry);
            report
        });

        self.store.stats().record_merge(report.pruned as u64);
        debug!(
            "Merged {} events into '{}' over {} minutes, window {}, pruned {}",
            report.events, fingerprint, report.touched_minutes, report.window, report.pruned
        );
        if !report.complete {
            warn!(
                "Cached minutes for '{}' before {} were pruned concurrently, window narrowed",
                fingerprint,
                fetched.start.to_rfc3339()
            );
        }

        report
    }
}

/// Count events per minute within a batch
pub fn minute_counts(events: &[LogEvent]) -> AHashMap<Timestamp, u64> {
    let mut counts = AHashMap::new();
    for event in events {
        *counts.entry(truncate_to_minute(event.timestamp)).or_insert(0) += 1;
    }
    counts
}

/// Apply a batch to an entry in place.
///
/// Minutes present in the batch are overwritten with the batch's count, so
/// re-fetched minutes are corrected rather than double counted. The window
/// becomes `window` and buckets before its start are pruned.
pub fn apply_batch(entry: &mut CacheEntry, events: &[LogEvent], window: TimeRange) -> MergeReport {
    let counts = minute_counts(events);
    let touched_minutes = counts.len();
    for (minute, count) in counts {
        entry.series.set_count(minute, count);
    }

    entry.start_time = window.start;
    entry.end_time = window.end.max(window.start);
    let pruned = entry.series.prune_before(entry.start_time);

    MergeReport {
        events: events.len(),
        touched_minutes,
        pruned,
        window: entry.window(),
        complete: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone, Utc};
    use logtally_core::MinuteCount;

    fn ts(h: u32, m: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2024, 3, 1, h, m, 0).unwrap()
    }

    fn events_at(times: &[Timestamp]) -> Vec<LogEvent> {
        times.iter().map(|t| LogEvent::at(*t)).collect()
    }

    #[test]
    fn test_first_merge_creates_entry() {
        let store = CacheStore::with_defaults();
        let fingerprint = Fingerprint::new("errors");
        let window = TimeRange::new(ts(10, 0), ts(10, 10));
        let events = events_at(&[ts(10, 0), ts(10, 3), ts(10, 7)]);

        let report = Merger::new(&store).merge(&fingerprint, &events, window, window);
        assert!(report.complete);
        assert_eq!(report.events, 3);
        assert_eq!(report.touched_minutes, 3);

        let entry = store.get(&fingerprint).unwrap();
        assert_eq!(entry.window(), window);
        assert_eq!(
            entry.series.iter().collect::<Vec<_>>(),
            vec![
                MinuteCount::new(ts(10, 0), 1),
                MinuteCount::new(ts(10, 3), 1),
                MinuteCount::new(ts(10, 7), 1),
            ]
        );
        assert_eq!(store.stats().merges(), 1);
    }

    #[test]
    fn test_events_grouped_by_minute() {
        let store = CacheStore::with_defaults();
        let fingerprint = Fingerprint::new("errors");
        let base = ts(10, 2);
        let events = events_at(&[
            base,
            base + TimeDelta::seconds(15),
            base + TimeDelta::milliseconds(59_999),
        ]);

        let window = TimeRange::new(ts(10, 0), ts(10, 10));
        Merger::new(&store).merge(&fingerprint, &events, window, window);

        let entry = store.get(&fingerprint).unwrap();
        assert_eq!(entry.series.get(ts(10, 2)), Some(3));
        assert_eq!(entry.series.len(), 1);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let store = CacheStore::with_defaults();
        let fingerprint = Fingerprint::new("errors");
        let window = TimeRange::new(ts(10, 0), ts(10, 10));
        let events = events_at(&[ts(10, 1), ts(10, 1), ts(10, 4)]);

        let merger = Merger::new(&store);
        merger.merge(&fingerprint, &events, window, window);
        let once = store.get(&fingerprint).unwrap();

        merger.merge(&fingerprint, &events, window, window);
        let twice = store.get(&fingerprint).unwrap();

        assert_eq!(once, twice);
        assert_eq!(twice.series.get(ts(10, 1)), Some(2));
    }

    #[test]
    fn test_overlap_minutes_are_overwritten() {
        let mut entry = CacheEntry::new(Fingerprint::new("errors"), TimeRange::new(ts(10, 0), ts(10, 10)));
        entry.series.set_count(ts(10, 8), 1);
        entry.series.set_count(ts(10, 5), 4);

        // Re-fetch of [10:08, 10:20) saw a late event in 10:08
        let events = events_at(&[ts(10, 8), ts(10, 8), ts(10, 12)]);
        apply_batch(&mut entry, &events, TimeRange::new(ts(10, 5), ts(10, 20)));

        assert_eq!(entry.series.get(ts(10, 8)), Some(2));
        assert_eq!(entry.series.get(ts(10, 5)), Some(4));
        assert_eq!(entry.series.get(ts(10, 12)), Some(1));
    }

    #[test]
    fn test_prune_after_merge() {
        let mut entry = CacheEntry::new(Fingerprint::new("errors"), TimeRange::new(ts(10, 0), ts(10, 10)));
        entry.series.set_count(ts(10, 2), 3);
        entry.series.set_count(ts(10, 9), 1);

        let report = apply_batch(&mut entry, &[], TimeRange::new(ts(10, 8), ts(10, 20)));

        assert_eq!(report.pruned, 1);
        assert!(entry.series.ordered_keys().all(|k| k >= entry.start_time));
        assert_eq!(entry.window(), TimeRange::new(ts(10, 8), ts(10, 20)));
    }

    #[test]
    fn test_partial_fetch_relies_on_cached_minutes() {
        let store = CacheStore::with_defaults();
        let fingerprint = Fingerprint::new("errors");
        let merger = Merger::new(&store);

        let first = TimeRange::new(ts(10, 0), ts(10, 10));
        merger.merge(&fingerprint, &events_at(&[ts(10, 5)]), first, first);

        // Resolved as overlap: [10:08, 10:20) fetched, [10:05, 10:08) from cache
        let window = TimeRange::new(ts(10, 5), ts(10, 20));
        let fetched = TimeRange::new(ts(10, 8), ts(10, 20));
        let report = merger.merge(&fingerprint, &events_at(&[ts(10, 12)]), window, fetched);

        assert!(report.complete);
        assert_eq!(report.window, window);
        let entry = store.get(&fingerprint).unwrap();
        assert_eq!(entry.series.get(ts(10, 5)), Some(1));
        assert_eq!(entry.series.get(ts(10, 12)), Some(1));
    }

    #[test]
    fn test_concurrently_pruned_minutes_narrow_window() {
        let store = CacheStore::with_defaults();
        let fingerprint = Fingerprint::new("errors");
        let merger = Merger::new(&store);

        // A later request already moved the window start to 10:07
        let moved = TimeRange::new(ts(10, 7), ts(10, 10));
        merger.merge(&fingerprint, &events_at(&[ts(10, 7)]), moved, moved);

        // This request resolved earlier and relies on [10:05, 10:08) being cached
        let window = TimeRange::new(ts(10, 5), ts(10, 20));
        let fetched = TimeRange::new(ts(10, 8), ts(10, 20));
        let report = merger.merge(&fingerprint, &events_at(&[ts(10, 12)]), window, fetched);

        assert!(!report.complete);
        assert_eq!(report.window, fetched);
        let entry = store.get(&fingerprint).unwrap();
        assert_eq!(entry.window(), fetched);
        assert!(entry.series.ordered_keys().all(|k| k >= ts(10, 8)));
    }

    #[test]
    fn test_partial_fetch_without_entry_is_incomplete() {
        let store = CacheStore::with_defaults();
        let fingerprint = Fingerprint::new("errors");

        let window = TimeRange::new(ts(10, 5), ts(10, 20));
        let fetched = TimeRange::new(ts(10, 8), ts(10, 20));
        let report = Merger::new(&store).merge(&fingerprint, &[], window, fetched);

        assert!(!report.complete);
        assert_eq!(store.get(&fingerprint).unwrap().window(), fetched);
    }

    #[test]
    fn test_minute_counts() {
        let counts = minute_counts(&events_at(&[ts(10, 0), ts(10, 0), ts(10, 1)]));
        assert_eq!(counts.get(&ts(10, 0)), Some(&2));
        assert_eq!(counts.get(&ts(10, 1)), Some(&1));
        assert_eq!(counts.len(), 2);
    }
}
