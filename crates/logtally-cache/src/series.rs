//! Minute-bucketed event counts

use logtally_core::{truncate_to_minute, MinuteCount, TimeRange, Timestamp};
use std::collections::BTreeMap;

/// Mapping from minute-aligned timestamp to an event count.
///
/// Keys are truncated to the minute on the way in, so every stored key has
/// zero seconds and nanoseconds. Ordered by timestamp, one bucket per key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketedSeries {
    buckets: BTreeMap<Timestamp, u64>,
}

impl BucketedSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one to a bucket, creating it at 1 if absent
    pub fn increment(&mut self, minute: Timestamp) {
        *self.buckets.entry(truncate_to_minute(minute)).or_insert(0) += 1;
    }

    /// Overwrite a bucket's count
    pub fn set_count(&mut self, minute: Timestamp, count: u64) {
        self.buckets.insert(truncate_to_minute(minute), count);
    }

    /// Remove every bucket strictly before `t`, returning how many were removed
    pub fn prune_before(&mut self, t: Timestamp) -> usize {
        let kept = self.buckets.split_off(&t);
        let removed = self.buckets.len();
        self.buckets = kept;
        removed
    }

    /// Ascending, restartable sequence of bucket timestamps
    pub fn ordered_keys(&self) -> impl Iterator<Item = Timestamp> + Clone + '_ {
        self.buckets.keys().copied()
    }

    /// Drop all buckets
    pub fn clear(&mut self) {
        self.buckets.clear();
    }

    pub fn get(&self, minute: Timestamp) -> Option<u64> {
        self.buckets.get(&truncate_to_minute(minute)).copied()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Sum of all bucket counts
    pub fn total(&self) -> u64 {
        self.buckets.values().sum()
    }

    /// Ascending `(timestamp, count)` pairs
    pub fn iter(&self) -> impl Iterator<Item = MinuteCount> + '_ {
        self.buckets
            .iter()
            .map(|(ts, count)| MinuteCount::new(*ts, *count))
    }

    /// Ascending pairs whose key falls in the half-open range
    pub fn range(&self, range: TimeRange) -> impl Iterator<Item = MinuteCount> + '_ {
        let upper = if range.is_empty() { range.start } else { range.end };
        self.buckets
            .range(range.start..upper)
            .map(|(ts, count)| MinuteCount::new(*ts, *count))
    }

    /// Earliest bucket, if any
    pub fn first_key(&self) -> Option<Timestamp> {
        self.buckets.keys().next().copied()
    }
}
