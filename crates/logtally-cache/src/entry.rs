use crate::series::BucketedSeries;
use logtally_core::{Fingerprint, TimeRange, Timestamp};

/// Cached counts for one query fingerprint.
///
/// `series` is asserted complete for `[start_time, end_time)`. Merge and
/// resolve logic lives in [`crate::Merger`] and [`crate::RangeResolver`],
/// which compare this window against an incoming request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub query: Fingerprint,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub series: BucketedSeries,
}

impl CacheEntry {
    /// Create an empty entry for a window
    pub fn new(query: Fingerprint, window: TimeRange) -> Self {
        Self {
            query,
            start_time: window.start,
            end_time: window.end.max(window.start),
            series: BucketedSeries::new(),
        }
    }

    pub fn window(&self) -> TimeRange {
        TimeRange::new(self.start_time, self.end_time)
    }

    /// Whether a timestamp falls inside the validity window
    pub fn covers(&self, ts: Timestamp) -> bool {
        self.window().contains(ts)
    }
}
