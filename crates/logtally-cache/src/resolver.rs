//! Decide how much of a request must be fetched upstream

use crate::entry::CacheEntry;
use crate::store::CacheStore;
use chrono::TimeDelta;
use logtally_core::{truncate_to_minute, Fingerprint, Timestamp};
use tracing::debug;

/// How a request start relates to the cached window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// No entry for the fingerprint (or caching disabled)
    Miss,
    /// Request start strictly inside the cached window
    Overlap,
    /// Entry exists but the request start is outside its window
    Disjoint,
}

/// Result of range resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// Start time to send upstream
    pub fetch_start: Timestamp,
    pub outcome: ResolveOutcome,
}

impl Resolution {
    pub fn is_overlap(&self) -> bool {
        self.outcome == ResolveOutcome::Overlap
    }
}

/// Computes the earliest start time that still has to be fetched
#[derive(Debug)]
pub struct RangeResolver<'a> {
    store: &'a CacheStore,
}

impl<'a> RangeResolver<'a> {
    pub fn new(store: &'a CacheStore) -> Self {
        Self { store }
    }

    /// Resolve the fetch start for a request beginning at `req_start`.
    ///
    /// Records the outcome in the store's statistics.
    pub fn resolve(&self, fingerprint: &Fingerprint, req_start: Timestamp) -> Resolution {
        let entry = if self.store.is_enabled() {
            self.store.get(fingerprint)
        } else {
            None
        };

        let resolution = resolve_against(
            entry.as_ref(),
            req_start,
            self.store.config().safety_margin_minutes,
        );

        let stats = self.store.stats();
        match resolution.outcome {
            ResolveOutcome::Miss => stats.record_miss(),
            ResolveOutcome::Overlap => stats.record_overlap(),
            ResolveOutcome::Disjoint => stats.record_disjoint(),
        }

        debug!(
            "Resolved '{}' from {}: {:?}, fetching from {}",
            fingerprint,
            req_start.to_rfc3339(),
            resolution.outcome,
            resolution.fetch_start.to_rfc3339()
        );

        resolution
    }
}

/// Pure resolution against an optional cached entry.
///
/// Overlap holds when `cached_end > req_start > cached_start`; the fetch
/// then restarts `safety_margin_minutes` before the cached end, truncated
/// to the minute, so late arrivals near the old boundary are picked up.
pub fn resolve_against(
    entry: Option<&CacheEntry>,
    req_start: Timestamp,
    safety_margin_minutes: i64,
) -> Resolution {
    let Some(entry) = entry else {
        return Resolution {
            fetch_start: req_start,
            outcome: ResolveOutcome::Miss,
        };
    };

    if entry.end_time > req_start && req_start > entry.start_time {
        // A margin chrono cannot represent re-fetches the whole request
        let fetch_start = TimeDelta::try_minutes(safety_margin_minutes.max(0))
            .and_then(|margin| entry.end_time.checked_sub_signed(margin))
            .map(truncate_to_minute)
            .unwrap_or(req_start);
        Resolution {
            fetch_start,
            outcome: ResolveOutcome::Overlap,
        }
    } else {
        Resolution {
            fetch_start: req_start,
            outcome: ResolveOutcome::Disjoint,
        }
    }
}
