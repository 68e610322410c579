//! Cached Query Orchestrator
//!
//! Answers per-minute count requests through the minute-bucket cache,
//! fetching only the part of each request the cache cannot vouch for.
//!
//! Each request runs `RESOLVE -> FETCH -> MERGE -> EXTRACT`. A fetch error
//! ends the request before MERGE, leaving the cache as it was. No lock is
//! held while fetching; MERGE runs under the fingerprint's lock.

use crate::config::OrchestratorConfig;
use crate::fetch::fetch_all;
use crate::health::HealthCheckResult;
use crate::source::LogSource;
use futures::future::try_join_all;
use logtally_cache::{minute_counts, CacheConfig, CacheStats, CacheStore, Merger, RangeResolver};
use logtally_core::{CountFrame, CountRequest, Fingerprint, LogEvent, MinuteCount, Result, TimeRange};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Answers count requests against a paginated source through the cache
pub struct QueryOrchestrator {
    source: Arc<dyn LogSource>,
    cache: Arc<CacheStore>,
    config: OrchestratorConfig,
}

impl QueryOrchestrator {
    /// Create an orchestrator with its own cache
    pub fn new(source: Arc<dyn LogSource>, cache_config: CacheConfig) -> Self {
        Self::with_cache(source, Arc::new(CacheStore::new(cache_config)))
    }

    /// Create an orchestrator with default configuration
    pub fn with_defaults(source: Arc<dyn LogSource>) -> Self {
        Self::new(source, CacheConfig::default())
    }

    /// Create an orchestrator over a shared cache
    pub fn with_cache(source: Arc<dyn LogSource>, cache: Arc<CacheStore>) -> Self {
        Self {
            source,
            cache,
            config: OrchestratorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Answer one request.
    ///
    /// Counts are per whole minute: a start inside a minute is widened to
    /// that minute's boundary before resolving.
    pub async fn execute(&self, request: &CountRequest) -> Result<CountFrame> {
        request.validate()?;

        let fingerprint = request.fingerprint();
        let range = request.range.align_start();

        let points = if self.cache.is_enabled() {
            match self
                .execute_incremental(&request.query_text, &fingerprint, range)
                .await?
            {
                Some(points) => points,
                None => {
                    debug!(
                        "Cache for '{}' moved during request, fetching {} in full",
                        fingerprint, range
                    );
                    self.execute_full(&request.query_text, &fingerprint, range)
                        .await?
                }
            }
        } else {
            RangeResolver::new(&self.cache).resolve(&fingerprint, range.start);
            let events = self.fetch(&request.query_text, range).await?;
            counts_in(&events, range)
        };

        debug!(
            "Answered '{}' {} with {} buckets",
            fingerprint,
            range,
            points.len()
        );

        Ok(CountFrame::new(
            &request.ref_id,
            fingerprint,
            request.range,
            points,
        ))
    }

    /// RESOLVE, FETCH what the cache lacks, MERGE, EXTRACT.
    ///
    /// Returns `None` when a concurrent merge on the same fingerprint
    /// removed cached minutes this request relied on.
    async fn execute_incremental(
        &self,
        query_text: &str,
        fingerprint: &Fingerprint,
        range: TimeRange,
    ) -> Result<Option<Vec<MinuteCount>>> {
        // RESOLVE
        let resolution = RangeResolver::new(&self.cache).resolve(fingerprint, range.start);

        if resolution.fetch_start < range.end {
            // FETCH
            let fetched = TimeRange::new(resolution.fetch_start, range.end);
            let events = self.fetch(query_text, fetched).await?;

            // MERGE
            let report = Merger::new(&self.cache).merge(fingerprint, &events, range, fetched);
            if !report.complete {
                return Ok(None);
            }
        } else {
            debug!(
                "'{}' {} already covered by cache, skipping upstream",
                fingerprint, range
            );
        }

        // EXTRACT
        Ok(self.cache.extract_window(fingerprint, range))
    }

    /// Fetch the whole range, merge it, and answer from the fetched events
    async fn execute_full(
        &self,
        query_text: &str,
        fingerprint: &Fingerprint,
        range: TimeRange,
    ) -> Result<Vec<MinuteCount>> {
        let events = self.fetch(query_text, range).await?;
        Merger::new(&self.cache).merge(fingerprint, &events, range, range);
        Ok(counts_in(&events, range))
    }

    /// Answer several requests, keyed by `ref_id`.
    ///
    /// Requests run concurrently; the first error fails the whole batch.
    pub async fn execute_batch(
        &self,
        requests: &[CountRequest],
    ) -> Result<BTreeMap<String, CountFrame>> {
        let frames = try_join_all(requests.iter().map(|r| self.execute(r))).await?;
        Ok(frames
            .into_iter()
            .map(|frame| (frame.ref_id.clone(), frame))
            .collect())
    }

    /// Probe the upstream source
    pub async fn check_health(&self) -> HealthCheckResult {
        match self.source.check_health().await {
            Ok(()) => HealthCheckResult::ok(),
            Err(e) => {
                warn!("Health check against {} failed: {}", self.source.name(), e);
                HealthCheckResult::error(self.source.name())
            }
        }
    }

    async fn fetch(&self, query_text: &str, range: TimeRange) -> Result<Vec<LogEvent>> {
        match fetch_all(self.source.as_ref(), query_text, range, self.config.max_pages).await {
            Ok(outcome) => {
                self.cache
                    .stats()
                    .record_fetch(outcome.pages as u64, outcome.events.len() as u64);
                Ok(outcome.events)
            }
            Err(e) => {
                self.cache.stats().record_upstream_error();
                warn!("Upstream fetch for {} failed: {}", range, e);
                Err(e)
            }
        }
    }

    /// Get cache statistics
    pub fn cache_stats(&self) -> Arc<CacheStats> {
        self.cache.stats()
    }

    /// Get the underlying cache
    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    /// Invalidate the cached entry for a query
    pub fn invalidate(&self, query_text: &str) -> bool {
        self.cache.invalidate(&Fingerprint::new(query_text))
    }

    /// Clear all cached entries
    pub fn clear_cache(&self) {
        info!("Clearing {} cached queries", self.cache.len());
        self.cache.clear();
    }
}

/// Ascending per-minute counts of `events` within `range`
fn counts_in(events: &[LogEvent], range: TimeRange) -> Vec<MinuteCount> {
    let mut points: Vec<MinuteCount> = minute_counts(events)
        .into_iter()
        .filter(|(minute, _)| range.contains(*minute))
        .map(|(minute, count)| MinuteCount::new(minute, count))
        .collect();
    points.sort_by_key(|p| p.timestamp);
    points
}

impl std::fmt::Debug for QueryOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryOrchestrator")
            .field("source", &self.source.name())
            .field("cache", &self.cache)
            .field("config", &self.config)
            .finish()
    }
}
