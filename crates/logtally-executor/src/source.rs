//! Upstream log source implementations
//!
//! Provides the trait the orchestrator fetches through, plus an in-memory
//! paginated source.

use async_trait::async_trait;
use chrono::Utc;
use logtally_core::{LogEvent, Result, TallyError, TimeRange};
use parking_lot::{Mutex, RwLock};
use std::path::Path;

/// One page of upstream results
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogPage {
    pub events: Vec<LogEvent>,
    /// Continuation token; `None` or empty when exhausted
    pub next_cursor: Option<String>,
}

/// Trait for paginated upstream log sources
#[async_trait]
pub trait LogSource: Send + Sync {
    /// Fetch one page of events matching `query_text` within `range`,
    /// resuming from `cursor` when given
    async fn fetch_page(
        &self,
        query_text: &str,
        range: &TimeRange,
        cursor: Option<&str>,
    ) -> Result<LogPage>;

    /// Probe connectivity with an empty query over an empty instant
    async fn check_health(&self) -> Result<()> {
        let now = Utc::now();
        self.fetch_page("", &TimeRange::new(now, now), None)
            .await
            .map(|_| ())
    }

    /// Source name for logs and health messages
    fn name(&self) -> &str;
}

/// In-memory log source with offset-based pagination.
///
/// Matches events whose message contains the query text, ignoring case; an
/// empty query matches every event.
#[derive(Debug)]
pub struct MemoryLogSource {
    events: RwLock<Vec<LogEvent>>,
    page_size: usize,
    name: String,
    /// Ranges requested on first pages, oldest first
    requested: Mutex<Vec<TimeRange>>,
}

impl MemoryLogSource {
    pub fn new(events: Vec<LogEvent>, page_size: usize) -> Self {
        Self::with_name(events, page_size, "memory")
    }

    /// Create with a custom name
    pub fn with_name(events: Vec<LogEvent>, page_size: usize, name: impl Into<String>) -> Self {
        Self {
            events: RwLock::new(events),
            page_size: page_size.max(1),
            name: name.into(),
            requested: Mutex::new(Vec::new()),
        }
    }

    /// Load events from a JSON array of `{timestamp, message}` objects
    pub fn from_json_file(path: &Path, page_size: usize) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let events: Vec<LogEvent> = serde_json::from_str(&contents)?;
        Ok(Self::with_name(events, page_size, path.display().to_string()))
    }

    /// Append events, as if they arrived upstream
    pub fn push(&self, event: LogEvent) {
        self.events.write().push(event);
    }

    pub fn extend(&self, events: impl IntoIterator<Item = LogEvent>) {
        self.events.write().extend(events);
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Ranges requested so far, one per fetch (not per page)
    pub fn requested_ranges(&self) -> Vec<TimeRange> {
        self.requested.lock().clone()
    }

    fn matching(&self, query_text: &str, range: &TimeRange) -> Vec<LogEvent> {
        let needle = query_text.to_lowercase();
        let mut matched: Vec<LogEvent> = self
            .events
            .read()
            .iter()
            .filter(|e| range.contains(e.timestamp))
            .filter(|e| needle.is_empty() || e.message.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        matched.sort_by_key(|e| e.timestamp);
        matched
    }
}

#[async_trait]
impl LogSource for MemoryLogSource {
    async fn fetch_page(
        &self,
        query_text: &str,
        range: &TimeRange,
        cursor: Option<&str>,
    ) -> Result<LogPage> {
        let offset = match cursor {
            None => {
                self.requested.lock().push(*range);
                0
            }
            Some(token) => token.parse::<usize>().map_err(|_| {
                TallyError::UpstreamFetch(format!("invalid continuation token '{}'", token))
            })?,
        };

        let matched = self.matching(query_text, range);
        let end = (offset + self.page_size).min(matched.len());
        let events = matched.get(offset..end).map(<[LogEvent]>::to_vec).unwrap_or_default();
        let next_cursor = (end < matched.len()).then(|| end.to_string());

        Ok(LogPage { events, next_cursor })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use logtally_core::Timestamp;

    fn ts(m: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2024, 3, 1, 10, m, 0).unwrap()
    }

    fn sample_source(page_size: usize) -> MemoryLogSource {
        MemoryLogSource::new(
            vec![
                LogEvent::new(ts(4), "GET /api status:error"),
                LogEvent::new(ts(1), "GET /api status:ok"),
                LogEvent::new(ts(2), "POST /api status:ERROR"),
                LogEvent::new(ts(9), "GET /health status:error"),
                LogEvent::new(ts(20), "GET /api status:error"),
            ],
            page_size,
        )
    }

    #[tokio::test]
    async fn test_filters_by_query_and_range() {
        let source = sample_source(100);
        let page = source
            .fetch_page("Status:Error", &TimeRange::new(ts(0), ts(10)), None)
            .await
            .unwrap();

        let times: Vec<_> = page.events.iter().map(|e| e.timestamp).collect();
        assert_eq!(times, vec![ts(2), ts(4), ts(9)]);
        assert!(page.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_empty_query_matches_all() {
        let source = sample_source(100);
        let page = source
            .fetch_page("", &TimeRange::new(ts(0), ts(30)), None)
            .await
            .unwrap();
        assert_eq!(page.events.len(), 5);
    }

    #[tokio::test]
    async fn test_pagination() {
        let source = sample_source(2);
        let range = TimeRange::new(ts(0), ts(30));

        let first = source.fetch_page("", &range, None).await.unwrap();
        assert_eq!(first.events.len(), 2);
        assert_eq!(first.next_cursor.as_deref(), Some("2"));

        let second = source.fetch_page("", &range, Some("2")).await.unwrap();
        assert_eq!(second.events.len(), 2);

        let third = source.fetch_page("", &range, Some("4")).await.unwrap();
        assert_eq!(third.events.len(), 1);
        assert!(third.next_cursor.is_none());

        // Only the first page counts as a new fetch
        assert_eq!(source.requested_ranges(), vec![range]);
    }

    #[tokio::test]
    async fn test_invalid_cursor() {
        let source = sample_source(2);
        let err = source
            .fetch_page("", &TimeRange::new(ts(0), ts(30)), Some("not-a-number"))
            .await
            .unwrap_err();
        assert!(err.is_upstream());
    }

    #[tokio::test]
    async fn test_push_makes_events_visible() {
        let source = MemoryLogSource::new(Vec::new(), 10);
        assert!(source.is_empty());

        source.push(LogEvent::new(ts(3), "late arrival"));
        let page = source
            .fetch_page("late", &TimeRange::new(ts(0), ts(10)), None)
            .await
            .unwrap();
        assert_eq!(page.events.len(), 1);
    }

    #[tokio::test]
    async fn test_default_health_check() {
        assert!(sample_source(10).check_health().await.is_ok());
    }
}
