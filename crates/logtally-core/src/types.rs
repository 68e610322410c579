use crate::error::{Result, TallyError};
use crate::time::{truncate_to_minute, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalized identifier of a query, used as the cache key.
///
/// Query text is case-folded so that two queries differing only in case
/// share one cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String")]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(query_text: &str) -> Self {
        Self(query_text.to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Fingerprint {
    fn from(query_text: String) -> Self {
        Self::new(&query_text)
    }
}

impl From<&str> for Fingerprint {
    fn from(query_text: &str) -> Self {
        Self::new(query_text)
    }
}

/// Half-open time interval `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl TimeRange {
    pub fn new(start: Timestamp, end: Timestamp) -> Self {
        Self { start, end }
    }

    /// Reject ranges whose end is not after their start
    pub fn validate(&self) -> Result<()> {
        if self.end <= self.start {
            return Err(TallyError::MalformedRequest(format!(
                "end time {} is not after start time {}",
                self.end.to_rfc3339(),
                self.start.to_rfc3339()
            )));
        }
        Ok(())
    }

    pub fn contains(&self, ts: Timestamp) -> bool {
        ts >= self.start && ts < self.end
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Widen the start down to its minute boundary, so the first bucket
    /// is a whole minute like every other
    pub fn align_start(&self) -> TimeRange {
        TimeRange::new(truncate_to_minute(self.start), self.end)
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

/// A single raw event returned by the upstream log source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    pub timestamp: Timestamp,
    #[serde(default)]
    pub message: String,
}

impl LogEvent {
    pub fn new(timestamp: Timestamp, message: impl Into<String>) -> Self {
        Self {
            timestamp,
            message: message.into(),
        }
    }

    pub fn at(timestamp: Timestamp) -> Self {
        Self::new(timestamp, "")
    }
}

/// A consumer request: count matching events per minute over a range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountRequest {
    /// Identifies the request within a batch
    #[serde(default)]
    pub ref_id: String,
    /// Raw query text as sent upstream
    pub query_text: String,
    #[serde(flatten)]
    pub range: TimeRange,
}

impl CountRequest {
    pub fn new(query_text: impl Into<String>, start: Timestamp, end: Timestamp) -> Self {
        Self {
            ref_id: String::new(),
            query_text: query_text.into(),
            range: TimeRange::new(start, end),
        }
    }

    pub fn with_ref_id(mut self, ref_id: impl Into<String>) -> Self {
        self.ref_id = ref_id.into();
        self
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::new(&self.query_text)
    }

    /// Reject empty queries and inverted or empty ranges
    pub fn validate(&self) -> Result<()> {
        if self.fingerprint().is_empty() {
            return Err(TallyError::MalformedRequest(
                "query text must not be empty".to_string(),
            ));
        }
        self.range.validate()
    }
}
