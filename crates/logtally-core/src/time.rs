//! Minute-resolution time helpers

use chrono::{DateTime, TimeDelta, Timelike, Utc};

/// All timestamps are normalized to UTC
pub type Timestamp = DateTime<Utc>;

/// Truncate a timestamp to the start of its containing minute
pub fn truncate_to_minute(ts: Timestamp) -> Timestamp {
    ts - TimeDelta::seconds(i64::from(ts.second()))
        - TimeDelta::nanoseconds(i64::from(ts.nanosecond()))
}

/// Whether a timestamp sits exactly on a minute boundary
pub fn is_minute_aligned(ts: Timestamp) -> bool {
    ts.second() == 0 && ts.nanosecond() == 0
}
