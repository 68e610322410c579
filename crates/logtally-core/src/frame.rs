//! Query answers and their Arrow representation

use crate::error::Result;
use crate::time::Timestamp;
use crate::types::{Fingerprint, TimeRange};
use arrow::array::{Int64Array, TimestampMillisecondArray};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Event count for one minute-aligned bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinuteCount {
    pub timestamp: Timestamp,
    pub count: u64,
}

impl MinuteCount {
    pub fn new(timestamp: Timestamp, count: u64) -> Self {
        Self { timestamp, count }
    }
}

/// Answer to a single count request.
///
/// Points are ascending by timestamp; minutes without events are absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountFrame {
    pub ref_id: String,
    pub fingerprint: Fingerprint,
    pub range: TimeRange,
    pub points: Vec<MinuteCount>,
}

impl CountFrame {
    pub fn new(
        ref_id: impl Into<String>,
        fingerprint: Fingerprint,
        range: TimeRange,
        points: Vec<MinuteCount>,
    ) -> Self {
        Self {
            ref_id: ref_id.into(),
            fingerprint,
            range,
            points,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Sum of all bucket counts
    pub fn total(&self) -> u64 {
        self.points.iter().map(|p| p.count).sum()
    }

    /// Arrow schema with a `time` column and an `entries` column
    pub fn schema() -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new(
                "time",
                DataType::Timestamp(TimeUnit::Millisecond, Some("UTC".into())),
                false,
            ),
            Field::new("entries", DataType::Int64, false),
        ]))
    }

    /// Render the frame as a two-column record batch
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let times: Vec<i64> = self
            .points
            .iter()
            .map(|p| p.timestamp.timestamp_millis())
            .collect();
        let counts: Vec<i64> = self
            .points
            .iter()
            .map(|p| i64::try_from(p.count).unwrap_or(i64::MAX))
            .collect();

        let batch = RecordBatch::try_new(
            Self::schema(),
            vec![
                Arc::new(TimestampMillisecondArray::from(times).with_timezone("UTC")),
                Arc::new(Int64Array::from(counts)),
            ],
        )?;
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Array;
    use chrono::{TimeZone, Utc};

    fn ts(m: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2024, 3, 1, 10, m, 0).unwrap()
    }

    fn sample_frame() -> CountFrame {
        CountFrame::new(
            "A",
            Fingerprint::new("errors"),
            TimeRange::new(ts(0), ts(10)),
            vec![MinuteCount::new(ts(0), 1), MinuteCount::new(ts(3), 4)],
        )
    }

    #[test]
    fn test_frame_totals() {
        let frame = sample_frame();
        assert_eq!(frame.len(), 2);
        assert_eq!(frame.total(), 5);
        assert!(!frame.is_empty());
    }

    #[test]
    fn test_to_record_batch() {
        let batch = sample_frame().to_record_batch().unwrap();

        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.schema().field(0).name(), "time");
        assert_eq!(batch.schema().field(1).name(), "entries");

        let times = batch
            .column(0)
            .as_any()
            .downcast_ref::<TimestampMillisecondArray>()
            .unwrap();
        assert_eq!(times.value(1), ts(3).timestamp_millis());

        let entries = batch
            .column(1)
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!(entries.value(0), 1);
        assert_eq!(entries.value(1), 4);
        assert_eq!(entries.null_count(), 0);
    }

    #[test]
    fn test_empty_frame_to_record_batch() {
        let frame = CountFrame::new(
            "",
            Fingerprint::new("errors"),
            TimeRange::new(ts(0), ts(10)),
            Vec::new(),
        );
        let batch = frame.to_record_batch().unwrap();
        assert_eq!(batch.num_rows(), 0);
        assert_eq!(batch.num_columns(), 2);
    }
}
