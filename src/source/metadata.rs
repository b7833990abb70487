//! Resolve [`EventMetadata`] from trigger binding properties.
//!
//! Different trigger runtimes spell the same property differently. Each
//! field has an ordered list of candidate keys and the first present key
//! wins. Values may be JSON strings or numbers.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use snafu::prelude::*;

use super::EventMetadata;
use crate::error::{
    InvalidEnqueuedTimeSnafu, InvalidOffsetSnafu, InvalidSequenceNumberSnafu, MetadataError,
    MissingEnqueuedTimeSnafu, MissingOffsetSnafu,
};

/// Candidate keys for the partition id, in priority order.
pub const PARTITION_ID_KEYS: &[&str] = &[
    "PartitionId",
    "partitionId",
    "x-opt-partition-id",
    "partition_id",
];

/// Candidate keys for the offset, in priority order.
pub const OFFSET_KEYS: &[&str] = &["Offset", "offset", "x-opt-offset"];

/// Candidate keys for the sequence number, in priority order.
pub const SEQUENCE_NUMBER_KEYS: &[&str] =
    &["SequenceNumber", "sequence_number", "x-opt-sequence-number"];

/// Candidate keys for the enqueued time, in priority order.
pub const ENQUEUED_TIME_KEYS: &[&str] = &[
    "EnqueuedTimeUtc",
    "enqueuedTime",
    "x-opt-enqueued-time",
    "enqueued_time",
];

/// Partition id used when the trigger reports none.
pub const UNKNOWN_PARTITION: &str = "unknown";

fn lookup<'a>(properties: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| properties.get(*key))
        .find(|value| !value.is_null())
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| s.trim().parse::<i64>().ok().and_then(DateTime::from_timestamp_millis)),
        _ => None,
    }
}

impl EventMetadata {
    /// Resolve metadata from a property map.
    ///
    /// A missing partition id becomes `"unknown"` and a missing sequence
    /// number falls back to the offset. The offset and enqueued time are
    /// required because artifact paths are derived from them.
    pub fn from_properties(properties: &Map<String, Value>) -> Result<Self, MetadataError> {
        let partition_id = lookup(properties, PARTITION_ID_KEYS)
            .map(as_text)
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| UNKNOWN_PARTITION.to_string());

        let offset_value = lookup(properties, OFFSET_KEYS).context(MissingOffsetSnafu)?;
        let offset = as_u64(offset_value).context(InvalidOffsetSnafu {
            value: as_text(offset_value),
        })?;

        let sequence_number = match lookup(properties, SEQUENCE_NUMBER_KEYS) {
            Some(value) => as_u64(value).context(InvalidSequenceNumberSnafu {
                value: as_text(value),
            })?,
            None => offset,
        };

        let time_value =
            lookup(properties, ENQUEUED_TIME_KEYS).context(MissingEnqueuedTimeSnafu)?;
        let enqueued_time = as_timestamp(time_value).context(InvalidEnqueuedTimeSnafu {
            value: as_text(time_value),
        })?;

        Ok(Self {
            partition_id,
            offset,
            sequence_number,
            enqueued_time,
        })
    }
}
