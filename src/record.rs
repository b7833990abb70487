//! The uniform log record written to artifacts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One normalized log line.
///
/// Field order is the NDJSON field order. Offsets and sequence numbers are
/// numeric in memory and decimal strings on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub time_utc: DateTime<Utc>,
    pub fqdn: String,
    pub partition_id: String,
    #[serde(with = "decimal")]
    pub offset: u64,
    #[serde(with = "decimal")]
    pub sequence_number: u64,
    pub message: String,
    /// The original structured record, or the raw text for non-JSON payloads.
    pub record: Value,
}

mod decimal {
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(de::Error::custom)
    }
}
