//! Batch files for offline replay.
//!
//! One JSON object per line. `body` holds the payload: a string is taken
//! verbatim, any other JSON value is re-serialized compactly. Every other
//! top-level field is treated as a trigger property and resolved through
//! [`EventMetadata::from_properties`].
//!
//! ```text
//! {"PartitionId":"0","Offset":"100","SequenceNumber":7,"EnqueuedTimeUtc":"2026-01-28T14:30:00Z","body":"{\"records\":[...]}"}
//! ```

use serde::Deserialize;
use serde_json::{Map, Value};
use snafu::prelude::*;
use std::path::Path;

use super::{EventMetadata, RawEvent};
use crate::error::{BatchFileError, BatchReadSnafu, EventMetadataSnafu, EventParseSnafu};

#[derive(Debug, Deserialize)]
struct EventEnvelope {
    #[serde(default)]
    body: Value,
    #[serde(flatten)]
    properties: Map<String, Value>,
}

impl EventEnvelope {
    fn into_body(self) -> Vec<u8> {
        match self.body {
            Value::String(text) => text.into_bytes(),
            Value::Null => Vec::new(),
            other => other.to_string().into_bytes(),
        }
    }
}

/// Parse a batch from NDJSON text. Blank lines are skipped.
pub fn parse_batch(text: &str) -> Result<Vec<RawEvent>, BatchFileError> {
    let mut events = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let line_no = idx + 1;
        let envelope: EventEnvelope =
            serde_json::from_str(line).context(EventParseSnafu { line: line_no })?;
        let metadata = EventMetadata::from_properties(&envelope.properties)
            .context(EventMetadataSnafu { line: line_no })?;
        events.push(RawEvent::new(metadata, envelope.into_body()));
    }

    Ok(events)
}

/// Read and parse a batch file.
pub fn read_batch_file(path: impl AsRef<Path>) -> Result<Vec<RawEvent>, BatchFileError> {
    let text = std::fs::read_to_string(path.as_ref()).context(BatchReadSnafu)?;
    parse_batch(&text)
}
