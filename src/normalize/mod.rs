//! Payload normalization.
//!
//! Diagnostic payloads arrive in a handful of shapes. Every shape is
//! reduced to a list of [`RawRecord`]s, and every record becomes one
//! [`LogRecord`] carrying the event metadata, a display message and the
//! extracted tenant. Normalization never fails: anything that is not
//! recognizable JSON is kept as raw text.

mod tenant;

pub use tenant::{FORWARDED_HOST_KEY, Tenant, TenantSource, UNKNOWN_TENANT, extract_tenant};

use serde_json::{Map, Value};

use crate::emit;
use crate::metrics::events::{RecordsNormalized, UnknownTenant};
use crate::record::LogRecord;
use crate::source::RawEvent;

/// Field that holds the inner record list in wrapped payloads.
pub const RECORDS_KEY: &str = "records";

/// Candidate message fields, in priority order.
pub const MESSAGE_KEYS: &[&str] = &[
    "resultDescription",
    "ResultDescription",
    "message",
    "Message",
    "_raw",
];

/// Structural classification of a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadShape {
    /// A JSON array of objects, each either a `records` wrapper or a record.
    RecordArray,
    /// A JSON object with a `records` array.
    RecordsObject,
    /// Any other JSON object, taken as a single record.
    SingleRecord,
    /// Not a JSON object or array of objects.
    RawText,
}

impl PayloadShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadShape::RecordArray => "record_array",
            PayloadShape::RecordsObject => "records_object",
            PayloadShape::SingleRecord => "single_record",
            PayloadShape::RawText => "raw_text",
        }
    }
}

/// One record extracted from a payload.
#[derive(Debug, Clone, PartialEq)]
pub enum RawRecord {
    Structured(Map<String, Value>),
    Text(String),
}

impl RawRecord {
    /// The record's display message.
    pub fn message(&self) -> String {
        match self {
            RawRecord::Structured(fields) => pick_message(fields),
            RawRecord::Text(text) => text.clone(),
        }
    }

    /// The value stored under `record` in the output line.
    pub fn into_value(self) -> Value {
        match self {
            RawRecord::Structured(fields) => Value::Object(fields),
            RawRecord::Text(text) => Value::String(text),
        }
    }
}

/// The records found in one payload.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedPayload {
    pub shape: PayloadShape,
    pub records: Vec<RawRecord>,
}

fn inner_record(value: Value) -> RawRecord {
    match value {
        Value::Object(fields) => RawRecord::Structured(fields),
        Value::String(text) => RawRecord::Text(text),
        other => RawRecord::Text(other.to_string()),
    }
}

/// Expand an object into records: the members of its `records` array if it
/// has one, otherwise the object itself.
fn expand_object(mut fields: Map<String, Value>, out: &mut Vec<RawRecord>) -> bool {
    if matches!(fields.get(RECORDS_KEY), Some(Value::Array(_)))
        && let Some(Value::Array(inner)) = fields.remove(RECORDS_KEY)
    {
        out.extend(inner.into_iter().map(inner_record));
        return true;
    }
    out.push(RawRecord::Structured(fields));
    false
}

/// Classify a payload and extract its records.
pub fn normalize_payload(text: &str) -> NormalizedPayload {
    let raw_text = || NormalizedPayload {
        shape: PayloadShape::RawText,
        records: vec![RawRecord::Text(text.to_string())],
    };

    match serde_json::from_str::<Value>(text) {
        Ok(Value::Array(items)) if items.iter().all(Value::is_object) => {
            let mut records = Vec::new();
            for item in items {
                if let Value::Object(fields) = item {
                    expand_object(fields, &mut records);
                }
            }
            NormalizedPayload {
                shape: PayloadShape::RecordArray,
                records,
            }
        }
        Ok(Value::Object(fields)) => {
            let mut records = Vec::new();
            let shape = if expand_object(fields, &mut records) {
                PayloadShape::RecordsObject
            } else {
                PayloadShape::SingleRecord
            };
            NormalizedPayload { shape, records }
        }
        _ => raw_text(),
    }
}

/// Pick a human-readable message out of a structured record.
///
/// The first [`MESSAGE_KEYS`] entry holding a non-blank string wins, as is. A
/// present non-string value is rendered as compact JSON. With no candidate
/// the whole record is rendered compactly.
pub fn pick_message(fields: &Map<String, Value>) -> String {
    for key in MESSAGE_KEYS {
        match fields.get(*key) {
            Some(Value::String(s)) if !s.trim().is_empty() => return s.clone(),
            Some(Value::Null) | Some(Value::String(_)) | None => {}
            Some(other) => return other.to_string(),
        }
    }
    Value::Object(fields.clone()).to_string()
}

/// Turn one event into log records.
pub fn normalize_event(event: &RawEvent) -> Vec<LogRecord> {
    let payload = normalize_payload(&event.body_text());
    emit!(RecordsNormalized {
        shape: payload.shape.as_str(),
        count: payload.records.len() as u64,
    });

    let metadata = &event.metadata;
    payload
        .records
        .into_iter()
        .map(|raw| {
            let message = raw.message();
            let tenant = extract_tenant(&raw, &message);
            if tenant.source == TenantSource::Unknown {
                emit!(UnknownTenant);
            }
            LogRecord {
                time_utc: metadata.enqueued_time,
                fqdn: tenant.name,
                partition_id: metadata.partition_id.clone(),
                offset: metadata.offset,
                sequence_number: metadata.sequence_number,
                message,
                record: raw.into_value(),
            }
        })
        .collect()
}
