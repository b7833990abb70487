//! Shared helpers for integration tests.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use flate2::read::GzDecoder;
use flurry::partition::ArtifactPath;
use flurry::{ContainerStore, EventMetadata, LogRecord, RawEvent};
use object_store::path::Path;
use std::io::Read;

pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 28, hour, minute, 0).unwrap()
}

pub fn event(partition: &str, offset: u64, time: DateTime<Utc>, body: &str) -> RawEvent {
    RawEvent::new(
        EventMetadata {
            partition_id: partition.to_string(),
            offset,
            sequence_number: offset * 10,
            enqueued_time: time,
        },
        body.to_string(),
    )
}

pub async fn read_bytes(store: &dyn ContainerStore, path: &ArtifactPath) -> Vec<u8> {
    store
        .get_object(&path.container, &Path::from(path.key.as_str()))
        .await
        .unwrap()
        .to_vec()
}

pub fn decode(bytes: &[u8]) -> Vec<LogRecord> {
    let mut text = String::new();
    GzDecoder::new(bytes).read_to_string(&mut text).unwrap();
    text.lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

pub async fn read_records(store: &dyn ContainerStore, path: &ArtifactPath) -> Vec<LogRecord> {
    decode(&read_bytes(store, path).await)
}
