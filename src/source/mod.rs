//! Events delivered by the streaming platform.
//!
//! A batch is an ordered slice of [`RawEvent`]s. The core never owns the
//! subscription; it only borrows each batch for one invocation.

mod batch;
mod metadata;

pub use batch::{parse_batch, read_batch_file};
pub use metadata::{
    ENQUEUED_TIME_KEYS, OFFSET_KEYS, PARTITION_ID_KEYS, SEQUENCE_NUMBER_KEYS, UNKNOWN_PARTITION,
};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::borrow::Cow;

/// Per-event metadata attached by the streaming platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMetadata {
    /// Source partition the event was read from.
    pub partition_id: String,
    /// Position of the event within its partition.
    pub offset: u64,
    /// Platform sequence number of the event.
    pub sequence_number: u64,
    /// When the platform accepted the event.
    pub enqueued_time: DateTime<Utc>,
}

/// One delivered event: opaque payload plus metadata.
#[derive(Debug, Clone)]
pub struct RawEvent {
    pub metadata: EventMetadata,
    pub body: Bytes,
}

impl RawEvent {
    /// Create an event from metadata and payload bytes.
    pub fn new(metadata: EventMetadata, body: impl Into<Bytes>) -> Self {
        Self {
            metadata,
            body: body.into(),
        }
    }

    /// Payload decoded as UTF-8, with invalid sequences replaced.
    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}
