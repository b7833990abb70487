//! Grouping of records into buckets.
//!
//! A bucket holds every record of one batch that lands in the same container,
//! hour and partition segment. Each bucket becomes exactly one artifact whose
//! path is derived from the bucket's offset range (see [`path`]).
//!
//! Keys are computed after container names are legalised and partition ids
//! sanitised, so two buckets never resolve to the same object. Tenants whose
//! names collapse onto one container share its artifacts, and every line
//! keeps its own `fqdn` and `partition_id`.

pub mod path;

pub use path::{ArtifactPath, object_key, partition_segment};

use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use indexmap::IndexMap;

use crate::container::container_name;
use crate::record::LogRecord;

/// Identity of a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BucketKey {
    /// Legal container name (see [`container_name`]).
    pub container: String,
    /// Start of the UTC hour.
    pub hour: DateTime<Utc>,
    /// Sanitised partition segment (see [`partition_segment`]).
    pub partition: String,
}

impl BucketKey {
    pub fn for_record(record: &LogRecord, prefix: &str) -> Self {
        Self {
            container: container_name(&record.fqdn, prefix),
            hour: truncate_to_hour(record.time_utc),
            partition: partition_segment(&record.partition_id),
        }
    }
}

/// Records of one bucket in arrival order plus their offset range.
#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    pub records: Vec<LogRecord>,
    pub min_offset: u64,
    pub max_offset: u64,
}

impl Bucket {
    fn new(record: LogRecord) -> Self {
        Self {
            min_offset: record.offset,
            max_offset: record.offset,
            records: vec![record],
        }
    }

    fn push(&mut self, record: LogRecord) {
        self.min_offset = self.min_offset.min(record.offset);
        self.max_offset = self.max_offset.max(record.offset);
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Buckets in first-seen order.
pub type Buckets = IndexMap<BucketKey, Bucket>;

/// Start of the UTC hour containing `time`.
pub fn truncate_to_hour(time: DateTime<Utc>) -> DateTime<Utc> {
    time.duration_trunc(TimeDelta::hours(1)).unwrap_or(time)
}

/// Single-pass grouper. Buckets are only handed out by [`finish`], after
/// every record of the batch has been pushed.
///
/// [`finish`]: PartitionGrouper::finish
#[derive(Debug)]
pub struct PartitionGrouper {
    prefix: String,
    buckets: Buckets,
    records: usize,
}

impl PartitionGrouper {
    /// Grouper for containers named `<prefix><tenant>`.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            buckets: Buckets::default(),
            records: 0,
        }
    }

    pub fn push(&mut self, record: LogRecord) {
        self.records += 1;
        let key = BucketKey::for_record(&record, &self.prefix);
        match self.buckets.get_mut(&key) {
            Some(bucket) => bucket.push(record),
            None => {
                self.buckets.insert(key, Bucket::new(record));
            }
        }
    }

    /// Number of records pushed so far.
    pub fn record_count(&self) -> usize {
        self.records
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn finish(self) -> Buckets {
        self.buckets
    }
}

impl Extend<LogRecord> for PartitionGrouper {
    fn extend<I: IntoIterator<Item = LogRecord>>(&mut self, iter: I) {
        for record in iter {
            self.push(record);
        }
    }
}

/// Group a whole batch of records.
pub fn group_records(records: impl IntoIterator<Item = LogRecord>, prefix: &str) -> Buckets {
    let mut grouper = PartitionGrouper::new(prefix);
    grouper.extend(records);
    grouper.finish()
}
