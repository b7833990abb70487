//! Deterministic artifact paths.
//!
//! ```text
//! <container>/y=2026/m=01/d=28/h=14/m=00/p=0/part-o100-o105.ndjson.gz
//! ```
//!
//! The path depends only on the bucket's container, hour, partition segment
//! and offset range, so a redelivered batch lands on the same objects.

use chrono::{DateTime, Utc};
use std::fmt;

use super::{Bucket, BucketKey};
use crate::source::UNKNOWN_PARTITION;

/// Artifact file extension.
pub const ARTIFACT_EXTENSION: &str = "ndjson.gz";

/// Location of one artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtifactPath {
    pub container: String,
    /// Object key inside the container.
    pub key: String,
}

impl ArtifactPath {
    pub fn for_bucket(key: &BucketKey, bucket: &Bucket) -> Self {
        Self {
            container: key.container.clone(),
            key: object_key(key.hour, &key.partition, bucket.min_offset, bucket.max_offset),
        }
    }
}

impl fmt::Display for ArtifactPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.container, self.key)
    }
}

/// Make a partition id safe to use as a single key segment.
///
/// Applying it to its own output is a no-op.
pub fn partition_segment(partition_id: &str) -> String {
    let segment: String = partition_id
        .trim()
        .chars()
        .map(|c| {
            if c == '/' || c == '\\' || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    match segment.as_str() {
        "" => UNKNOWN_PARTITION.to_string(),
        "." | ".." => segment.replace('.', "_"),
        _ => segment,
    }
}

/// Object key for a bucket.
pub fn object_key(hour: DateTime<Utc>, partition_id: &str, min_offset: u64, max_offset: u64) -> String {
    format!(
        "{}/p={}/part-o{min_offset}-o{max_offset}.{ARTIFACT_EXTENSION}",
        hour.format("y=%Y/m=%m/d=%d/h=%H/m=00"),
        partition_segment(partition_id),
    )
}
