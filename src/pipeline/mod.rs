//! Batch ingestion.
//!
//! One invocation processes one batch:
//! - normalize every event into log records (synchronous)
//! - group the records into buckets, scanning the whole batch first
//! - compress each bucket on the blocking thread pool and write it,
//!   with up to `writer.max_concurrent_writes` buckets in flight
//!
//! Every bucket's outcome is collected independently. A failed bucket does
//! not stop the others, and rerunning the same batch rewrites the same
//! objects with the same bytes.

use futures::stream::{self, StreamExt};
use snafu::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::emit;
use crate::error::{
    BucketFailure, BucketWritesSnafu, CompressJoinSnafu, CompressSnafu, IngestError, WriteError,
};
use crate::metrics::events::{BatchProcessed, BucketWritten, BucketsGrouped, WriteStatus};
use crate::normalize::normalize_event;
use crate::partition::{ArtifactPath, Bucket, Buckets, PartitionGrouper};
use crate::record::LogRecord;
use crate::sink::{CompressedArtifact, IdempotentWriter, NdjsonGzEncoder};
use crate::source::RawEvent;
use crate::storage::{ContainerStoreRef, StorageProvider};

/// An artifact the batch will produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedArtifact {
    pub path: ArtifactPath,
    pub record_count: usize,
    pub min_offset: u64,
    pub max_offset: u64,
}

/// An artifact that was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenArtifact {
    pub path: ArtifactPath,
    pub record_count: usize,
    pub uncompressed_bytes: u64,
    pub compressed_bytes: usize,
}

/// Outcome of a fully successful batch.
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub events: usize,
    pub records: usize,
    /// Written artifacts, sorted by container and key.
    pub artifacts: Vec<WrittenArtifact>,
}

/// Process-lifetime ingestion state: configuration, storage handle and the
/// container cache. Shared by reference across invocations.
#[derive(Debug)]
pub struct IngestContext {
    config: Config,
    writer: IdempotentWriter,
    encoder: NdjsonGzEncoder,
}

impl IngestContext {
    /// Validate the configuration and connect to the configured storage.
    pub async fn from_config(config: Config) -> Result<Self, IngestError> {
        config.validate()?;
        let storage = StorageProvider::for_url_with_options(
            &config.storage.url,
            config.storage.storage_options.clone(),
        )
        .await?;
        info!(storage = storage.canonical_url(), "Connected to storage");

        Ok(Self::with_store(config, Arc::new(storage)))
    }

    /// Build a context over an existing store.
    pub fn with_store(config: Config, store: ContainerStoreRef) -> Self {
        let encoder = NdjsonGzEncoder::from_config(&config.compression);
        Self {
            config,
            writer: IdempotentWriter::new(store),
            encoder,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn writer(&self) -> &IdempotentWriter {
        &self.writer
    }

    /// Normalize every event of a batch, in order.
    pub fn normalize(&self, events: &[RawEvent]) -> Vec<LogRecord> {
        events.iter().flat_map(normalize_event).collect()
    }

    fn group(&self, events: &[RawEvent]) -> Buckets {
        let mut grouper = PartitionGrouper::new(self.config.container.prefix.as_str());
        for event in events {
            grouper.extend(normalize_event(event));
        }
        debug!(
            events = events.len(),
            records = grouper.record_count(),
            buckets = grouper.bucket_count(),
            "Batch grouped"
        );
        emit!(BucketsGrouped {
            count: grouper.bucket_count() as u64,
        });
        grouper.finish()
    }

    /// Artifacts the batch would produce, in first-seen bucket order.
    /// Nothing is written.
    pub fn plan(&self, events: &[RawEvent]) -> Vec<PlannedArtifact> {
        self.group(events)
            .iter()
            .map(|(key, bucket)| PlannedArtifact {
                path: ArtifactPath::for_bucket(key, bucket),
                record_count: bucket.len(),
                min_offset: bucket.min_offset,
                max_offset: bucket.max_offset,
            })
            .collect()
    }

    /// Ingest one batch.
    ///
    /// Returns [`IngestError::BucketWrites`] if any bucket failed. Buckets
    /// that succeeded stay written.
    pub async fn process_batch(&self, events: &[RawEvent]) -> Result<BatchSummary, IngestError> {
        let start = Instant::now();
        let buckets = self.group(events);
        let records: usize = buckets.values().map(Bucket::len).sum();
        let concurrency = self.config.writer.max_concurrent_writes.max(1);

        let results: Vec<Result<WrittenArtifact, BucketFailure>> = stream::iter(buckets)
            .map(|(key, bucket)| {
                let path = ArtifactPath::for_bucket(&key, &bucket);
                self.write_bucket(path, bucket)
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut artifacts = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for result in results {
            match result {
                Ok(artifact) => artifacts.push(artifact),
                Err(failure) => failures.push(failure),
            }
        }
        artifacts.sort_by(|a, b| a.path.cmp(&b.path));

        emit!(BatchProcessed {
            events: events.len() as u64,
            duration: start.elapsed(),
        });

        if !failures.is_empty() {
            failures.sort_by(|a, b| (&a.container, &a.path).cmp(&(&b.container, &b.path)));
            for failure in &failures {
                error!(
                    container = %failure.container,
                    path = %failure.path,
                    records = failure.record_count,
                    "Bucket write failed: {}",
                    failure.error
                );
            }
            return BucketWritesSnafu {
                failures,
                succeeded: artifacts.len(),
            }
            .fail();
        }

        info!(
            events = events.len(),
            records,
            artifacts = artifacts.len(),
            duration_ms = start.elapsed().as_millis(),
            "Batch ingested"
        );

        Ok(BatchSummary {
            events: events.len(),
            records,
            artifacts,
        })
    }

    async fn write_bucket(
        &self,
        path: ArtifactPath,
        bucket: Bucket,
    ) -> Result<WrittenArtifact, BucketFailure> {
        let record_count = bucket.len();
        let result = self.compress_and_write(&path, bucket).await;

        let status = if result.is_ok() {
            WriteStatus::Success
        } else {
            WriteStatus::Failed
        };
        emit!(BucketWritten {
            status,
            records: record_count as u64,
        });

        match result {
            Ok(compressed) => {
                debug!(
                    path = %path,
                    records = record_count,
                    bytes = compressed.bytes.len(),
                    "Bucket written"
                );
                Ok(WrittenArtifact {
                    record_count,
                    uncompressed_bytes: compressed.uncompressed_bytes,
                    compressed_bytes: compressed.bytes.len(),
                    path,
                })
            }
            Err(error) => Err(BucketFailure {
                container: path.container,
                path: path.key,
                record_count,
                error,
            }),
        }
    }

    async fn compress_and_write(
        &self,
        path: &ArtifactPath,
        bucket: Bucket,
    ) -> Result<CompressedArtifact, WriteError> {
        let encoder = self.encoder;
        let compressed = tokio::task::spawn_blocking(move || encoder.encode(&bucket.records))
            .await
            .context(CompressJoinSnafu)?
            .context(CompressSnafu)?;

        self.writer.write(path, compressed.bytes.clone()).await?;
        Ok(compressed)
    }
}
