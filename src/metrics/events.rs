//! Internal events for metrics emission.
//!
//! Each event struct represents a measurable occurrence in the pipeline.
//! Events implement the `InternalEvent` trait which records the
//! corresponding counter, gauge or histogram.

use metrics::{counter, histogram};
use std::time::Duration;
use tracing::trace;

/// Trait for internal events that can be emitted as metrics.
pub trait InternalEvent {
    /// Emit this event as a metric.
    fn emit(self);
}

/// Event emitted when a payload has been normalized into records.
pub struct RecordsNormalized {
    /// Payload shape label (see `PayloadShape::as_str`).
    pub shape: &'static str,
    pub count: u64,
}

impl InternalEvent for RecordsNormalized {
    fn emit(self) {
        trace!(shape = self.shape, count = self.count, "Records normalized");
        counter!("flurry_payloads_total", "shape" => self.shape).increment(1);
        counter!("flurry_records_normalized_total", "shape" => self.shape).increment(self.count);
    }
}

/// Event emitted when no tenant could be extracted from a record.
pub struct UnknownTenant;

impl InternalEvent for UnknownTenant {
    fn emit(self) {
        trace!("Record fell back to unknown tenant");
        counter!("flurry_unknown_tenant_records_total").increment(1);
    }
}

/// Event emitted once a batch has been grouped into buckets.
pub struct BucketsGrouped {
    pub count: u64,
}

impl InternalEvent for BucketsGrouped {
    fn emit(self) {
        trace!(count = self.count, "Buckets grouped");
        counter!("flurry_buckets_grouped_total").increment(self.count);
    }
}

/// Event emitted when a bucket has been compressed.
pub struct BucketCompressed {
    pub uncompressed_bytes: u64,
    pub compressed_bytes: u64,
    pub duration: Duration,
}

impl InternalEvent for BucketCompressed {
    fn emit(self) {
        trace!(
            uncompressed_bytes = self.uncompressed_bytes,
            compressed_bytes = self.compressed_bytes,
            duration_ms = self.duration.as_millis(),
            "Bucket compressed"
        );
        counter!("flurry_uncompressed_bytes_total").increment(self.uncompressed_bytes);
        counter!("flurry_compressed_bytes_total").increment(self.compressed_bytes);
        histogram!("flurry_compression_duration_seconds").record(self.duration.as_secs_f64());
    }
}

/// Outcome of writing one bucket.
#[derive(Debug, Clone, Copy)]
pub enum WriteStatus {
    Success,
    Failed,
}

impl WriteStatus {
    fn as_str(&self) -> &'static str {
        match self {
            WriteStatus::Success => "success",
            WriteStatus::Failed => "failed",
        }
    }
}

/// Event emitted when a bucket write finishes.
pub struct BucketWritten {
    pub status: WriteStatus,
    pub records: u64,
}

impl InternalEvent for BucketWritten {
    fn emit(self) {
        trace!(
            status = self.status.as_str(),
            records = self.records,
            "Bucket written"
        );
        counter!("flurry_buckets_written_total", "status" => self.status.as_str()).increment(1);
        counter!("flurry_records_written_total", "status" => self.status.as_str())
            .increment(self.records);
    }
}

/// Event emitted when a container has been ensured for the first time in
/// this process.
pub struct ContainerEnsured {
    /// Container status label (see `ContainerStatus::as_str`).
    pub status: &'static str,
}

impl InternalEvent for ContainerEnsured {
    fn emit(self) {
        trace!(status = self.status, "Container ensured");
        counter!("flurry_containers_ensured_total", "status" => self.status).increment(1);
    }
}

/// Event emitted when a whole batch has been processed.
pub struct BatchProcessed {
    pub events: u64,
    pub duration: Duration,
}

impl InternalEvent for BatchProcessed {
    fn emit(self) {
        trace!(
            events = self.events,
            duration_ms = self.duration.as_millis(),
            "Batch processed"
        );
        counter!("flurry_events_total").increment(self.events);
        histogram!("flurry_batch_duration_seconds").record(self.duration.as_secs_f64());
    }
}

// ============================================================================
// Storage operation events
// ============================================================================

/// Storage operation types.
#[derive(Debug, Clone, Copy)]
pub enum StorageOperation {
    CreateContainer,
    Put,
    Get,
}

impl StorageOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageOperation::CreateContainer => "create_container",
            StorageOperation::Put => "put",
            StorageOperation::Get => "get",
        }
    }
}

/// Status of a storage request.
#[derive(Debug, Clone, Copy)]
pub enum RequestStatus {
    Success,
    Error,
}

impl RequestStatus {
    pub fn from_result<T, E>(result: &Result<T, E>) -> Self {
        if result.is_ok() {
            RequestStatus::Success
        } else {
            RequestStatus::Error
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Success => "success",
            RequestStatus::Error => "error",
        }
    }
}

/// Event emitted when a storage request completes.
pub struct StorageRequest {
    pub operation: StorageOperation,
    pub status: RequestStatus,
    pub duration: Duration,
}

impl InternalEvent for StorageRequest {
    fn emit(self) {
        trace!(
            operation = self.operation.as_str(),
            status = self.status.as_str(),
            duration_ms = self.duration.as_millis(),
            "Storage request"
        );
        counter!(
            "flurry_storage_requests_total",
            "operation" => self.operation.as_str(),
            "status" => self.status.as_str()
        )
        .increment(1);
        histogram!(
            "flurry_storage_request_duration_seconds",
            "operation" => self.operation.as_str()
        )
        .record(self.duration.as_secs_f64());
    }
}
