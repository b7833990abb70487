//! Error types for flurry using snafu.
//!
//! This module defines structured error types with context selectors for
//! all error conditions in the codebase. Normalization and tenant extraction
//! are total and have no error type of their own.

use snafu::prelude::*;

// ============ Storage Errors ============

/// Errors that can occur during storage operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StorageError {
    /// Invalid storage URL format.
    #[snafu(display("Invalid storage URL: {url}"))]
    InvalidUrl { url: String },

    /// Object store operation failed.
    #[snafu(display("Storage operation failed: {source}"))]
    ObjectStore { source: object_store::Error },

    /// IO error during storage operations.
    #[snafu(display("IO error: {source}"))]
    Io { source: std::io::Error },

    /// S3 configuration error.
    #[snafu(display("S3 configuration error: {source}"))]
    S3Config { source: object_store::Error },

    /// GCS configuration error.
    #[snafu(display("GCS configuration error: {source}"))]
    GcsConfig { source: object_store::Error },

    /// Azure configuration error.
    #[snafu(display("Azure configuration error: {source}"))]
    AzureConfig { source: object_store::Error },

    /// Container name rejected by the backend.
    #[snafu(display("Invalid container name: {name}"))]
    InvalidContainer { name: String },

    /// The configured Azure account key cannot be used for signing.
    #[snafu(display("Invalid Azure account key: {message}"))]
    AzureAccountKey { message: String },

    /// The Azure credential cannot authorize container management.
    #[snafu(display(
        "Azure access key credentials must be configured through azure_storage_account_key"
    ))]
    AzureCredential,

    /// The container management request could not be sent.
    #[snafu(display("Azure request for container {container} failed: {source}"))]
    AzureRequest {
        container: String,
        source: reqwest::Error,
    },

    /// Azure refused to create a container.
    #[snafu(display("Creating Azure container {container} failed: {status} {code}"))]
    AzureContainer {
        container: String,
        status: u16,
        code: String,
    },
}

impl StorageError {
    /// Check if this error represents a "not found" condition (404, NoSuchKey, etc.)
    pub fn is_not_found(&self) -> bool {
        match self {
            StorageError::ObjectStore { source } => {
                matches!(source, object_store::Error::NotFound { .. })
            }
            _ => false,
        }
    }
}

// ============ Config Errors ============

/// Errors that can occur during configuration parsing and validation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    /// Storage URL is empty.
    #[snafu(display("Storage URL cannot be empty"))]
    EmptyStorageUrl,

    /// Compression level out of range.
    #[snafu(display("Compression level must be between 0 and 9, got {level}"))]
    InvalidCompressionLevel { level: u32 },

    /// Chunk size is zero.
    #[snafu(display("Compression chunk size must be greater than zero"))]
    ZeroChunkSize,

    /// Write concurrency is zero.
    #[snafu(display("max_concurrent_writes must be greater than zero"))]
    ZeroConcurrency,

    /// Environment variable interpolation failed.
    #[snafu(display("Environment variable interpolation failed:\n{message}"))]
    EnvInterpolation { message: String },

    /// Failed to parse YAML configuration.
    #[snafu(display("Failed to parse YAML: {source}"))]
    YamlParse { source: serde_yaml::Error },

    /// Failed to read configuration file.
    #[snafu(display("Failed to read configuration file: {source}"))]
    ReadFile { source: std::io::Error },
}

// ============ Metadata Errors ============

/// Errors that can occur while resolving event metadata from trigger properties.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum MetadataError {
    /// No offset property was present.
    #[snafu(display("Event has no offset property"))]
    MissingOffset,

    /// Offset property was present but not an unsigned integer.
    #[snafu(display("Event offset is not numeric: {value}"))]
    InvalidOffset { value: String },

    /// Sequence number property was present but not an unsigned integer.
    #[snafu(display("Event sequence number is not numeric: {value}"))]
    InvalidSequenceNumber { value: String },

    /// No enqueued time property was present.
    #[snafu(display("Event has no enqueued time property"))]
    MissingEnqueuedTime,

    /// Enqueued time was neither RFC 3339 nor epoch milliseconds.
    #[snafu(display("Event enqueued time is not a timestamp: {value}"))]
    InvalidEnqueuedTime { value: String },
}

// ============ Batch File Errors ============

/// Errors that can occur while reading a batch file for replay.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum BatchFileError {
    /// Failed to read the batch file.
    #[snafu(display("Failed to read batch file: {source}"))]
    BatchRead { source: std::io::Error },

    /// A line was not a valid event envelope.
    #[snafu(display("Invalid event on line {line}: {source}"))]
    EventParse {
        line: usize,
        source: serde_json::Error,
    },

    /// A line's metadata could not be resolved.
    #[snafu(display("Invalid event metadata on line {line}: {source}"))]
    EventMetadata { line: usize, source: MetadataError },
}

// ============ Compression Errors ============

/// Errors that can occur while serializing and compressing a bucket.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CompressError {
    /// Failed to serialize a record to JSON.
    #[snafu(display("Failed to serialize record at offset {offset}: {source}"))]
    SerializeRecord {
        offset: u64,
        source: serde_json::Error,
    },

    /// Failed to feed a chunk to the gzip encoder.
    #[snafu(display("Failed to compress chunk: {source}"))]
    GzipWrite { source: std::io::Error },

    /// Failed to finalize the gzip stream.
    #[snafu(display("Failed to finalize gzip stream: {source}"))]
    GzipFinish { source: std::io::Error },
}

// ============ Write Errors ============

/// Errors that can occur while persisting one bucket.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum WriteError {
    /// Container creation failed.
    #[snafu(display("Failed to ensure container {container}: {source}"))]
    EnsureContainer {
        container: String,
        source: StorageError,
    },

    /// Object upload failed.
    #[snafu(display("Failed to write {container}/{path}: {source}"))]
    PutObject {
        container: String,
        path: String,
        source: StorageError,
    },

    /// Bucket compression failed.
    #[snafu(display("Failed to compress bucket: {source}"))]
    Compress { source: CompressError },

    /// Compression task panicked or was cancelled.
    #[snafu(display("Compression task failed: {source}"))]
    CompressJoin { source: tokio::task::JoinError },
}

// ============ Ingest Error (top-level) ============

/// A bucket that could not be persisted, with the reason.
#[derive(Debug)]
pub struct BucketFailure {
    /// Container the bucket was destined for.
    pub container: String,
    /// Object path the bucket was destined for.
    pub path: String,
    /// Number of records in the bucket.
    pub record_count: usize,
    /// Why the write failed.
    pub error: WriteError,
}

impl std::fmt::Display for BucketFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} ({} records): {}",
            self.container, self.path, self.record_count, self.error
        )
    }
}

/// Top-level errors surfaced to the invocation caller.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum IngestError {
    /// Configuration error.
    #[snafu(display("Configuration error: {source}"))]
    Config { source: ConfigError },

    /// Storage setup error.
    #[snafu(display("Storage error: {source}"))]
    Storage { source: StorageError },

    /// Batch file error.
    #[snafu(display("Batch file error: {source}"))]
    BatchFile { source: BatchFileError },

    /// One or more buckets failed to persist; the others were written.
    #[snafu(display(
        "{} of {} bucket(s) failed to write:\n{}",
        failures.len(),
        failures.len() + succeeded,
        failures.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n")
    ))]
    BucketWrites {
        failures: Vec<BucketFailure>,
        succeeded: usize,
    },
}

impl From<ConfigError> for IngestError {
    fn from(source: ConfigError) -> Self {
        IngestError::Config { source }
    }
}

impl From<StorageError> for IngestError {
    fn from(source: StorageError) -> Self {
        IngestError::Storage { source }
    }
}

impl From<BatchFileError> for IngestError {
    fn from(source: BatchFileError) -> Self {
        IngestError::BatchFile { source }
    }
}
