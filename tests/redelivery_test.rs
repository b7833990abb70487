//! Partial failure and redelivery tests.
//!
//! A batch whose writes partly fail must report every failed bucket, keep
//! the buckets that succeeded, and converge to the same objects when the
//! batch is delivered again.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use common::{at, event, read_bytes};
use flurry::error::{IngestError, StorageError, WriteError};
use flurry::{Config, ContainerStatus, ContainerStore, IngestContext, RawEvent, StorageProvider};
use object_store::path::Path;

/// Wraps a real store and fails puts into one container while `failing`
/// is set.
#[derive(Debug)]
struct FlakyStore {
    inner: StorageProvider,
    broken_container: String,
    failing: AtomicBool,
    puts: AtomicUsize,
}

impl FlakyStore {
    fn new(broken_container: &str) -> Self {
        Self {
            inner: StorageProvider::in_memory(),
            broken_container: broken_container.to_string(),
            failing: AtomicBool::new(true),
            puts: AtomicUsize::new(0),
        }
    }

    fn heal(&self) {
        self.failing.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl ContainerStore for FlakyStore {
    async fn create_container(&self, container: &str) -> Result<ContainerStatus, StorageError> {
        self.inner.create_container(container).await
    }

    async fn put_object(
        &self,
        container: &str,
        path: &Path,
        bytes: Bytes,
    ) -> Result<(), StorageError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) && container == self.broken_container {
            return Err(StorageError::Io {
                source: std::io::Error::other("injected failure"),
            });
        }
        self.inner.put_object(container, path, bytes).await
    }

    async fn get_object(&self, container: &str, path: &Path) -> Result<Bytes, StorageError> {
        self.inner.get_object(container, path).await
    }
}

fn batch() -> Vec<RawEvent> {
    let mut events = Vec::new();
    for offset in 0..12u64 {
        let tenant = match offset % 3 {
            0 => "good.example.com",
            1 => "bad.example.com",
            _ => "other.example.com",
        };
        events.push(event(
            &(offset % 2).to_string(),
            offset,
            at(8, offset as u32),
            &format!(r#"{{"message":"request {offset}","X-Forwarded-Host":"{tenant}"}}"#),
        ));
    }
    events
}

#[tokio::test]
async fn test_failed_buckets_are_reported_and_others_written() {
    let store = Arc::new(FlakyStore::new("logs-bad-example-com"));
    let ctx = IngestContext::with_store(Config::with_storage_url("memory://"), store.clone());

    let err = ctx.process_batch(&batch()).await.unwrap_err();
    let (failures, succeeded) = match err {
        IngestError::BucketWrites {
            failures,
            succeeded,
        } => (failures, succeeded),
        other => panic!("expected bucket write failures, got {other:?}"),
    };

    // 3 tenants x 2 partitions
    assert_eq!(failures.len(), 2);
    assert_eq!(succeeded, 4);
    assert_eq!(store.puts.load(Ordering::SeqCst), 6);
    for failure in &failures {
        assert_eq!(failure.container, "logs-bad-example-com");
        assert_eq!(failure.record_count, 2);
        assert!(matches!(failure.error, WriteError::PutObject { .. }));
    }
    let keys: Vec<_> = failures.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(
        keys,
        vec![
            "y=2026/m=01/d=28/h=08/m=00/p=0/part-o4-o10.ndjson.gz",
            "y=2026/m=01/d=28/h=08/m=00/p=1/part-o1-o7.ndjson.gz",
        ]
    );
}

#[tokio::test]
async fn test_redelivery_after_partial_failure_converges() {
    let store = Arc::new(FlakyStore::new("logs-bad-example-com"));
    let ctx = IngestContext::with_store(Config::with_storage_url("memory://"), store.clone());
    let events = batch();

    assert!(ctx.process_batch(&events).await.is_err());
    let planned = ctx.plan(&events);

    let mut before = Vec::new();
    for artifact in &planned {
        if artifact.path.container != "logs-bad-example-com" {
            before.push(read_bytes(store.as_ref(), &artifact.path).await);
        }
    }

    store.heal();
    let summary = ctx.process_batch(&events).await.unwrap();
    assert_eq!(summary.artifacts.len(), 6);

    let mut after = Vec::new();
    for artifact in &planned {
        if artifact.path.container != "logs-bad-example-com" {
            after.push(read_bytes(store.as_ref(), &artifact.path).await);
        }
    }
    assert_eq!(before, after);

    // reference run against a store that never failed
    let clean = Arc::new(StorageProvider::in_memory());
    let clean_ctx = IngestContext::with_store(Config::with_storage_url("memory://"), clean.clone());
    clean_ctx.process_batch(&events).await.unwrap();
    for artifact in &planned {
        assert_eq!(
            read_bytes(store.as_ref(), &artifact.path).await,
            read_bytes(clean.as_ref(), &artifact.path).await,
            "{}",
            artifact.path
        );
    }
}

#[tokio::test]
async fn test_container_cache_survives_batches() {
    let store = Arc::new(StorageProvider::in_memory());
    let ctx = IngestContext::with_store(Config::with_storage_url("memory://"), store.clone());

    ctx.process_batch(&batch()).await.unwrap();
    assert_eq!(ctx.writer().known_containers(), 3);

    // containers exist on the backend, so a fresh process sees them as present
    let fresh = IngestContext::with_store(Config::with_storage_url("memory://"), store.clone());
    let status = fresh
        .writer()
        .ensure_container("logs-good-example-com")
        .await
        .unwrap();
    assert_eq!(status, ContainerStatus::AlreadyExists);
}

#[tokio::test]
async fn test_single_writer_concurrency_is_equivalent() {
    let events = batch();

    let parallel = Arc::new(StorageProvider::in_memory());
    let parallel_ctx =
        IngestContext::with_store(Config::with_storage_url("memory://"), parallel.clone());
    let parallel_summary = parallel_ctx.process_batch(&events).await.unwrap();

    let mut config = Config::with_storage_url("memory://");
    config.writer.max_concurrent_writes = 1;
    let serial = Arc::new(StorageProvider::in_memory());
    let serial_ctx = IngestContext::with_store(config, serial.clone());
    let serial_summary = serial_ctx.process_batch(&events).await.unwrap();

    assert_eq!(parallel_summary.artifacts, serial_summary.artifacts);
    for artifact in &serial_summary.artifacts {
        assert_eq!(
            read_bytes(parallel.as_ref(), &artifact.path).await,
            read_bytes(serial.as_ref(), &artifact.path).await
        );
    }
}
