//! flurry: batch ingestion of diagnostic logs into per-tenant object storage.
//!
//! Each batch of streaming events is normalized into uniform log records,
//! grouped by tenant, hour and source partition, and written as gzip NDJSON
//! artifacts at paths derived from each group's offset range. Redelivering
//! a batch rewrites the same objects with the same bytes.
//!
//! # Example
//!
//! ```ignore
//! use flurry::{Config, IngestContext, error::IngestError, source::read_batch_file};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), IngestError> {
//!     let config = Config::from_file("config.yaml")?;
//!     let ctx = IngestContext::from_config(config).await?;
//!     let events = read_batch_file("batch.ndjson")?;
//!     let summary = ctx.process_batch(&events).await?;
//!     println!("Wrote {} artifacts", summary.artifacts.len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod container;
pub mod error;
pub mod metrics;
pub mod normalize;
pub mod partition;
pub mod pipeline;
pub mod record;
pub mod sink;
pub mod source;
pub mod storage;

// Re-export main types
pub use config::Config;
pub use pipeline::{BatchSummary, IngestContext, PlannedArtifact, WrittenArtifact};
pub use record::LogRecord;
pub use source::{EventMetadata, RawEvent};
pub use storage::{ContainerStatus, ContainerStore, ContainerStoreRef, StorageProvider};
