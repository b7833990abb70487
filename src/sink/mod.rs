//! Artifact encoding and persistence.
//!
//! [`NdjsonGzEncoder`] turns one bucket into a gzip NDJSON body and
//! [`IdempotentWriter`] puts it at its deterministic path.

pub mod compress;
pub mod writer;

pub use compress::{CompressedArtifact, NdjsonGzEncoder};
pub use writer::IdempotentWriter;
