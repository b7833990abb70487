//! Gzip NDJSON encoding of buckets.
//!
//! Records are serialized into a chunk buffer which is fed to the encoder
//! whenever it reaches the configured size, so at most one chunk plus one
//! record is held uncompressed. The gzip header carries no modification
//! time and no file name, which makes the output a pure function of the
//! ordered records and the compression level.

use bytes::{BufMut, Bytes, BytesMut};
use flate2::{Compression, GzBuilder};
use snafu::prelude::*;
use std::io::Write;
use std::time::Instant;

use crate::config::{CompressionConfig, KB};
use crate::emit;
use crate::error::{CompressError, GzipFinishSnafu, GzipWriteSnafu, SerializeRecordSnafu};
use crate::metrics::events::BucketCompressed;
use crate::record::LogRecord;

/// Encoded bucket plus sizes.
#[derive(Debug, Clone)]
pub struct CompressedArtifact {
    pub bytes: Bytes,
    pub uncompressed_bytes: u64,
    pub record_count: usize,
}

/// Encoder settings. Cheap to clone into blocking tasks.
#[derive(Debug, Clone, Copy)]
pub struct NdjsonGzEncoder {
    chunk_size: usize,
    level: Compression,
}

impl NdjsonGzEncoder {
    pub fn new(chunk_size: usize, level: u32) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            level: Compression::new(level.min(9)),
        }
    }

    pub fn from_config(config: &CompressionConfig) -> Self {
        Self::new(config.chunk_size_bytes, config.level)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Encode records, in order, as one gzip member.
    pub fn encode(&self, records: &[LogRecord]) -> Result<CompressedArtifact, CompressError> {
        let start = Instant::now();
        let mut encoder = GzBuilder::new().write(BytesMut::new().writer(), self.level);
        let mut chunk: Vec<u8> = Vec::with_capacity(self.chunk_size.min(64 * KB));
        let mut uncompressed_bytes = 0u64;

        for record in records {
            serde_json::to_writer(&mut chunk, record).context(SerializeRecordSnafu {
                offset: record.offset,
            })?;
            chunk.push(b'\n');

            if chunk.len() >= self.chunk_size {
                uncompressed_bytes += chunk.len() as u64;
                encoder.write_all(&chunk).context(GzipWriteSnafu)?;
                chunk.clear();
            }
        }

        if !chunk.is_empty() {
            uncompressed_bytes += chunk.len() as u64;
            encoder.write_all(&chunk).context(GzipWriteSnafu)?;
        }

        let bytes = encoder.finish().context(GzipFinishSnafu)?.into_inner().freeze();

        emit!(BucketCompressed {
            uncompressed_bytes,
            compressed_bytes: bytes.len() as u64,
            duration: start.elapsed(),
        });

        Ok(CompressedArtifact {
            bytes,
            uncompressed_bytes,
            record_count: records.len(),
        })
    }
}

impl Default for NdjsonGzEncoder {
    fn default() -> Self {
        Self::from_config(&CompressionConfig::default())
    }
}
