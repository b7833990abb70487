//! Configuration parsing.
//!
//! Handles loading configuration from YAML files with environment variable
//! interpolation. Every section has defaults, so an empty `container:` or
//! `compression:` block is valid.

mod vars;

use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use std::collections::HashMap;
use std::path::Path;

use crate::error::{
    ConfigError, EmptyStorageUrlSnafu, EnvInterpolationSnafu, InvalidCompressionLevelSnafu,
    ReadFileSnafu, YamlParseSnafu, ZeroChunkSizeSnafu, ZeroConcurrencySnafu,
};

pub use vars::interpolate;

/// Byte size constants (binary/IEC units).
pub const KB: usize = 1024;
pub const MB: usize = 1024 * KB;

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    #[serde(default)]
    pub container: ContainerConfig,
    #[serde(default)]
    pub compression: CompressionConfig,
    #[serde(default)]
    pub writer: WriterConfig,
}

/// Destination object storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root location under which per-tenant containers live.
    /// Examples: "/var/lib/flurry", "file:///data", "memory://",
    /// "abfss://logs@account.dfs.core.windows.net/archive"
    pub url: String,

    /// Storage options (credentials, region, etc.)
    #[serde(default)]
    pub storage_options: HashMap<String, String>,
}

/// Container naming.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerConfig {
    /// Prefix prepended to every normalized tenant name (default: "logs-").
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
        }
    }
}

fn default_prefix() -> String {
    "logs-".to_string()
}

/// NDJSON.gz encoding of buckets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionConfig {
    /// Maximum serialized-but-uncompressed bytes held before feeding the
    /// encoder (default: 4 MiB).
    #[serde(default = "default_chunk_size_bytes")]
    pub chunk_size_bytes: usize,

    /// Gzip level, 0-9 (default: 6).
    #[serde(default = "default_level")]
    pub level: u32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            chunk_size_bytes: default_chunk_size_bytes(),
            level: default_level(),
        }
    }
}

fn default_chunk_size_bytes() -> usize {
    4 * MB
}

fn default_level() -> u32 {
    6
}

/// Bucket write fan-out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriterConfig {
    /// Maximum buckets compressed and uploaded concurrently (default: 8).
    #[serde(default = "default_max_concurrent_writes")]
    pub max_concurrent_writes: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            max_concurrent_writes: default_max_concurrent_writes(),
        }
    }
}

fn default_max_concurrent_writes() -> usize {
    8
}

impl Config {
    /// Configuration with defaults for everything except the storage URL.
    pub fn with_storage_url(url: impl Into<String>) -> Self {
        Self {
            storage: StorageConfig {
                url: url.into(),
                storage_options: HashMap::new(),
            },
            container: ContainerConfig::default(),
            compression: CompressionConfig::default(),
            writer: WriterConfig::default(),
        }
    }

    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_file_with_options(path, true)
    }

    /// Load configuration from a YAML file with optional environment variable interpolation.
    pub fn from_file_with_options(
        path: impl AsRef<Path>,
        interpolate_env: bool,
    ) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).context(ReadFileSnafu)?;
        Self::from_yaml_with_options(&content, interpolate_env)
    }

    /// Parse configuration from YAML text, interpolating environment variables.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        Self::from_yaml_with_options(content, true)
    }

    fn from_yaml_with_options(content: &str, interpolate_env: bool) -> Result<Self, ConfigError> {
        let content = if interpolate_env {
            interpolate(content).map_err(|errors| {
                EnvInterpolationSnafu {
                    message: errors.join("\n"),
                }
                .build()
            })?
        } else {
            content.to_string()
        };

        let config: Config = serde_yaml::from_str(&content).context(YamlParseSnafu)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure!(!self.storage.url.trim().is_empty(), EmptyStorageUrlSnafu);
        ensure!(
            self.compression.level <= 9,
            InvalidCompressionLevelSnafu {
                level: self.compression.level
            }
        );
        ensure!(self.compression.chunk_size_bytes > 0, ZeroChunkSizeSnafu);
        ensure!(self.writer.max_concurrent_writes > 0, ZeroConcurrencySnafu);
        Ok(())
    }
}
