//! Multi-cloud storage abstraction.
//!
//! Artifacts are written into per-tenant containers. [`ContainerStore`] is
//! the seam the writer talks to; [`StorageProvider`] implements it over
//! `object_store` for S3, GCS, Azure Blob Storage, the local filesystem and
//! an in-memory store.
//!
//! On the local filesystem a container is a directory under the configured
//! root. In memory a container is a registered name. Given an Azure account
//! URL, a container is a blob container of that account. On S3, GCS and
//! Azure URLs naming a container, a container is a top-level prefix under
//! the configured location, so it needs no provisioning.

mod azure;
mod gcs;
mod local;
mod memory;
mod s3;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashSet;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use regex::Regex;
use snafu::prelude::*;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, LazyLock};
use std::time::Instant;

use crate::container::is_legal;
use crate::emit;
use crate::error::{InvalidContainerSnafu, InvalidUrlSnafu, ObjectStoreSnafu, StorageError};
use crate::metrics::events::{RequestStatus, StorageOperation, StorageRequest};

pub use azure::AzureConfig;
pub use gcs::GcsConfig;
pub use local::LocalConfig;
pub use s3::S3Config;

/// Outcome of a container creation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerStatus {
    /// The container did not exist and was created.
    Created,
    /// The container already existed.
    AlreadyExists,
    /// The backend has no container to create.
    Implicit,
}

impl ContainerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerStatus::Created => "created",
            ContainerStatus::AlreadyExists => "already_exists",
            ContainerStatus::Implicit => "implicit",
        }
    }
}

/// Container-addressed object storage.
#[async_trait]
pub trait ContainerStore: Send + Sync + std::fmt::Debug {
    /// Create `container` if it does not exist. An existing container is
    /// success.
    async fn create_container(&self, container: &str) -> Result<ContainerStatus, StorageError>;

    /// Write `bytes` at `path` inside `container`, replacing any existing
    /// object. Readers never observe a partial object.
    async fn put_object(
        &self,
        container: &str,
        path: &Path,
        bytes: Bytes,
    ) -> Result<(), StorageError>;

    /// Read the object at `path` inside `container`.
    async fn get_object(&self, container: &str, path: &Path) -> Result<Bytes, StorageError>;
}

/// A reference-counted container store.
pub type ContainerStoreRef = Arc<dyn ContainerStore>;

/// Storage provider that abstracts over different storage backends.
pub struct StorageProvider {
    config: BackendConfig,
    backing: Backing,
    canonical_url: String,
    /// Containers registered on the in-memory backend.
    memory_containers: DashSet<String>,
}

/// Where container objects live.
enum Backing {
    /// One object store; containers are its top-level directories.
    Shared(Arc<dyn ObjectStore>),
    /// One Azure blob container per container.
    AzureAccount(azure::AzureAccount),
}

/// Apply string storage options to an object_store builder.
fn with_options<B, K: FromStr>(
    builder: B,
    options: &HashMap<String, String>,
    apply: impl Fn(B, K, String) -> B,
) -> Result<B, K::Err> {
    options
        .iter()
        .try_fold(builder, |builder, (key, value)| {
            Ok(apply(builder, key.parse()?, value.clone()))
        })
}

impl std::fmt::Debug for StorageProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StorageProvider<{}>", self.canonical_url)
    }
}

// URL patterns for different storage backends
const S3_PATH: &str =
    r"^https://s3\.(?P<region>[\w\-]+)\.amazonaws\.com/(?P<bucket>[a-z0-9\-\.]+)(/(?P<key>.+))?$";
const S3_VIRTUAL: &str =
    r"^https://(?P<bucket>[a-z0-9\-\.]+)\.s3\.(?P<region>[\w\-]+)\.amazonaws\.com(/(?P<key>.+))?$";
const S3_URL: &str = r"^[sS]3[aA]?://(?P<bucket>[a-z0-9\-\.]+)(/(?P<key>.+))?$";
const S3_ENDPOINT_URL: &str = r"^[sS]3[aA]?::(?<protocol>https?)://(?P<endpoint>[^:/]+):(?<port>\d+)/(?P<bucket>[a-z0-9\-\.]+)(/(?P<key>.+))?$";

const GCS_VIRTUAL: &str =
    r"^https://(?P<bucket>[a-z0-9\-_\.]+)\.storage\.googleapis\.com(/(?P<key>.+))?$";
const GCS_PATH: &str =
    r"^https://storage\.googleapis\.com/(?P<bucket>[a-z0-9\-_\.]+)(/(?P<key>.+))?$";
const GCS_URL: &str = r"^[gG][sS]://(?P<bucket>[a-z0-9\-\._]+)(/(?P<key>.+))?$";

const ABFS_URL: &str = r"^abfss?://(?P<container>[a-z0-9\-]+)@(?P<account>[a-z0-9]+)\.dfs\.core\.windows\.net(/(?P<key>.+))?$";
const AZURE_ACCOUNT: &str =
    r"^https://(?P<account>[a-z0-9]+)\.(blob|dfs)\.core\.windows\.net/?$";
const AZURE_HTTPS: &str = r"^https://(?P<account>[a-z0-9]+)\.(blob|dfs)\.core\.windows\.net/(?P<container>[a-z0-9\-]+)(/(?P<key>.+))?$";

const MEMORY_URL: &str = r"^memory://(?P<key>.*)$";

const FILE_URI: &str = r"^file://(?P<path>.*)$";
const FILE_URL: &str = r"^file:(?P<path>.*)$";
const FILE_PATH: &str = r"^/(?P<path>.*)$";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    S3,
    Gcs,
    Azure,
    Memory,
    Local,
}

/// Matchers in priority order.
static MATCHERS: LazyLock<Vec<(Backend, Vec<Regex>)>> = LazyLock::new(|| {
    let compile = |patterns: &[&str]| {
        patterns
            .iter()
            .map(|p| Regex::new(p).expect("storage URL pattern compiles"))
            .collect::<Vec<_>>()
    };
    vec![
        (
            Backend::S3,
            compile(&[S3_PATH, S3_VIRTUAL, S3_ENDPOINT_URL, S3_URL]),
        ),
        (Backend::Gcs, compile(&[GCS_PATH, GCS_VIRTUAL, GCS_URL])),
        (Backend::Azure, compile(&[ABFS_URL, AZURE_ACCOUNT, AZURE_HTTPS])),
        (Backend::Memory, compile(&[MEMORY_URL])),
        (Backend::Local, compile(&[FILE_URI, FILE_URL, FILE_PATH])),
    ]
});

/// Backend configuration enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    S3(S3Config),
    Gcs(GcsConfig),
    Azure(AzureConfig),
    Local(LocalConfig),
    Memory { key: Option<Path> },
}

fn captured<'a>(matches: &regex::Captures<'a>, name: &str) -> Result<&'a str, StorageError> {
    matches
        .name(name)
        .map(|m| m.as_str())
        .context(InvalidUrlSnafu {
            url: matches.get(0).map(|m| m.as_str()).unwrap_or_default(),
        })
}

fn optional_key(matches: &regex::Captures) -> Option<Path> {
    matches
        .name("key")
        .map(|m| m.as_str())
        .filter(|k| !k.is_empty())
        .map(Path::from)
}

impl BackendConfig {
    /// Parse a URL into a backend configuration.
    pub fn parse_url(url: &str) -> Result<Self, StorageError> {
        for (backend, patterns) in MATCHERS.iter() {
            if let Some(matches) = patterns.iter().find_map(|r| r.captures(url)) {
                return match backend {
                    Backend::S3 => Self::parse_s3(&matches),
                    Backend::Gcs => Self::parse_gcs(&matches),
                    Backend::Azure => Self::parse_azure(&matches),
                    Backend::Memory => Ok(BackendConfig::Memory {
                        key: optional_key(&matches),
                    }),
                    Backend::Local => Self::parse_local(&matches),
                };
            }
        }

        InvalidUrlSnafu { url }.fail()
    }

    fn parse_s3(matches: &regex::Captures) -> Result<Self, StorageError> {
        let bucket = captured(matches, "bucket")?.to_string();

        let region = std::env::var("AWS_DEFAULT_REGION")
            .ok()
            .or_else(|| matches.name("region").map(|m| m.as_str().to_string()));

        let endpoint = std::env::var("AWS_ENDPOINT").ok().or_else(|| {
            matches.name("endpoint").map(|endpoint| {
                let port = matches
                    .name("port")
                    .and_then(|p| p.as_str().parse::<u16>().ok())
                    .unwrap_or(443);
                let protocol = matches
                    .name("protocol")
                    .map(|p| p.as_str())
                    .unwrap_or("https");
                format!("{}://{}:{}", protocol, endpoint.as_str(), port)
            })
        });

        Ok(BackendConfig::S3(S3Config {
            endpoint,
            region,
            bucket,
            key: optional_key(matches),
        }))
    }

    fn parse_gcs(matches: &regex::Captures) -> Result<Self, StorageError> {
        Ok(BackendConfig::Gcs(GcsConfig {
            bucket: captured(matches, "bucket")?.to_string(),
            key: optional_key(matches),
        }))
    }

    fn parse_azure(matches: &regex::Captures) -> Result<Self, StorageError> {
        Ok(BackendConfig::Azure(AzureConfig {
            account: captured(matches, "account")?.to_string(),
            container: matches.name("container").map(|m| m.as_str().to_string()),
            key: optional_key(matches),
        }))
    }

    fn parse_local(matches: &regex::Captures) -> Result<Self, StorageError> {
        let path = captured(matches, "path")?;
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        let path = match path.trim_end_matches('/') {
            "" => "/".to_string(),
            trimmed => trimmed.to_string(),
        };

        Ok(BackendConfig::Local(LocalConfig { path }))
    }

    /// Key prefix under which containers are placed.
    pub(crate) fn key(&self) -> Option<&Path> {
        match self {
            BackendConfig::S3(s3) => s3.key.as_ref(),
            BackendConfig::Gcs(gcs) => gcs.key.as_ref(),
            BackendConfig::Azure(azure) => azure.key.as_ref(),
            BackendConfig::Memory { key } => key.as_ref(),
            BackendConfig::Local(_) => None,
        }
    }
}

impl StorageProvider {
    fn new(config: BackendConfig, backing: Backing, canonical_url: String) -> Self {
        Self {
            config,
            backing,
            canonical_url,
            memory_containers: DashSet::new(),
        }
    }

    /// Create a storage provider for the given URL with storage options.
    pub async fn for_url_with_options(
        url: &str,
        options: HashMap<String, String>,
    ) -> Result<Self, StorageError> {
        let config = BackendConfig::parse_url(url)?;

        match config {
            BackendConfig::S3(config) => Self::construct_s3(config, options).await,
            BackendConfig::Gcs(config) => Self::construct_gcs(config, options).await,
            BackendConfig::Azure(config) => Self::construct_azure(config, options).await,
            BackendConfig::Local(config) => Self::construct_local(config).await,
            BackendConfig::Memory { key } => Ok(Self::construct_memory(key)),
        }
    }

    /// Create a storage provider for the given URL.
    pub async fn for_url(url: &str) -> Result<Self, StorageError> {
        Self::for_url_with_options(url, HashMap::new()).await
    }

    /// An empty in-memory provider.
    pub fn in_memory() -> Self {
        Self::construct_memory(None)
    }

    /// Canonical URL of the storage location.
    pub fn canonical_url(&self) -> &str {
        &self.canonical_url
    }

    /// Qualify a container-relative path with the key prefix and container.
    pub fn qualify_path(&self, container: &str, path: &Path) -> Path {
        let container = Path::from(container);
        match self.config.key() {
            Some(prefix) => prefix
                .parts()
                .chain(container.parts())
                .chain(path.parts())
                .collect(),
            None => container.parts().chain(path.parts()).collect(),
        }
    }

    /// Object store and object location for `path` inside `container`.
    fn locate(
        &self,
        container: &str,
        path: &Path,
    ) -> Result<(Arc<dyn ObjectStore>, Path), StorageError> {
        match &self.backing {
            Backing::Shared(store) => Ok((store.clone(), self.qualify_path(container, path))),
            Backing::AzureAccount(account) => {
                let store: Arc<dyn ObjectStore> = account.store(container)?;
                Ok((store, path.clone()))
            }
        }
    }

    async fn create(&self, container: &str) -> Result<ContainerStatus, StorageError> {
        if let Backing::AzureAccount(account) = &self.backing {
            return account.create_container(container).await;
        }
        match &self.config {
            BackendConfig::Local(config) => config.create_container_dir(container).await,
            BackendConfig::Memory { .. } => Ok(self.register_memory_container(container)),
            BackendConfig::S3(_) | BackendConfig::Gcs(_) | BackendConfig::Azure(_) => {
                Ok(ContainerStatus::Implicit)
            }
        }
    }
}

fn check_container(container: &str) -> Result<(), StorageError> {
    ensure!(is_legal(container), InvalidContainerSnafu { name: container });
    Ok(())
}

#[async_trait]
impl ContainerStore for StorageProvider {
    async fn create_container(&self, container: &str) -> Result<ContainerStatus, StorageError> {
        check_container(container)?;
        let start = Instant::now();
        let result = self.create(container).await;
        emit!(StorageRequest {
            operation: StorageOperation::CreateContainer,
            status: RequestStatus::from_result(&result),
            duration: start.elapsed(),
        });
        result
    }

    async fn put_object(
        &self,
        container: &str,
        path: &Path,
        bytes: Bytes,
    ) -> Result<(), StorageError> {
        check_container(container)?;
        let (store, location) = self.locate(container, path)?;
        let start = Instant::now();
        let result = store.put(&location, PutPayload::from(bytes)).await;
        emit!(StorageRequest {
            operation: StorageOperation::Put,
            status: RequestStatus::from_result(&result),
            duration: start.elapsed(),
        });

        result.context(ObjectStoreSnafu)?;
        Ok(())
    }

    async fn get_object(&self, container: &str, path: &Path) -> Result<Bytes, StorageError> {
        check_container(container)?;
        let (store, location) = self.locate(container, path)?;
        let start = Instant::now();
        let result = store.get(&location).await;
        emit!(StorageRequest {
            operation: StorageOperation::Get,
            status: RequestStatus::from_result(&result),
            duration: start.elapsed(),
        });

        let bytes = result
            .context(ObjectStoreSnafu)?
            .bytes()
            .await
            .context(ObjectStoreSnafu)?;
        Ok(bytes)
    }
}
