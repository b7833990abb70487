//! Local filesystem storage backend implementation.
//!
//! Containers are directories directly under the configured root.

use object_store::ObjectStore;
use object_store::local::LocalFileSystem;
use snafu::prelude::*;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{IoSnafu, ObjectStoreSnafu, StorageError};

use super::{Backing, BackendConfig, ContainerStatus, StorageProvider};

/// Local filesystem configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalConfig {
    /// Absolute root directory.
    pub path: String,
}

impl LocalConfig {
    fn container_dir(&self, container: &str) -> PathBuf {
        PathBuf::from(&self.path).join(container)
    }

    pub(super) async fn create_container_dir(
        &self,
        container: &str,
    ) -> Result<ContainerStatus, StorageError> {
        match tokio::fs::create_dir(self.container_dir(container)).await {
            Ok(()) => Ok(ContainerStatus::Created),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => Ok(ContainerStatus::AlreadyExists),
            Err(source) => Err(StorageError::Io { source }),
        }
    }
}

impl StorageProvider {
    pub(super) async fn construct_local(config: LocalConfig) -> Result<Self, StorageError> {
        tokio::fs::create_dir_all(&config.path)
            .await
            .context(IoSnafu)?;

        let object_store: Arc<dyn ObjectStore> =
            Arc::new(LocalFileSystem::new_with_prefix(&config.path).context(ObjectStoreSnafu)?);

        let canonical_url = format!("file://{}", config.path);

        Ok(Self::new(
            BackendConfig::Local(config),
            Backing::Shared(object_store),
            canonical_url,
        ))
    }
}
