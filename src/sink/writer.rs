//! Idempotent artifact writer.
//!
//! Containers are ensured at most once per process. Concurrent callers for
//! the same container share one creation attempt; a failed attempt is not
//! remembered, so the next caller tries again. Objects are written with an
//! unconditional overwrite at their deterministic path.

use bytes::Bytes;
use dashmap::DashMap;
use object_store::path::Path;
use snafu::prelude::*;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::emit;
use crate::error::{EnsureContainerSnafu, PutObjectSnafu, StorageError, WriteError};
use crate::metrics::events::ContainerEnsured;
use crate::partition::ArtifactPath;
use crate::storage::{ContainerStatus, ContainerStoreRef};

#[derive(Debug)]
pub struct IdempotentWriter {
    store: ContainerStoreRef,
    containers: DashMap<String, Arc<OnceCell<ContainerStatus>>>,
}

impl IdempotentWriter {
    pub fn new(store: ContainerStoreRef) -> Self {
        Self {
            store,
            containers: DashMap::new(),
        }
    }

    pub fn store(&self) -> &ContainerStoreRef {
        &self.store
    }

    /// Number of containers known to exist.
    pub fn known_containers(&self) -> usize {
        self.containers
            .iter()
            .filter(|entry| entry.value().initialized())
            .count()
    }

    /// Make sure `container` exists, creating it on first use.
    pub async fn ensure_container(&self, container: &str) -> Result<ContainerStatus, WriteError> {
        // clone the cell out so the shard lock is released before awaiting
        let cell = self
            .containers
            .entry(container.to_string())
            .or_default()
            .value()
            .clone();

        let status = cell
            .get_or_try_init(|| async move {
                let status = self.store.create_container(container).await?;
                debug!(container, status = status.as_str(), "Container ensured");
                emit!(ContainerEnsured {
                    status: status.as_str(),
                });
                Ok::<_, StorageError>(status)
            })
            .await
            .context(EnsureContainerSnafu { container })?;

        Ok(*status)
    }

    /// Ensure the container, then write `bytes` at `path`.
    pub async fn write(&self, path: &ArtifactPath, bytes: Bytes) -> Result<(), WriteError> {
        self.ensure_container(&path.container).await?;
        self.store
            .put_object(&path.container, &Path::from(path.key.as_str()), bytes)
            .await
            .context(PutObjectSnafu {
                container: &path.container,
                path: &path.key,
            })
    }
}
