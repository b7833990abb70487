//! In-memory storage backend, for tests and dry runs.

use object_store::ObjectStore;
use object_store::memory::InMemory;
use object_store::path::Path;
use std::sync::Arc;

use super::{Backing, BackendConfig, ContainerStatus, StorageProvider};

impl StorageProvider {
    pub(super) fn construct_memory(key: Option<Path>) -> Self {
        let object_store: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
        let canonical_url = match &key {
            Some(key) => format!("memory://{key}"),
            None => "memory://".to_string(),
        };

        Self::new(
            BackendConfig::Memory { key },
            Backing::Shared(object_store),
            canonical_url,
        )
    }

    pub(super) fn register_memory_container(&self, container: &str) -> ContainerStatus {
        if self.memory_containers.insert(container.to_string()) {
            ContainerStatus::Created
        } else {
            ContainerStatus::AlreadyExists
        }
    }
}
