//! Google Cloud Storage backend. Tenant containers are prefixes inside the
//! configured bucket.

use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::path::Path;
use object_store::RetryConfig;
use snafu::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::error::{GcsConfigSnafu, StorageError};

use super::{Backing, BackendConfig, StorageProvider, with_options};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcsConfig {
    pub bucket: String,
    pub key: Option<Path>,
}

impl StorageProvider {
    pub(super) async fn construct_gcs(
        config: GcsConfig,
        options: HashMap<String, String>,
    ) -> Result<Self, StorageError> {
        let builder = GoogleCloudStorageBuilder::from_env()
            .with_bucket_name(&config.bucket)
            .with_retry(RetryConfig::default());
        let mut builder = with_options(builder, &options, GoogleCloudStorageBuilder::with_config)
            .context(GcsConfigSnafu)?;

        if let Ok(service_account_key) = std::env::var("GOOGLE_SERVICE_ACCOUNT_KEY") {
            debug!("Using service account key from GOOGLE_SERVICE_ACCOUNT_KEY");
            builder = builder.with_service_account_key(&service_account_key);
        }

        let canonical_url = match &config.key {
            Some(key) => format!("gs://{}/{key}", config.bucket),
            None => format!("gs://{}", config.bucket),
        };
        let store = builder.build().context(GcsConfigSnafu)?;
        Ok(Self::new(
            BackendConfig::Gcs(config),
            Backing::Shared(Arc::new(store)),
            canonical_url,
        ))
    }
}
