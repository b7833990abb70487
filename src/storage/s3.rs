//! S3 backend. Tenant containers are prefixes inside the configured bucket.

use object_store::aws::AmazonS3Builder;
use object_store::path::Path;
use object_store::RetryConfig;
use snafu::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{S3ConfigSnafu, StorageError};

use super::{Backing, BackendConfig, StorageProvider, with_options};

/// S3 storage configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Config {
    /// Custom endpoint, for S3-compatible stores.
    pub endpoint: Option<String>,
    pub region: Option<String>,
    pub bucket: String,
    pub key: Option<Path>,
}

impl S3Config {
    fn canonical_url(&self) -> String {
        let base = match (&self.endpoint, &self.region) {
            (Some(endpoint), _) => format!("s3::{endpoint}/{}", self.bucket),
            (None, Some(region)) => format!("https://s3.{region}.amazonaws.com/{}", self.bucket),
            (None, None) => format!("https://s3.amazonaws.com/{}", self.bucket),
        };
        match &self.key {
            Some(key) => format!("{base}/{key}"),
            None => base,
        }
    }
}

impl StorageProvider {
    pub(super) async fn construct_s3(
        config: S3Config,
        options: HashMap<String, String>,
    ) -> Result<Self, StorageError> {
        let builder = AmazonS3Builder::from_env()
            .with_bucket_name(&config.bucket)
            .with_retry(RetryConfig::default());
        let mut builder =
            with_options(builder, &options, AmazonS3Builder::with_config).context(S3ConfigSnafu)?;

        if let Some(region) = &config.region {
            builder = builder.with_region(region);
        }
        // S3-compatible endpoints are addressed path-style and may be plain HTTP
        if let Some(endpoint) = &config.endpoint {
            builder = builder
                .with_endpoint(endpoint)
                .with_virtual_hosted_style_request(false)
                .with_allow_http(true);
        }

        let store = builder.build().context(S3ConfigSnafu)?;
        let canonical_url = config.canonical_url();
        Ok(Self::new(
            BackendConfig::S3(config),
            Backing::Shared(Arc::new(store)),
            canonical_url,
        ))
    }
}
