//! Azure Blob Storage backend.
//!
//! An account URL (`https://<account>.blob.core.windows.net`) gives every
//! tenant its own blob container, created on first use. A URL that names a
//! container keeps every tenant as a prefix inside that one container.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use dashmap::DashMap;
use hmac::{Hmac, Mac};
use object_store::azure::{AzureCredential, MicrosoftAzure, MicrosoftAzureBuilder};
use object_store::path::Path;
use object_store::{CredentialProvider, RetryConfig};
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH};
use sha2::Sha256;
use snafu::prelude::*;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::error::{
    AzureAccountKeySnafu, AzureConfigSnafu, AzureContainerSnafu, AzureCredentialSnafu,
    AzureRequestSnafu, StorageError,
};

use super::{Backing, BackendConfig, ContainerStatus, StorageProvider, with_options};

/// Blob service REST API version used for container management.
const API_VERSION: &str = "2023-11-03";

/// Storage option names that carry the account key.
const ACCOUNT_KEY_OPTIONS: &[&str] = &[
    "azure_storage_account_key",
    "azure_storage_access_key",
    "azure_storage_master_key",
    "account_key",
    "access_key",
    "master_key",
];

const ACCOUNT_KEY_ENV: &[&str] = &[
    "AZURE_STORAGE_ACCOUNT_KEY",
    "AZURE_STORAGE_ACCESS_KEY",
    "AZURE_STORAGE_MASTER_KEY",
];

/// Azure Blob Storage configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AzureConfig {
    pub account: String,
    /// Single container holding every tenant as a prefix. Without one, each
    /// tenant container is a blob container of the account.
    pub container: Option<String>,
    pub key: Option<Path>,
}

/// A storage account whose blob containers are the tenant containers.
pub(crate) struct AzureAccount {
    account: String,
    endpoint: String,
    builder: MicrosoftAzureBuilder,
    signer: Option<Hmac<Sha256>>,
    http: reqwest::Client,
    stores: DashMap<String, Arc<MicrosoftAzure>>,
}

impl fmt::Debug for AzureAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureAccount")
            .field("account", &self.account)
            .field("endpoint", &self.endpoint)
            .field("shared_key", &self.signer.is_some())
            .field("containers", &self.stores.len())
            .finish()
    }
}

impl AzureAccount {
    fn new(
        account: &str,
        endpoint: String,
        builder: MicrosoftAzureBuilder,
        options: &HashMap<String, String>,
    ) -> Result<Self, StorageError> {
        let signer = account_key(options)
            .map(|key| shared_key_signer(&key))
            .transpose()?;

        Ok(Self {
            account: account.to_string(),
            endpoint,
            builder,
            signer,
            http: reqwest::Client::new(),
            stores: DashMap::new(),
        })
    }

    /// Object store scoped to one blob container.
    pub(crate) fn store(&self, container: &str) -> Result<Arc<MicrosoftAzure>, StorageError> {
        if let Some(store) = self.stores.get(container) {
            return Ok(store.value().clone());
        }
        let store = Arc::new(
            self.builder
                .clone()
                .with_container_name(container)
                .build()
                .context(AzureConfigSnafu)?,
        );
        Ok(self
            .stores
            .entry(container.to_string())
            .or_insert(store)
            .value()
            .clone())
    }

    /// Create the blob container. An existing container is success.
    pub(crate) async fn create_container(
        &self,
        container: &str,
    ) -> Result<ContainerStatus, StorageError> {
        let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let request = self
            .http
            .put(format!("{}/{container}", self.endpoint))
            .query(&[("restype", "container")])
            .header("x-ms-date", &date)
            .header("x-ms-version", API_VERSION)
            .header(CONTENT_LENGTH, "0");

        let request = match &self.signer {
            Some(signer) => {
                let string_to_sign = create_container_string_to_sign(&self.account, container, &date);
                let signature = sign(signer, &string_to_sign);
                request.header(AUTHORIZATION, format!("SharedKey {}:{signature}", self.account))
            }
            None => {
                let store = self.store(container)?;
                let credential = store
                    .credentials()
                    .get_credential()
                    .await
                    .context(AzureConfigSnafu)?;
                match credential.as_ref() {
                    AzureCredential::BearerToken(token) => request.bearer_auth(token),
                    AzureCredential::SASToken(pairs) => request.query(pairs),
                    _ => return AzureCredentialSnafu.fail(),
                }
            }
        };

        let response = request
            .send()
            .await
            .context(AzureRequestSnafu { container })?;
        let code = response
            .headers()
            .get("x-ms-error-code")
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let status = container_status(container, response.status(), &code)?;
        debug!(container, status = status.as_str(), "Azure container ensured");
        Ok(status)
    }
}

fn account_key(options: &HashMap<String, String>) -> Option<String> {
    options
        .iter()
        .find(|(key, _)| ACCOUNT_KEY_OPTIONS.contains(&key.to_ascii_lowercase().as_str()))
        .map(|(_, value)| value.clone())
        .or_else(|| ACCOUNT_KEY_ENV.iter().find_map(|var| std::env::var(var).ok()))
}

fn shared_key_signer(key: &str) -> Result<Hmac<Sha256>, StorageError> {
    let bytes = STANDARD.decode(key.trim()).map_err(|err| {
        AzureAccountKeySnafu {
            message: err.to_string(),
        }
        .build()
    })?;
    Hmac::<Sha256>::new_from_slice(&bytes).map_err(|err| {
        AzureAccountKeySnafu {
            message: err.to_string(),
        }
        .build()
    })
}

/// Shared Key string-to-sign of a Create Container request: the verb, eleven
/// empty standard headers, the `x-ms-*` headers and the canonical resource.
fn create_container_string_to_sign(account: &str, container: &str, date: &str) -> String {
    format!(
        "PUT\n{}x-ms-date:{date}\nx-ms-version:{API_VERSION}\n/{account}/{container}\nrestype:container",
        "\n".repeat(11)
    )
}

fn sign(signer: &Hmac<Sha256>, string_to_sign: &str) -> String {
    let mut mac = signer.clone();
    mac.update(string_to_sign.as_bytes());
    STANDARD.encode(mac.finalize().into_bytes())
}

fn container_status(
    container: &str,
    status: StatusCode,
    code: &str,
) -> Result<ContainerStatus, StorageError> {
    match status {
        StatusCode::CREATED => Ok(ContainerStatus::Created),
        StatusCode::CONFLICT if code == "ContainerAlreadyExists" => {
            Ok(ContainerStatus::AlreadyExists)
        }
        _ => AzureContainerSnafu {
            container,
            status: status.as_u16(),
            code,
        }
        .fail(),
    }
}

impl StorageProvider {
    pub(super) async fn construct_azure(
        config: AzureConfig,
        options: HashMap<String, String>,
    ) -> Result<Self, StorageError> {
        let builder = MicrosoftAzureBuilder::from_env()
            .with_account(&config.account)
            .with_retry(RetryConfig::default());
        let builder =
            with_options(builder, &options, MicrosoftAzureBuilder::with_config).context(AzureConfigSnafu)?;

        let endpoint = format!("https://{}.blob.core.windows.net", config.account);
        let (canonical_url, backing) = match &config.container {
            Some(container) => {
                let store = builder
                    .with_container_name(container)
                    .build()
                    .context(AzureConfigSnafu)?;
                let url = match &config.key {
                    Some(key) => format!("{endpoint}/{container}/{key}"),
                    None => format!("{endpoint}/{container}"),
                };
                (url, Backing::Shared(Arc::new(store)))
            }
            None => {
                let account = AzureAccount::new(&config.account, endpoint.clone(), builder, &options)?;
                (endpoint, Backing::AzureAccount(account))
            }
        };

        Ok(Self::new(BackendConfig::Azure(config), backing, canonical_url))
    }
}
