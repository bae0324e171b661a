//! Object storage uploads for table-export.
//!
//! Uses the `object_store` crate so the same code path serves Google Cloud
//! Storage, S3-compatible services and a local directory.

use crate::artifact::Artifact;
use crate::config::{StorageConfig, StorageProvider};
use crate::error::{Error, Result};
use object_store::aws::AmazonS3Builder;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::local::LocalFileSystem;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};

/// An uploaded artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedObject {
    /// Object key, `<table>/<artifact-filename>` under the optional prefix
    pub key: String,
    /// Display location, e.g. `gs://bucket/key`
    pub location: String,
    /// Bytes uploaded
    pub bytes: u64,
}

/// Uploads artifacts into one bucket.
#[derive(Clone)]
pub struct Uploader {
    store: Arc<dyn ObjectStore>,
    provider: StorageProvider,
    bucket: String,
    prefix: Option<String>,
}

impl Uploader {
    /// Build the client for the configured provider.
    ///
    /// For GCS, credentials come from the service account path if set, else
    /// from the environment (`GOOGLE_*` variables, application default
    /// credentials, or the metadata server under workload identity).
    #[instrument(skip(config), fields(provider = ?config.provider, bucket = %config.bucket))]
    pub fn connect(config: &StorageConfig) -> Result<Self> {
        let store: Arc<dyn ObjectStore> = match config.provider {
            StorageProvider::Gcs => {
                let mut builder =
                    GoogleCloudStorageBuilder::from_env().with_bucket_name(&config.bucket);
                if let Some(path) = &config.service_account_path {
                    builder = builder.with_service_account_path(path);
                }
                Arc::new(
                    builder
                        .build()
                        .map_err(|e| Error::storage("Failed to create GCS client", e))?,
                )
            }
            StorageProvider::S3 => Arc::new(
                AmazonS3Builder::from_env()
                    .with_bucket_name(&config.bucket)
                    .build()
                    .map_err(|e| Error::storage("Failed to create S3 client", e))?,
            ),
            StorageProvider::Local => {
                std::fs::create_dir_all(&config.bucket)?;
                Arc::new(
                    LocalFileSystem::new_with_prefix(&config.bucket)
                        .map_err(|e| Error::storage("Failed to open local bucket directory", e))?,
                )
            }
        };

        info!("Object storage ready: {}://{}", config.provider.scheme(), config.bucket);
        Ok(Self::from_store(
            store,
            config.provider,
            config.bucket.clone(),
            config.prefix.clone(),
        ))
    }

    /// Wrap an existing store (tests, custom backends).
    pub fn from_store(
        store: Arc<dyn ObjectStore>,
        provider: StorageProvider,
        bucket: impl Into<String>,
        prefix: Option<String>,
    ) -> Self {
        let prefix = prefix
            .map(|p| p.trim_matches('/').to_string())
            .filter(|p| !p.is_empty());
        Self {
            store,
            provider,
            bucket: bucket.into(),
            prefix,
        }
    }

    /// Remote key for an artifact of `table`.
    pub fn object_key(&self, table: &str, file_name: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}/{}/{}", prefix, table, file_name),
            None => format!("{}/{}", table, file_name),
        }
    }

    /// Human-readable location of `key`.
    pub fn location(&self, key: &str) -> String {
        format!(
            "{}://{}/{}",
            self.provider.scheme(),
            self.bucket.trim_end_matches('/'),
            key
        )
    }

    /// Upload `artifact` with a single put. The local file is left alone.
    #[instrument(skip(self, artifact), fields(file = %artifact.file_name))]
    pub async fn upload(&self, table: &str, artifact: &Artifact) -> Result<UploadedObject> {
        let key = self.object_key(table, &artifact.file_name);
        let data = tokio::fs::read(&artifact.path).await?;
        let bytes = data.len() as u64;

        self.store
            .put(&ObjectPath::from(key.as_str()), PutPayload::from(data))
            .await
            .map_err(|e| Error::upload(&key, "Put failed", e))?;

        let location = self.location(&key);
        info!("Uploaded to {}", location);
        Ok(UploadedObject {
            key,
            location,
            bytes,
        })
    }

    /// Test connectivity and credentials by listing the key prefix once.
    pub async fn ping(&self) -> Result<()> {
        let prefix = self.prefix.as_deref().map(ObjectPath::from);
        self.store
            .list_with_delimiter(prefix.as_ref())
            .await
            .map_err(|e| Error::storage("Listing bucket failed", e))?;
        Ok(())
    }
}

impl std::fmt::Debug for Uploader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Uploader")
            .field("provider", &self.provider)
            .field("bucket", &self.bucket)
            .field("prefix", &self.prefix)
            .finish()
    }
}
