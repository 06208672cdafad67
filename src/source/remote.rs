//! Object storage and HTTP document sources

use super::file::records_stream;
use super::types::{DocumentOptions, RecordStream, SourceAdapter};
use crate::decode::{decoder_for, DecoderConfig};
use crate::error::{Error, Result};
use crate::http::{HttpClient, HttpSettings};
use async_trait::async_trait;
use object_store::aws::AmazonS3Builder;
use object_store::azure::MicrosoftAzureBuilder;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::local::LocalFileSystem;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use std::sync::Arc;
use tracing::debug;

// ============================================================================
// Object Store Source
// ============================================================================

/// Reads one document from S3, GCS, Azure Blob Storage or a `file://` URL
///
/// Credentials come from the usual environment variables of each provider
/// (`AWS_ACCESS_KEY_ID`, `GOOGLE_SERVICE_ACCOUNT`, `AZURE_STORAGE_ACCOUNT_NAME`, ...).
#[derive(Debug, Clone)]
pub struct ObjectStoreSource {
    store: Arc<dyn ObjectStore>,
    path: ObjectPath,
    url: String,
    decoder: DecoderConfig,
}

impl ObjectStoreSource {
    /// Parse an object URL
    ///
    /// Supported formats:
    /// - `s3://bucket/key.csv`
    /// - `gs://bucket/key.json`
    /// - `az://container/key.csv`
    /// - `file:///abs/path.csv`
    pub fn parse(url: &str, options: &DocumentOptions) -> Result<Self> {
        let decoder = options.decoder_config(url)?;
        let (store, path) = open_store(url)?;
        Ok(Self::with_store(store, path, url, decoder))
    }

    /// Create a source over an existing store
    pub fn with_store(
        store: Arc<dyn ObjectStore>,
        path: ObjectPath,
        url: impl Into<String>,
        decoder: DecoderConfig,
    ) -> Self {
        Self {
            store,
            path,
            url: url.into(),
            decoder,
        }
    }
}

#[async_trait]
impl SourceAdapter for ObjectStoreSource {
    fn describe(&self) -> String {
        self.url.clone()
    }

    async fn open(&self) -> Result<RecordStream> {
        debug!("Fetching {}", self.url);
        let unavailable =
            |e: object_store::Error| Error::source_unavailable(&self.url, e.to_string());

        let body = self
            .store
            .get(&self.path)
            .await
            .map_err(unavailable)?
            .bytes()
            .await
            .map_err(unavailable)?;

        let records = decoder_for(&self.decoder)?.decode(&body)?;
        Ok(records_stream(records))
    }
}

/// Split `bucket/key` into the bucket and the object path
fn split_bucket<'a>(url: &'a str, scheme: &str) -> Result<(&'a str, ObjectPath)> {
    let rest = url
        .strip_prefix(scheme)
        .ok_or_else(|| Error::config(format!("Invalid object URL: {url}")))?;
    match rest.split_once('/') {
        Some((bucket, key)) if !bucket.is_empty() && !key.is_empty() => {
            Ok((bucket, ObjectPath::from(key)))
        }
        _ => Err(Error::invalid_value(
            "url",
            format!("'{url}' must name a bucket and an object key"),
        )),
    }
}

fn open_store(url: &str) -> Result<(Arc<dyn ObjectStore>, ObjectPath)> {
    let client_error = |provider: &str, e: object_store::Error| {
        Error::config(format!("Failed to create {provider} client: {e}"))
    };

    if url.starts_with("s3://") {
        let (bucket, path) = split_bucket(url, "s3://")?;
        let store = AmazonS3Builder::from_env()
            .with_bucket_name(bucket)
            .build()
            .map_err(|e| client_error("S3", e))?;
        Ok((Arc::new(store), path))
    } else if url.starts_with("gs://") {
        let (bucket, path) = split_bucket(url, "gs://")?;
        let store = GoogleCloudStorageBuilder::from_env()
            .with_bucket_name(bucket)
            .build()
            .map_err(|e| client_error("GCS", e))?;
        Ok((Arc::new(store), path))
    } else if url.starts_with("az://") {
        let (container, path) = split_bucket(url, "az://")?;
        let store = MicrosoftAzureBuilder::from_env()
            .with_container_name(container)
            .build()
            .map_err(|e| client_error("Azure", e))?;
        Ok((Arc::new(store), path))
    } else if let Some(local) = url.strip_prefix("file://") {
        let absolute = std::path::absolute(local)?;
        let path = ObjectPath::from_absolute_path(&absolute)
            .map_err(|e| Error::invalid_value("url", e.to_string()))?;
        Ok((Arc::new(LocalFileSystem::new()), path))
    } else {
        Err(Error::invalid_value(
            "url",
            format!("unsupported object store URL '{url}' (use s3://, gs://, az:// or file://)"),
        ))
    }
}

// ============================================================================
// HTTP Document Source
// ============================================================================

/// Downloads one document over HTTP(S)
#[derive(Debug, Clone)]
pub struct HttpDocumentSource {
    url: String,
    client: HttpClient,
    decoder: DecoderConfig,
}

impl HttpDocumentSource {
    /// Create an HTTP document source
    pub fn new(
        url: impl Into<String>,
        options: &DocumentOptions,
        settings: HttpSettings,
    ) -> Result<Self> {
        let url = url.into();
        url::Url::parse(&url)?;
        let decoder = options.decoder_config(&url)?;
        Ok(Self {
            client: HttpClient::new(settings)?,
            url,
            decoder,
        })
    }
}

#[async_trait]
impl SourceAdapter for HttpDocumentSource {
    fn describe(&self) -> String {
        self.url.clone()
    }

    async fn open(&self) -> Result<RecordStream> {
        let body = self.client.get_bytes(&self.url).await?;
        let records = decoder_for(&self.decoder)?.decode(&body)?;
        Ok(records_stream(records))
    }
}
