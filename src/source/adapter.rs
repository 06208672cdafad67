//! Source adapter construction

use super::api::StoreApiSource;
use super::database::DatabaseSource;
use super::file::{FileSource, InlineSource};
use super::remote::{HttpDocumentSource, ObjectStoreSource};
use super::types::{SourceAdapter, SourceConfig};
use crate::error::Result;
use std::sync::Arc;

/// Build the adapter for a source configuration
pub fn build_source(config: &SourceConfig) -> Result<Arc<dyn SourceAdapter>> {
    Ok(match config {
        SourceConfig::File { path, document } => {
            Arc::new(FileSource::from_options(path, document)?)
        }
        SourceConfig::ObjectStore { url, document } => {
            Arc::new(ObjectStoreSource::parse(url, document)?)
        }
        SourceConfig::Http {
            url,
            document,
            http,
        } => Arc::new(HttpDocumentSource::new(url, document, http.clone())?),
        SourceConfig::Api(api) => Arc::new(StoreApiSource::new(api.clone())?),
        SourceConfig::Database(db) => Arc::new(DatabaseSource::new(db.clone())?),
        SourceConfig::Inline { records } => Arc::new(InlineSource::new(records.clone())),
    })
}
