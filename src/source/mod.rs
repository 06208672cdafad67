//! Source adapters
//!
//! Each adapter yields the raw records of one entity kind from one physical
//! source: local files, object storage, HTTP documents, the paginated store
//! API, database tables, or records declared inline. Adapters never validate.
//!
//! # Example
//!
//! ```ignore
//! let source = build_source(&SourceConfig::File {
//!     path: "data/products.csv".into(),
//!     document: DocumentOptions::default(),
//! })?;
//! let mut records = source.open().await?;
//! while let Some(record) = records.next().await {
//!     let record = record?;
//! }
//! ```

mod adapter;
mod api;
mod database;
mod file;
mod remote;
mod types;

pub use adapter::build_source;
pub use api::StoreApiSource;
pub use database::DatabaseSource;
pub use file::{FileSource, InlineSource};
pub use remote::{HttpDocumentSource, ObjectStoreSource};
pub use types::{
    ApiConfig, DatabaseConfig, DatabaseConnection, DatabaseKind, DocumentOptions, RecordStream,
    SourceAdapter, SourceConfig,
};
